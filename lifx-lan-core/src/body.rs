//! Message payloads ("bodies") and the registry that maps a message type to its layout.
//!
//! Every payload has a fixed size on the wire that never depends on its field values.  Fields
//! are stored the way they travel; semantic views (human color units, waveform, label text,
//! skew ratio) are accessor methods, so a single bad field never hides the rest of a body.
//!
//! Adding a message type takes a struct implementing [Payload] and one more line in the
//! `body_registry!` invocation below.  Neither the header nor the envelope needs to change.

use std::fmt;
use std::io::{self, Cursor, Read, Write};
use std::str::FromStr;

use crate::color::HSBK;
use crate::header::MessageType;
use crate::rw::{LittleEndianReader, LittleEndianWriter};
use crate::Error;

/// A fixed-size payload layout for one message type.
pub trait Payload: Sized + Default {
    /// The message type this payload belongs to.
    const TYPE: MessageType;
    /// Size of this payload on the wire, padding included.
    const SIZE: usize;

    fn write_fields<W: Write>(&self, w: &mut W) -> io::Result<()>;
    fn read_fields<R: Read>(r: &mut R) -> io::Result<Self>;

    /// Packs this payload into exactly [Payload::SIZE] bytes, zero padded.
    fn pack(&self) -> Result<Vec<u8>, Error> {
        let mut v = Vec::with_capacity(Self::SIZE);
        self.write_fields(&mut v)?;
        v.resize(Self::SIZE, 0);
        Ok(v)
    }

    /// Unpacks a payload, which must be exactly [Payload::SIZE] bytes long.
    fn unpack(v: &[u8]) -> Result<Self, Error> {
        if v.len() != Self::SIZE {
            return Err(Error::BodyLengthMismatch {
                typ: Self::TYPE,
                expected: Self::SIZE,
                actual: v.len(),
            });
        }
        let mut c = Cursor::new(v);
        Ok(Self::read_fields(&mut c)?)
    }
}

/// Lifx labels are fixed-length (32 bytes) UTF-8, terminated by the first zero byte.
///
/// [Label::set] writes left-aligned and does not clear what follows the new text, so reuse a
/// label only after [Label::clear] if the old content must not leak.  [Label::new] and
/// `Label::default()` start out zeroed.
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(pub [u8; 32]);

impl Label {
    pub const LEN: usize = 32;

    /// Constructs a new zeroed Label holding `s`, truncated to 32 bytes.
    pub fn new(s: &str) -> Label {
        let mut label = Label::default();
        label.set(s);
        label
    }

    /// Writes `s` at the start of the buffer.  Bytes past the end of `s` are left untouched.
    ///
    /// Text longer than 32 bytes is cut at the last char boundary that fits.
    pub fn set(&mut self, s: &str) {
        let mut end = s.len().min(Label::LEN);
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        self.0[..end].copy_from_slice(&s.as_bytes()[..end]);
    }

    pub fn clear(&mut self) {
        self.0 = [0; Label::LEN];
    }

    /// The text up to the first zero byte.
    pub fn as_str(&self) -> Result<&str, Error> {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(Label::LEN);
        std::str::from_utf8(&self.0[..end]).map_err(Error::LabelEncoding)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl Default for Label {
    fn default() -> Self {
        Label([0; Label::LEN])
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.as_str() {
            Ok(s) => write!(f, "Label({:?})", s),
            Err(_) => write!(f, "Label({:?})", &self.0[..]),
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(Label::LEN);
        write!(f, "{}", String::from_utf8_lossy(&self.0[..end]))
    }
}

/// The 64 opaque bytes carried by echo requests and responses.
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EchoPayload(pub [u8; 64]);

impl EchoPayload {
    pub const LEN: usize = 64;
}

impl Default for EchoPayload {
    fn default() -> Self {
        EchoPayload([0; EchoPayload::LEN])
    }
}

impl fmt::Debug for EchoPayload {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<EchoPayload>")
    }
}

/// What services are exposed by the device.
///
/// LIFX only documents the UDP service, though bulbs may support other undocumented services.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Service {
    Udp = 1,
}

impl TryFrom<u8> for Service {
    type Error = Error;

    fn try_from(val: u8) -> Result<Service, Error> {
        match val {
            1 => Ok(Service::Udp),
            x => Err(Error::InvalidEnumValue {
                field: "service",
                value: x,
            }),
        }
    }
}

#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Waveform {
    Saw = 0,
    Sine = 1,
    HalfSine = 2,
    Triangle = 3,
    Pulse = 4,
}

impl TryFrom<u8> for Waveform {
    type Error = Error;

    fn try_from(val: u8) -> Result<Waveform, Error> {
        match val {
            0 => Ok(Waveform::Saw),
            1 => Ok(Waveform::Sine),
            2 => Ok(Waveform::HalfSine),
            3 => Ok(Waveform::Triangle),
            4 => Ok(Waveform::Pulse),
            x => Err(Error::InvalidEnumValue {
                field: "waveform",
                value: x,
            }),
        }
    }
}

impl FromStr for Waveform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Waveform, Error> {
        match s {
            "saw" => Ok(Waveform::Saw),
            "sine" => Ok(Waveform::Sine),
            "halfsine" => Ok(Waveform::HalfSine),
            "triangle" => Ok(Waveform::Triangle),
            "pulse" => Ok(Waveform::Pulse),
            _ => Err(Error::UnknownWaveform(s.to_owned())),
        }
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Waveform::Saw => "saw",
            Waveform::Sine => "sine",
            Waveform::HalfSine => "halfsine",
            Waveform::Triangle => "triangle",
            Waveform::Pulse => "pulse",
        };
        write!(f, "{}", name)
    }
}

/// Power level constants.  Any other value is passed through untouched.
pub mod power {
    pub const ON: u16 = 65535;
    pub const OFF: u16 = 0;
}

/// Maps a skew ratio in [0, 1] onto the signed 16-bit wire value.
///
/// `round(value * 65535) - 32768`, with exact halves rounded down, so 0.0 maps to -32768, 0.5
/// to -1 and 1.0 to 32767.  Out of range input is clamped.
pub fn skew_ratio_to_wire(value: f32) -> i16 {
    let scaled = f64::from(value.clamp(0.0, 1.0)) * 65535.0;
    // the midpoint lands on -1, not 0; existing devices and clients expect that
    let rounded = (scaled - 0.5).ceil();
    (rounded as i32 - 32768) as i16
}

/// The inverse of [skew_ratio_to_wire].
pub fn skew_ratio_from_wire(raw: i16) -> f32 {
    ((f64::from(raw) + 32768.0) / 65535.0) as f32
}

macro_rules! empty_payloads {
    ($( $(#[$doc:meta])* $name:ident => $typ:ident ),* $(,)?) => {
        $(
            $(#[$doc])*
            #[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
            #[derive(Debug, Clone, Copy, Default, PartialEq)]
            pub struct $name;

            impl Payload for $name {
                const TYPE: MessageType = MessageType::$typ;
                const SIZE: usize = 0;

                fn write_fields<W: Write>(&self, _w: &mut W) -> io::Result<()> {
                    Ok(())
                }

                fn read_fields<R: Read>(_r: &mut R) -> io::Result<Self> {
                    Ok($name)
                }
            }
        )*
    };
}

empty_payloads! {
    /// GetService - 2
    ///
    /// Sent by a client to acquire responses from all devices on the local network. Causes the
    /// devices to transmit a [StateService] message.
    GetService => GetService,
    /// GetHostInfo - 12
    GetHostInfo => GetHostInfo,
    /// Acknowledgement - 45
    ///
    /// Response to any message sent with ack_required set.  The sequence number of the
    /// acknowledged message is in the header.
    Acknowledgement => Acknowledgement,
    /// Get - 101
    ///
    /// Sent by a client to obtain the light state. Causes the device to transmit a
    /// [StateLight] message.
    GetLight => GetLight,
    /// GetPower - 116
    ///
    /// Sent by a client to obtain the power level. Causes the device to transmit a
    /// [StatePower] message.
    GetPower => GetPowerLight,
}

/// StateService - 3
///
/// Response to [GetService].
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StateService {
    /// unsigned 8-bit integer, maps to [Service]
    pub service: u8,
    /// Port number of the light.  If the service is temporarily unavailable, then the port value
    /// will be 0.
    pub port: u32,
}

impl StateService {
    pub fn service(&self) -> Result<Service, Error> {
        Service::try_from(self.service)
    }
}

impl Payload for StateService {
    const TYPE: MessageType = MessageType::StateService;
    const SIZE: usize = 5;

    fn write_fields<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_val(self.service)?;
        w.write_val(self.port)
    }

    fn read_fields<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(StateService {
            service: r.read_val()?,
            port: r.read_val()?,
        })
    }
}

/// StateHostInfo - 13
///
/// Provides host MCU information.
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StateHostInfo {
    /// radio receive signal strength in milliWatts
    pub signal: f32,
    /// Bytes transmitted since power on
    pub tx: u32,
    /// Bytes received since power on
    pub rx: u32,
    pub reserved: i16,
}

impl Payload for StateHostInfo {
    const TYPE: MessageType = MessageType::StateHostInfo;
    const SIZE: usize = 14;

    fn write_fields<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_val(self.signal)?;
        w.write_val(self.tx)?;
        w.write_val(self.rx)?;
        w.write_val(self.reserved)
    }

    fn read_fields<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(StateHostInfo {
            signal: r.read_val()?,
            tx: r.read_val()?,
            rx: r.read_val()?,
            reserved: r.read_val()?,
        })
    }
}

/// EchoRequest - 58
///
/// Request an arbitrary payload be echoed back. Causes the device to transmit an
/// [EchoResponse].
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EchoRequest {
    pub payload: EchoPayload,
}

/// EchoResponse - 59
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EchoResponse {
    pub payload: EchoPayload,
}

impl Payload for EchoRequest {
    const TYPE: MessageType = MessageType::EchoRequest;
    const SIZE: usize = EchoPayload::LEN;

    fn write_fields<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_val(&self.payload)
    }

    fn read_fields<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(EchoRequest {
            payload: r.read_val()?,
        })
    }
}

impl Payload for EchoResponse {
    const TYPE: MessageType = MessageType::EchoResponse;
    const SIZE: usize = EchoPayload::LEN;

    fn write_fields<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_val(&self.payload)
    }

    fn read_fields<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(EchoResponse {
            payload: r.read_val()?,
        })
    }
}

/// State - 107
///
/// Sent by a device to provide the current light state.
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StateLight {
    pub color: HSBK,
    pub reserved: i16,
    /// See [power]
    pub power: u16,
    pub label: Label,
    pub reserved2: u64,
}

impl StateLight {
    pub fn label(&self) -> Result<&str, Error> {
        self.label.as_str()
    }

    pub fn set_label(&mut self, label: &str) {
        self.label.set(label)
    }
}

impl Payload for StateLight {
    const TYPE: MessageType = MessageType::StateLight;
    const SIZE: usize = 52;

    fn write_fields<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_val(self.color)?;
        w.write_val(self.reserved)?;
        w.write_val(self.power)?;
        w.write_val(&self.label)?;
        w.write_val(self.reserved2)
    }

    fn read_fields<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(StateLight {
            color: r.read_val()?,
            reserved: r.read_val()?,
            power: r.read_val()?,
            label: r.read_val()?,
            reserved2: r.read_val()?,
        })
    }
}

/// SetColor - 102
///
/// Sent by a client to change the light state.
///
/// If the header's res_required field is set then the device will transmit a [StateLight]
/// message.
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SetColor {
    pub reserved: u8,
    /// Color in HSBK
    pub color: HSBK,
    /// Color transition time in milliseconds
    pub duration: u32,
}

impl Payload for SetColor {
    const TYPE: MessageType = MessageType::SetColorLight;
    const SIZE: usize = 13;

    fn write_fields<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_val(self.reserved)?;
        w.write_val(self.color)?;
        w.write_val(self.duration)
    }

    fn read_fields<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(SetColor {
            reserved: r.read_val()?,
            color: r.read_val()?,
            duration: r.read_val()?,
        })
    }
}

/// SetWaveform - 103
///
/// Apply an effect to the bulb.
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SetWaveform {
    pub reserved: u8,
    /// Non-zero restores the original color when the effect ends.  See
    /// [SetWaveform::transient()].
    pub transient: u8,
    pub color: HSBK,
    /// Duration of a cycle in milliseconds
    pub period: u32,
    /// Number of cycles
    pub cycles: f32,
    /// Waveform skew, [-32768, 32767] scaled to [0, 1].  See [SetWaveform::skew_ratio].
    pub skew_ratio: i16,
    /// Waveform to use for transition.  See [SetWaveform::waveform].
    pub waveform: u8,
}

impl SetWaveform {
    pub fn transient(&self) -> bool {
        self.transient != 0
    }

    pub fn set_transient(&mut self, transient: bool) {
        self.transient = u8::from(transient);
    }

    pub fn waveform(&self) -> Result<Waveform, Error> {
        Waveform::try_from(self.waveform)
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform as u8;
    }

    pub fn skew_ratio(&self) -> f32 {
        skew_ratio_from_wire(self.skew_ratio)
    }

    pub fn set_skew_ratio(&mut self, ratio: f32) {
        self.skew_ratio = skew_ratio_to_wire(ratio);
    }
}

impl Payload for SetWaveform {
    const TYPE: MessageType = MessageType::SetWaveformLight;
    const SIZE: usize = 21;

    fn write_fields<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_val(self.reserved)?;
        w.write_val(self.transient)?;
        w.write_val(self.color)?;
        w.write_val(self.period)?;
        w.write_val(self.cycles)?;
        w.write_val(self.skew_ratio)?;
        w.write_val(self.waveform)
    }

    fn read_fields<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(SetWaveform {
            reserved: r.read_val()?,
            transient: r.read_val()?,
            color: r.read_val()?,
            period: r.read_val()?,
            cycles: r.read_val()?,
            skew_ratio: r.read_val()?,
            waveform: r.read_val()?,
        })
    }
}

/// SetPower - 117
///
/// Sent by a client to change the light power level.  The payload is zero padded to 52 bytes.
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SetPower {
    /// See [power]
    pub level: u16,
    /// Power level transition time in milliseconds
    pub duration: u32,
}

impl Payload for SetPower {
    const TYPE: MessageType = MessageType::SetPowerLight;
    const SIZE: usize = 52;

    fn write_fields<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_val(self.level)?;
        w.write_val(self.duration)
    }

    fn read_fields<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(SetPower {
            level: r.read_val()?,
            duration: r.read_val()?,
        })
    }
}

/// StatePower - 118
///
/// Sent by a device to provide the current power level.
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatePower {
    /// See [power]
    pub level: u16,
    pub port: u32,
}

impl StatePower {
    pub fn is_on(&self) -> bool {
        self.level == power::ON
    }
}

impl Payload for StatePower {
    const TYPE: MessageType = MessageType::StatePowerLight;
    const SIZE: usize = 6;

    fn write_fields<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_val(self.level)?;
        w.write_val(self.port)
    }

    fn read_fields<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(StatePower {
            level: r.read_val()?,
            port: r.read_val()?,
        })
    }
}

macro_rules! body_registry {
    ($( $variant:ident ),* $(,)?) => {
        /// A decoded payload.
        ///
        /// The variant is chosen by the header's message type.  Types without a registered
        /// layout, and payloads whose length doesn't match their layout, come back as
        /// [Body::Raw].
        #[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
        #[derive(Debug, Clone, PartialEq)]
        pub enum Body {
            $( $variant($variant), )*
            Raw(Vec<u8>),
        }

        impl Body {
            /// The message type for this body, or `None` for raw bytes.
            pub fn message_type(&self) -> Option<MessageType> {
                match self {
                    $( Body::$variant(_) => Some(<$variant as Payload>::TYPE), )*
                    Body::Raw(_) => None,
                }
            }

            /// The zero-value body for a message type, if the type has a registered layout.
            pub fn zeroed(typ: MessageType) -> Option<Body> {
                $(
                    if typ == <$variant as Payload>::TYPE {
                        return Some(Body::$variant($variant::default()));
                    }
                )*
                None
            }

            /// The wire size of the layout registered for a message type.
            pub fn expected_size(typ: MessageType) -> Option<usize> {
                $(
                    if typ == <$variant as Payload>::TYPE {
                        return Some(<$variant as Payload>::SIZE);
                    }
                )*
                None
            }

            /// Decodes the payload of a message of type `typ`.
            pub fn unpack(typ: MessageType, v: &[u8]) -> Result<Body, Error> {
                $(
                    if typ == <$variant as Payload>::TYPE {
                        return Ok(Body::$variant(<$variant as Payload>::unpack(v)?));
                    }
                )*
                Err(Error::UnknownMessageType(typ.tag()))
            }

            pub fn pack(&self) -> Result<Vec<u8>, Error> {
                match self {
                    $( Body::$variant(b) => b.pack(), )*
                    Body::Raw(v) => Ok(v.clone()),
                }
            }

            /// The total size (in bytes) of the packed version of this body.
            pub fn packed_size(&self) -> usize {
                match self {
                    $( Body::$variant(_) => <$variant as Payload>::SIZE, )*
                    Body::Raw(v) => v.len(),
                }
            }
        }

        $(
            impl From<$variant> for Body {
                fn from(b: $variant) -> Body {
                    Body::$variant(b)
                }
            }
        )*
    };
}

body_registry! {
    GetService,
    StateService,
    GetHostInfo,
    StateHostInfo,
    Acknowledgement,
    EchoRequest,
    EchoResponse,
    GetLight,
    StateLight,
    SetColor,
    SetWaveform,
    GetPower,
    SetPower,
    StatePower,
}

impl Body {
    /// The color carried by this body, for the types that carry one.
    pub fn color(&self) -> Option<&HSBK> {
        match self {
            Body::StateLight(b) => Some(&b.color),
            Body::SetColor(b) => Some(&b.color),
            Body::SetWaveform(b) => Some(&b.color),
            _ => None,
        }
    }
}

impl fmt::Display for Body {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Body::GetService(_) => write!(f, "GetService"),
            Body::StateService(b) => {
                write!(f, "StateService {{service: {}, port: {}}}", b.service, b.port)
            }
            Body::GetHostInfo(_) => write!(f, "GetHostInfo"),
            Body::StateHostInfo(b) => write!(
                f,
                "StateHostInfo {{signal: {}, tx: {}, rx: {}}}",
                b.signal, b.tx, b.rx
            ),
            Body::Acknowledgement(_) => write!(f, "Acknowledgement"),
            Body::EchoRequest(_) => write!(f, "EchoRequest"),
            Body::EchoResponse(_) => write!(f, "EchoResponse"),
            Body::GetLight(_) => write!(f, "Get"),
            Body::StateLight(b) => write!(
                f,
                "State {{power: {}, {}, label: {}}}",
                b.power, b.color, b.label
            ),
            Body::SetColor(b) => write!(f, "SetColor {{{}, duration: {}}}", b.color, b.duration),
            Body::SetWaveform(b) => {
                write!(
                    f,
                    "SetWaveform {{{}, transient: {}, period: {}, cycles: {}, skew_ratio: {}, waveform: ",
                    b.color,
                    b.transient(),
                    b.period,
                    b.cycles,
                    b.skew_ratio()
                )?;
                match b.waveform() {
                    Ok(w) => write!(f, "{}}}", w),
                    Err(_) => write!(f, "<invalid {}>}}", b.waveform),
                }
            }
            Body::GetPower(_) => write!(f, "GetPower"),
            Body::SetPower(b) => write!(f, "SetPower {{level: {}}}", b.level),
            Body::StatePower(b) => write!(f, "StatePower {{level: {}}}", b.level),
            Body::Raw(v) => {
                write!(f, "Raw [")?;
                for (idx, byte) in v.iter().enumerate() {
                    if idx > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{:02X}", byte)?;
                }
                write!(f, "]")
            }
        }
    }
}
