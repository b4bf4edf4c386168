//! The 36-byte frame header that prefixes every LIFX message.
//!
//! Layout (all multi-byte fields little-endian):
//!
//! ```text
//! offset  bits
//!  0- 1   size (u16)
//!  2- 3   protocol (bits 0-11), addressable (bit 12), tagged (bit 13), origin (bits 14-15)
//!  4- 7   source (u32)
//!  8-15   target (8 bytes)
//! 16-21   reserved (6 bytes)
//! 22      res_required (bit 0), ack_required (bit 1), unused (bits 2-7)
//! 23      sequence (u8)
//! 24-31   unused
//! 32-33   message type (u16)
//! 34-35   unused
//! ```

use byteorder::{LittleEndian, WriteBytesExt};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::io::{Cursor, Write};
use std::str::FromStr;

use crate::rw::LittleEndianReader;
use crate::{Error, PROTOCOL_NUMBER};

macro_rules! message_types {
    ($( $(#[$doc:meta])* $name:ident = $num:literal, $wire:literal; )*) => {
        /// Every message type known to this library, keyed by the numeric tag carried in the
        /// header.
        ///
        /// Tags that aren't listed decode as [MessageType::Unknown], carrying the raw number, so
        /// that messages from newer firmware can be logged and skipped.
        ///
        /// Equality and hashing go by tag, so `Unknown(2)` built by hand is equal to
        /// `GetService`.  [MessageType::from_tag] never produces such a value.
        #[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
        #[derive(Debug, Copy, Clone)]
        pub enum MessageType {
            $(
                $(#[$doc])*
                $name,
            )*
            /// A tag not in the table above.  Use [MessageType::from_tag] (or `From<u16>`) rather
            /// than building this directly.
            Unknown(u16),
        }

        impl MessageType {
            /// Every known message type, in tag order.
            pub const ALL: &'static [MessageType] = &[ $( MessageType::$name, )* ];

            pub fn from_tag(tag: u16) -> MessageType {
                match tag {
                    $( $num => MessageType::$name, )*
                    x => MessageType::Unknown(x),
                }
            }

            pub fn tag(&self) -> u16 {
                match *self {
                    $( MessageType::$name => $num, )*
                    MessageType::Unknown(x) => x,
                }
            }

            /// The snake_case name of this type, e.g. `"set_color_light"`.
            ///
            /// Unknown types have no name.
            pub fn name(&self) -> Option<&'static str> {
                match *self {
                    $( MessageType::$name => Some($wire), )*
                    MessageType::Unknown(_) => None,
                }
            }
        }

        impl FromStr for MessageType {
            type Err = Error;

            fn from_str(s: &str) -> Result<MessageType, Error> {
                match s {
                    $( $wire => Ok(MessageType::$name), )*
                    other => Err(Error::UnknownMessageName(other.to_owned())),
                }
            }
        }
    };
}

message_types! {
    GetService = 2, "get_service";
    StateService = 3, "state_service";
    GetHostInfo = 12, "get_host_info";
    StateHostInfo = 13, "state_host_info";
    GetHostFirmware = 14, "get_host_firmware";
    StateHostFirmware = 15, "state_host_firmware";
    GetWifiInfo = 16, "get_wifi_info";
    StateWifiInfo = 17, "state_wifi_info";
    GetWifiFirmware = 18, "get_wifi_firmware";
    StateWifiFirmware = 19, "state_wifi_firmware";
    /// Device-level power; see also [MessageType::GetPowerLight].
    GetPower = 20, "get_power";
    SetPower = 21, "set_power";
    StatePower = 22, "state_power";
    GetLabel = 23, "get_label";
    SetLabel = 24, "set_label";
    StateLabel = 25, "state_label";
    GetVersion = 32, "get_version";
    StateVersion = 33, "state_version";
    GetInfo = 34, "get_info";
    StateInfo = 35, "state_info";
    /// Response to any message sent with `ack_required` set.
    Acknowledgement = 45, "acknowledgement";
    GetLocation = 48, "get_location";
    StateLocation = 50, "state_location";
    GetGroup = 51, "get_group";
    StateGroup = 53, "state_group";
    EchoRequest = 58, "echo_request";
    EchoResponse = 59, "echo_response";
    GetLight = 101, "get_light";
    SetColorLight = 102, "set_color_light";
    SetWaveformLight = 103, "set_waveform_light";
    StateLight = 107, "state_light";
    GetPowerLight = 116, "get_power_light";
    SetPowerLight = 117, "set_power_light";
    StatePowerLight = 118, "state_power_light";
    GetInfrared = 120, "get_infrared";
    StateInfrared = 121, "state_infrared";
    SetInfrared = 122, "set_infrared";
    SetColorZone = 501, "set_color_zone";
    GetColorZone = 502, "get_color_zone";
    StateZone = 503, "state_zone";
    StateMultiZone = 506, "state_multi_zone";
}

impl From<u16> for MessageType {
    fn from(tag: u16) -> Self {
        MessageType::from_tag(tag)
    }
}

impl From<MessageType> for u16 {
    fn from(typ: MessageType) -> Self {
        typ.tag()
    }
}

impl PartialEq for MessageType {
    fn eq(&self, other: &MessageType) -> bool {
        self.tag() == other.tag()
    }
}

impl Eq for MessageType {}

impl Hash for MessageType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.tag().hash(state)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "{}", self.tag()),
        }
    }
}

/// The decoded frame header.
///
/// `size` is recomputed every time a [crate::Message] is encoded, so there is no need to fill
/// it in by hand.
///
/// The `tagged` field indicates whether the `target` field is being used to address an
/// individual device or all devices.  If `tagged` is true, then `target` should be zero.
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// 16 bits: Size of entire message in bytes including this field
    pub size: u16,

    /// 12 bits: Protocol number: must be 1024 (decimal)
    pub protocol: u16,

    /// 1 bit: Message includes a target address: must be one (1)
    pub addressable: bool,

    /// 1 bit: Determines usage of the `target` field
    pub tagged: bool,

    /// 2 bits: Message origin indicator: must be zero (0)
    pub origin: u8,

    /// 32 bits: Source identifier: unique value set by the client, used by responses.
    ///
    /// If the source identifier is zero, then the LIFX device may send a broadcast message that can
    /// be received by all clients on the same subnet.
    pub source: u32,

    /// 64 bits: 6 byte device address (MAC address) or zero (0) means all devices
    pub target: u64,

    /// 48 bits: Must all be zero (0)
    pub reserved: [u8; 6],

    /// 1 bit: Response message required
    pub res_required: bool,

    /// 1 bit: Acknowledgement message required
    pub ack_required: bool,

    /// 8 bits: Wrap around message sequence number
    pub sequence: u8,

    /// 16 bits: Message type determines the payload being used
    pub typ: MessageType,
}

/// Options used to construct a [Header].
///
/// See also [Header::build].
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// If not `None`, this is the ID of the device you want to address.
    ///
    /// To look up the ID of a device, extract it from the [Header::target] field when a
    /// device sends a [MessageType::StateService] message.
    pub target: Option<u64>,
    /// Acknowledgement message required.
    ///
    /// Causes the light to send an [MessageType::Acknowledgement] message.
    pub ack_required: bool,
    /// Response message required.
    ///
    /// Some message types are sent by clients to get data from a light.  These should always have
    /// `res_required` set to true.
    pub res_required: bool,
    /// A wrap around sequence number.  Optional (can be zero).
    ///
    /// By providing a unique sequence value, the response message will also contain the same
    /// sequence number, allowing a client to distinguish between different messages sent with the
    /// same `source` identifier.
    pub sequence: u8,
    /// A unique client identifier. Optional (can be zero).
    ///
    /// If the source is non-zero, then the LIFX device will send a unicast message to the IP
    /// address/port of the client that sent the originating message.  If zero, then the LIFX
    /// device may send a broadcast message that can be received by all clients on the same sub-net.
    pub source: u32,
}

impl Header {
    /// packed size, in bytes
    pub const SIZE: usize = 36;

    /// A header for the given message type, addressed to every device, asking for an ack.
    ///
    /// `source`, `target` and `sequence` are left at zero for the caller to fill in.
    pub fn make(typ: MessageType) -> Header {
        Header {
            size: 0,
            protocol: PROTOCOL_NUMBER,
            addressable: true,
            tagged: true,
            origin: 0,
            source: 0,
            target: 0,
            reserved: [0; 6],
            res_required: false,
            ack_required: true,
            sequence: 0,
            typ,
        }
    }

    /// Builds a header from [BuildOptions].
    ///
    /// If [BuildOptions::target] is None, then the message is addressed to all devices.  Else it
    /// should be a bulb UID (MAC address)
    pub fn build(options: &BuildOptions, typ: MessageType) -> Header {
        Header {
            size: 0,
            protocol: PROTOCOL_NUMBER,
            addressable: true,
            tagged: options.target.is_none(),
            origin: 0,
            source: options.source,
            target: options.target.unwrap_or(0),
            reserved: [0; 6],
            res_required: options.res_required,
            ack_required: options.ack_required,
            sequence: options.sequence,
            typ,
        }
    }

    /// Packs this header into its 36 wire bytes.
    pub fn pack(&self) -> Result<[u8; Header::SIZE], Error> {
        let mut buf = [0u8; Header::SIZE];
        let mut c = Cursor::new(&mut buf[..]);

        c.write_u16::<LittleEndian>(self.size)?;

        // pack protocol + addressable + tagged + origin as a u16, least significant bit first
        let mut d: u16 = self.protocol & 0b0000_1111_1111_1111;
        d |= u16::from(self.addressable) << 12;
        d |= u16::from(self.tagged) << 13;
        d |= (u16::from(self.origin) & 0b11) << 14;
        c.write_u16::<LittleEndian>(d)?;

        c.write_u32::<LittleEndian>(self.source)?;
        c.write_u64::<LittleEndian>(self.target)?;
        c.write_all(&self.reserved)?;

        let b: u8 = u8::from(self.res_required) | (u8::from(self.ack_required) << 1);
        c.write_u8(b)?;
        c.write_u8(self.sequence)?;

        c.write_u64::<LittleEndian>(0)?;
        c.write_u16::<LittleEndian>(self.typ.tag())?;
        c.write_u16::<LittleEndian>(0)?;

        Ok(buf)
    }

    /// Unpacks a header from the first 36 bytes of `v`.
    ///
    /// Anything after the header is ignored.  Reserved bits are dropped, and an unexpected
    /// protocol number or origin is tolerated.
    pub fn unpack(v: &[u8]) -> Result<Header, Error> {
        if v.len() < Header::SIZE {
            return Err(Error::MalformedHeader(v.len()));
        }
        let mut c = Cursor::new(&v[..Header::SIZE]);

        let size: u16 = c.read_val()?;

        // protocol + addressable + tagged + origin
        let d: u16 = c.read_val()?;
        let protocol: u16 = d & 0b0000_1111_1111_1111;
        let addressable = (d & 0b0001_0000_0000_0000) > 0;
        let tagged = (d & 0b0010_0000_0000_0000) > 0;
        let origin: u8 = ((d & 0b1100_0000_0000_0000) >> 14) as u8;

        let source: u32 = c.read_val()?;
        let target: u64 = c.read_val()?;

        let mut reserved: [u8; 6] = [0; 6];
        for slot in &mut reserved {
            *slot = c.read_val()?;
        }

        let b: u8 = c.read_val()?;
        let res_required = (b & 0b01) > 0;
        let ack_required = (b & 0b10) > 0;

        let sequence: u8 = c.read_val()?;

        let _: u64 = c.read_val()?;
        let typ: u16 = c.read_val()?;

        if protocol != PROTOCOL_NUMBER || origin != 0 {
            log::debug!(
                "header for type {} has protocol {} and origin {}",
                typ,
                protocol,
                origin
            );
        }

        Ok(Header {
            size,
            protocol,
            addressable,
            tagged,
            origin,
            source,
            target,
            reserved,
            res_required,
            ack_required,
            sequence,
            typ: MessageType::from_tag(typ),
        })
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Lifx Header type {}", self.typ)
    }
}
