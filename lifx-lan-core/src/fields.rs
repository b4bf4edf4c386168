//! Building and describing bodies by field name.
//!
//! ```
//! use lifx_lan_core::{Body, FieldValue};
//!
//! let body = Body::build(
//!     "SetColor",
//!     &[
//!         ("rgb", FieldValue::Rgb((20, 20, 20))),
//!         ("kelvin", FieldValue::Int(3500)),
//!         ("duration", FieldValue::Int(1024)),
//!     ],
//! )?;
//! assert_eq!(body.field("rgb")?, FieldValue::Rgb((20, 20, 20)));
//!
//! let (name, fields) = body.describe();
//! assert_eq!(name, "SetColor");
//! assert!(fields.contains(&("duration", FieldValue::Int(1024))));
//! # Ok::<(), lifx_lan_core::Error>(())
//! ```
//!
//! Colors are read and written in human units: `hue` in degrees, `saturation` and `brightness`
//! in percent, `rgb` as a triple.  Waveform and service go by name.  Reserved fields, echo
//! payloads and raw bodies have no named fields.

use std::fmt;

use crate::body::*;
use crate::color::HSBK;
use crate::Error;

/// A field value, as read from or written to a body by name.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Rgb((u8, u8, u8)),
    Text(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Bool(v) => write!(f, "{}", v),
            FieldValue::Rgb((r, g, b)) => write!(f, "({}, {}, {})", r, g, b),
            FieldValue::Text(v) => write!(f, "{:?}", v),
        }
    }
}

macro_rules! int_values {
    ($( $t:ty ),*) => {
        $(
            impl From<$t> for FieldValue {
                fn from(v: $t) -> FieldValue {
                    FieldValue::Int(i64::from(v))
                }
            }
        )*
    };
}

int_values!(u8, u16, u32, i16, i32, i64);

impl From<f32> for FieldValue {
    fn from(v: f32) -> FieldValue {
        FieldValue::Float(f64::from(v))
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> FieldValue {
        FieldValue::Float(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> FieldValue {
        FieldValue::Bool(v)
    }
}

impl From<(u8, u8, u8)> for FieldValue {
    fn from(v: (u8, u8, u8)) -> FieldValue {
        FieldValue::Rgb(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> FieldValue {
        FieldValue::Text(v.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> FieldValue {
        FieldValue::Text(v)
    }
}

impl FieldValue {
    fn invalid(&self, field: &'static str) -> Error {
        Error::InvalidFieldValue {
            field,
            value: self.to_string(),
        }
    }

    fn to_int<T: TryFrom<i64>>(&self, field: &'static str) -> Result<T, Error> {
        match self {
            FieldValue::Int(v) => T::try_from(*v).map_err(|_| self.invalid(field)),
            _ => Err(self.invalid(field)),
        }
    }

    fn to_float(&self, field: &'static str) -> Result<f64, Error> {
        match self {
            FieldValue::Int(v) => Ok(*v as f64),
            FieldValue::Float(v) => Ok(*v),
            _ => Err(self.invalid(field)),
        }
    }

    fn to_bool(&self, field: &'static str) -> Result<bool, Error> {
        match self {
            FieldValue::Bool(v) => Ok(*v),
            FieldValue::Int(v) => Ok(*v != 0),
            _ => Err(self.invalid(field)),
        }
    }

    fn to_rgb(&self, field: &'static str) -> Result<(u8, u8, u8), Error> {
        match self {
            FieldValue::Rgb(v) => Ok(*v),
            _ => Err(self.invalid(field)),
        }
    }

    fn to_text(&self, field: &'static str) -> Result<&str, Error> {
        match self {
            FieldValue::Text(v) => Ok(v),
            _ => Err(self.invalid(field)),
        }
    }
}

const STATE_FIELDS: &[&str] = &[
    "hue",
    "saturation",
    "brightness",
    "kelvin",
    "rgb",
    "power",
    "label",
];
const SET_COLOR_FIELDS: &[&str] = &["hue", "saturation", "brightness", "kelvin", "rgb", "duration"];
const SET_WAVEFORM_FIELDS: &[&str] = &[
    "hue",
    "saturation",
    "brightness",
    "kelvin",
    "rgb",
    "transient",
    "period",
    "cycles",
    "skew_ratio",
    "waveform",
];

fn color_field(color: &HSBK, field: &str) -> Option<FieldValue> {
    Some(match field {
        "hue" => FieldValue::Float(color.hue_degrees()),
        "saturation" => FieldValue::Float(color.saturation_percent()),
        "brightness" => FieldValue::Float(color.brightness_percent()),
        "kelvin" => FieldValue::from(color.kelvin),
        "rgb" => FieldValue::Rgb(color.rgb()),
        _ => return None,
    })
}

fn set_color_field(
    color: &mut HSBK,
    field: &'static str,
    value: &FieldValue,
) -> Result<bool, Error> {
    match field {
        "hue" => color.set_hue_degrees(value.to_float(field)?),
        "saturation" => color.set_saturation_percent(value.to_float(field)?),
        "brightness" => color.set_brightness_percent(value.to_float(field)?),
        "kelvin" => color.kelvin = value.to_int(field)?,
        "rgb" => color.set_rgb(value.to_rgb(field)?),
        _ => return Ok(false),
    }
    Ok(true)
}

impl Body {
    /// The zero-value body with the given name.  See [Body::name].
    pub fn named(name: &str) -> Result<Body, Error> {
        Ok(match name {
            "GetService" => GetService.into(),
            "StateService" => StateService::default().into(),
            "GetHostInfo" => GetHostInfo.into(),
            "StateHostInfo" => StateHostInfo::default().into(),
            "Acknowledgement" => Acknowledgement.into(),
            "EchoRequest" => EchoRequest::default().into(),
            "EchoResponse" => EchoResponse::default().into(),
            "Get" => GetLight.into(),
            "State" => StateLight::default().into(),
            "SetColor" => SetColor::default().into(),
            "SetWaveform" => SetWaveform::default().into(),
            "GetPower" => GetPower.into(),
            "SetPower" => SetPower::default().into(),
            "StatePower" => StatePower::default().into(),
            _ => return Err(Error::UnknownBodyName(name.to_owned())),
        })
    }

    /// The name of this kind of body, as used by [Body::named] and printed by `Display`.
    ///
    /// The light messages go by their short names: "Get", "State", "SetColor".
    pub fn name(&self) -> &'static str {
        match self {
            Body::GetService(_) => "GetService",
            Body::StateService(_) => "StateService",
            Body::GetHostInfo(_) => "GetHostInfo",
            Body::StateHostInfo(_) => "StateHostInfo",
            Body::Acknowledgement(_) => "Acknowledgement",
            Body::EchoRequest(_) => "EchoRequest",
            Body::EchoResponse(_) => "EchoResponse",
            Body::GetLight(_) => "Get",
            Body::StateLight(_) => "State",
            Body::SetColor(_) => "SetColor",
            Body::SetWaveform(_) => "SetWaveform",
            Body::GetPower(_) => "GetPower",
            Body::SetPower(_) => "SetPower",
            Body::StatePower(_) => "StatePower",
            Body::Raw(_) => "Raw",
        }
    }

    /// The names of the fields [Body::field] and [Body::set_field] accept for this body.
    pub fn field_names(&self) -> &'static [&'static str] {
        match self {
            Body::StateService(_) => &["service", "port"],
            Body::StateHostInfo(_) => &["signal", "tx", "rx"],
            Body::StateLight(_) => STATE_FIELDS,
            Body::SetColor(_) => SET_COLOR_FIELDS,
            Body::SetWaveform(_) => SET_WAVEFORM_FIELDS,
            Body::SetPower(_) => &["level", "duration"],
            Body::StatePower(_) => &["level", "port"],
            _ => &[],
        }
    }

    fn lookup(&self, field: &str) -> Result<&'static str, Error> {
        self.field_names()
            .iter()
            .copied()
            .find(|&known| known == field)
            .ok_or_else(|| Error::UnknownField {
                body: self.name(),
                field: field.to_owned(),
            })
    }

    /// Builds the body called `name` and sets `fields` on it, in order.
    ///
    /// Later fields win, so `rgb` followed by `hue` keeps the new hue.
    pub fn build(name: &str, fields: &[(&str, FieldValue)]) -> Result<Body, Error> {
        let mut body = Body::named(name)?;
        for (field, value) in fields {
            body.set_field(field, value.clone())?;
        }
        Ok(body)
    }

    /// Reads one field by name.
    ///
    /// A waveform or service byte outside of its enumeration reads back as an integer.
    pub fn field(&self, name: &str) -> Result<FieldValue, Error> {
        let field = self.lookup(name)?;
        if let Some(color) = self.color() {
            if let Some(value) = color_field(color, field) {
                return Ok(value);
            }
        }
        let value = match (self, field) {
            (Body::StateService(b), "service") => match b.service() {
                Ok(Service::Udp) => FieldValue::from("udp"),
                Err(_) => FieldValue::from(b.service),
            },
            (Body::StateService(b), "port") => FieldValue::from(b.port),
            (Body::StateHostInfo(b), "signal") => FieldValue::from(b.signal),
            (Body::StateHostInfo(b), "tx") => FieldValue::from(b.tx),
            (Body::StateHostInfo(b), "rx") => FieldValue::from(b.rx),
            (Body::StateLight(b), "power") => FieldValue::from(b.power),
            (Body::StateLight(b), "label") => FieldValue::Text(b.label.to_string()),
            (Body::SetColor(b), "duration") => FieldValue::from(b.duration),
            (Body::SetWaveform(b), "transient") => FieldValue::from(b.transient()),
            (Body::SetWaveform(b), "period") => FieldValue::from(b.period),
            (Body::SetWaveform(b), "cycles") => FieldValue::from(b.cycles),
            (Body::SetWaveform(b), "skew_ratio") => FieldValue::from(b.skew_ratio()),
            (Body::SetWaveform(b), "waveform") => match b.waveform() {
                Ok(w) => FieldValue::Text(w.to_string()),
                Err(_) => FieldValue::from(b.waveform),
            },
            (Body::SetPower(b), "level") => FieldValue::from(b.level),
            (Body::SetPower(b), "duration") => FieldValue::from(b.duration),
            (Body::StatePower(b), "level") => FieldValue::from(b.level),
            (Body::StatePower(b), "port") => FieldValue::from(b.port),
            _ => {
                return Err(Error::UnknownField {
                    body: self.name(),
                    field: name.to_owned(),
                })
            }
        };
        Ok(value)
    }

    /// Writes one field by name.
    ///
    /// Integers must fit the wire field, floats are accepted wherever human units are.  The
    /// waveform takes a name ("triangle") or its number, the service takes "udp" or a number.
    pub fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), Error> {
        let field = self.lookup(name)?;
        let body = self.name();
        let color = match &mut *self {
            Body::StateLight(b) => Some(&mut b.color),
            Body::SetColor(b) => Some(&mut b.color),
            Body::SetWaveform(b) => Some(&mut b.color),
            _ => None,
        };
        if let Some(color) = color {
            if set_color_field(color, field, &value)? {
                return Ok(());
            }
        }
        match (self, field) {
            (Body::StateService(b), "service") => {
                b.service = match &value {
                    FieldValue::Text(s) if s == "udp" => Service::Udp as u8,
                    _ => value.to_int(field)?,
                }
            }
            (Body::StateService(b), "port") => b.port = value.to_int(field)?,
            (Body::StateHostInfo(b), "signal") => b.signal = value.to_float(field)? as f32,
            (Body::StateHostInfo(b), "tx") => b.tx = value.to_int(field)?,
            (Body::StateHostInfo(b), "rx") => b.rx = value.to_int(field)?,
            (Body::StateLight(b), "power") => b.power = value.to_int(field)?,
            (Body::StateLight(b), "label") => b.set_label(value.to_text(field)?),
            (Body::SetColor(b), "duration") => b.duration = value.to_int(field)?,
            (Body::SetWaveform(b), "transient") => b.set_transient(value.to_bool(field)?),
            (Body::SetWaveform(b), "period") => b.period = value.to_int(field)?,
            (Body::SetWaveform(b), "cycles") => b.cycles = value.to_float(field)? as f32,
            (Body::SetWaveform(b), "skew_ratio") => {
                b.set_skew_ratio(value.to_float(field)? as f32)
            }
            (Body::SetWaveform(b), "waveform") => match &value {
                FieldValue::Text(s) => b.set_waveform(s.parse()?),
                _ => b.set_waveform(Waveform::try_from(value.to_int::<u8>(field)?)?),
            },
            (Body::SetPower(b), "level") => b.level = value.to_int(field)?,
            (Body::SetPower(b), "duration") => b.duration = value.to_int(field)?,
            (Body::StatePower(b), "level") => b.level = value.to_int(field)?,
            (Body::StatePower(b), "port") => b.port = value.to_int(field)?,
            _ => {
                return Err(Error::UnknownField {
                    body,
                    field: name.to_owned(),
                })
            }
        }
        Ok(())
    }

    /// The body's name and every named field with its current value.
    pub fn describe(&self) -> (&'static str, Vec<(&'static str, FieldValue)>) {
        let fields = self
            .field_names()
            .iter()
            .filter_map(|&name| self.field(name).ok().map(|value| (name, value)))
            .collect();
        (self.name(), fields)
    }
}
