//! This crate provides the message codec and the discovery loop for the LIFX LAN protocol.
//!
//! This lets you talk to lights on your local area network.  More info can be found here:
//! https://lan.developer.lifx.com/
//!
//! The codec itself ([Header], [Body], [Message]) is pure: it never touches the network and
//! keeps no state besides the fields of the value being encoded or decoded.  The
//! [discovery::Discovery] state machine only needs something that can send a datagram and
//! something that can schedule a timer; the [udp] module (enabled by the `runtime-tokio`
//! feature) provides both on top of tokio.
//!
//! # Discovery
//!
//! To discover lights on your LAN, send a [MessageType::GetService] message as a UDP broadcast
//! to port 56700.  Every device answers with a [body::StateService] message.  To get additional
//! info about each device, send further Get messages directly to the address that answered.
//!
//! # Reserved fields
//! When *constructing* packets, every reserved field is written as zero.  However, it's
//! possible to receive packets with these fields set to non-zero values.  Be conservative in
//! what you send, and liberal in what you accept.
//!
//! # Unknown values
//! It's common to see packets from LIFX bulbs that don't match the documented protocol, or
//! that come from newer firmware.  Those never fail to decode: the header is still available,
//! and the payload is handed back as raw bytes ([Body::Raw]).

use std::{io, str::Utf8Error};

pub mod body;
pub mod color;
pub mod discovery;
pub mod fields;
pub mod header;
pub mod msg;
mod rw;

#[cfg(feature = "runtime-tokio")]
pub mod udp;

pub use body::{Body, Label, Payload, Service, Waveform};
pub use color::{describe_kelvin, HSBK};
pub use fields::FieldValue;
pub use header::{BuildOptions, Header, MessageType};
pub use msg::Message;

/// The only protocol number LIFX devices speak.
pub const PROTOCOL_NUMBER: u16 = 1024;

/// UDP port LIFX devices listen on.
pub const DEFAULT_PORT: u16 = 56700;

/// Various message encoding/decoding errors
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The buffer is too short to hold a 36-byte frame header.
    #[error("malformed header: need 36 bytes, got {0}")]
    MalformedHeader(usize),

    /// The message type is not in the body registry (or the name is not a known type).
    ///
    /// LIFX devices are known to send messages that are not officially documented, so this
    /// error does not necessarily represent a bug.  [Message::decode] never returns it; the
    /// payload is handed back as [Body::Raw] instead.
    #[error("unknown message type {0}")]
    UnknownMessageType(u16),

    /// The name is not one of the snake_case message type names.
    #[error("unknown message type name {0:?}")]
    UnknownMessageName(String),

    /// A known message type arrived with a payload of the wrong length.
    #[error("body of {typ} should be {expected} bytes, got {actual}")]
    BodyLengthMismatch {
        typ: MessageType,
        expected: usize,
        actual: usize,
    },

    /// An enumerated field holds a value outside of its domain.
    ///
    /// Only the accessor for that one field fails; the rest of the body is still readable.
    #[error("invalid value {value} for {field}")]
    InvalidEnumValue { field: &'static str, value: u8 },

    /// Not one of the waveform names (saw, sine, halfsine, triangle, pulse).
    #[error("unknown waveform {0:?}")]
    UnknownWaveform(String),

    /// Not one of the body names accepted by [Body::named].
    #[error("unknown body name {0:?}")]
    UnknownBodyName(String),

    /// The body has no field by that name.
    #[error("{body} has no field {field:?}")]
    UnknownField { body: &'static str, field: String },

    /// The value doesn't fit the field it was given for.
    #[error("invalid value {value} for field {field}")]
    InvalidFieldValue { field: &'static str, value: String },

    /// A label holds bytes that aren't valid UTF-8.
    #[error("label is not valid UTF-8: {0}")]
    LabelEncoding(#[source] Utf8Error),

    /// A hex string could not be turned into message bytes.
    #[error("invalid wire string: {0}")]
    InvalidWireString(String),

    /// The encoded frame would not fit the 16-bit size field.
    #[error("frame of {0} bytes is too large")]
    FrameTooLarge(usize),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
