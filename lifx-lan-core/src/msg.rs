//! The message envelope: header bytes followed by body bytes, tied to an optional peer.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::body::Body;
use crate::header::Header;
use crate::Error;

/// A complete LIFX datagram.
///
/// A `Message` is the unit that travels on the network.  It's built either from a [Header] and
/// a [Body] with [Message::encode], or from bytes received off the network with
/// [Message::from_bytes].  The bytes don't change after construction.
///
/// `peer` is the address the message came from (or is going to), if known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    bytes: Vec<u8>,
    peer: Option<SocketAddr>,
}

impl Message {
    /// Serializes a header and an optional body.
    ///
    /// The `size` field of the header is overwritten with the real length of the frame, so it
    /// can be left at zero.
    pub fn encode(
        header: &Header,
        body: Option<&Body>,
        peer: Option<SocketAddr>,
    ) -> Result<Message, Error> {
        let payload = match body {
            Some(body) => body.pack()?,
            None => Vec::new(),
        };
        let total = Header::SIZE + payload.len();
        let size = u16::try_from(total).map_err(|_| Error::FrameTooLarge(total))?;

        let header = Header { size, ..*header };
        let mut bytes = Vec::with_capacity(total);
        bytes.extend_from_slice(&header.pack()?);
        bytes.extend_from_slice(&payload);

        Ok(Message { bytes, peer })
    }

    /// Splits this message into its header and body.
    ///
    /// Only a message too short to hold a header is an error.  A message type without a
    /// registered layout, or a payload whose length doesn't match the layout, gives back the
    /// payload as [Body::Raw].
    pub fn decode(&self) -> Result<(Header, Body), Error> {
        let header = Header::unpack(&self.bytes)?;
        let payload = &self.bytes[Header::SIZE..];

        if usize::from(header.size) != self.bytes.len() {
            log::debug!(
                "{} frame says it is {} bytes, datagram has {}",
                header.typ,
                header.size,
                self.bytes.len()
            );
        }

        let body = match Body::unpack(header.typ, payload) {
            Ok(body) => body,
            Err(e) => {
                log::debug!("keeping {} payload bytes raw: {}", payload.len(), e);
                Body::Raw(payload.to_vec())
            }
        };
        Ok((header, body))
    }

    /// Wraps bytes received from the network.  Nothing is validated until [Message::decode].
    pub fn from_bytes(bytes: impl Into<Vec<u8>>, peer: Option<SocketAddr>) -> Message {
        Message {
            bytes: bytes.into(),
            peer,
        }
    }

    /// Parses a hex string, two characters per byte and no separators.
    ///
    /// ```
    /// # use lifx_lan_core::Message;
    /// let msg = Message::from_wire_string("2400003400000000", None).unwrap();
    /// assert_eq!(msg.as_bytes(), &[0x24, 0x00, 0x00, 0x34, 0x00, 0x00, 0x00, 0x00]);
    /// ```
    pub fn from_wire_string(s: &str, peer: Option<SocketAddr>) -> Result<Message, Error> {
        if s.len() % 2 != 0 {
            return Err(Error::InvalidWireString(format!(
                "odd number of hex digits ({})",
                s.len()
            )));
        }
        let bytes = s
            .as_bytes()
            .chunks(2)
            .map(|pair| match (nibble(pair[0]), nibble(pair[1])) {
                (Some(high), Some(low)) => Ok((high << 4) | low),
                _ => Err(Error::InvalidWireString(format!(
                    "not a hex byte: {:?}",
                    String::from_utf8_lossy(pair)
                ))),
            })
            .collect::<Result<Vec<u8>, Error>>()?;
        Ok(Message { bytes, peer })
    }

    /// Upper-case hex rendering of the bytes, the inverse of [Message::from_wire_string].
    pub fn to_wire_string(&self) -> String {
        self.bytes.iter().map(|b| format!("{:02X}", b)).collect()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn addr(&self) -> Option<IpAddr> {
        self.peer.map(|p| p.ip())
    }

    pub fn port(&self) -> Option<u16> {
        self.peer.map(|p| p.port())
    }
}

fn nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl AsRef<[u8]> for Message {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[")?;
        for (idx, b) in self.bytes.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "0x{:02X}", b)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{self, power, Payload, SetColor, StateLight};
    use crate::color::HSBK;
    use crate::header::{BuildOptions, MessageType};

    const SET_COLOR: &str =
        "310000340000000000000000000000000000000000000000000000000000000066000000005555FFFFFFFFAC0D00040000";

    // captured from a real bulb
    const STATE_LIGHT: &str = "58000054B9715D07D073D5121AF100004C4946585632004D1852421EB5FC82146B000000717ECC4C0957AC0D0000FFFF4C4946582042756C6220313231616631000000000000000000000000000000000000000000000000";
    const ECHO_RESPONSE: &str = "6400005442524B52D073D5121AF100004C4946585632000098FEB52AD57781143B0000004C494658A010B831D577811400000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000";
    const STATE_HOST_INFO: &str = "3200005442524B52D073D5121AF100004C4946585632000098A8DC8FD67781140D0000000000000000000000000000005E0F";

    #[test]
    fn test_decode_set_color_string() {
        let peer: SocketAddr = "1.1.1.1:1".parse().unwrap();
        let msg = Message::from_wire_string(SET_COLOR, Some(peer)).unwrap();
        assert_eq!(msg.addr(), Some("1.1.1.1".parse().unwrap()));
        assert_eq!(msg.port(), Some(1));
        assert_eq!(msg.len(), 49);

        let (header, body) = msg.decode().unwrap();
        assert_eq!(header.size, 49);
        assert_eq!(header.protocol, 1024);
        assert_eq!(header.typ, MessageType::SetColorLight);
        assert_eq!(header.typ.tag(), 102);
        assert!(body.to_string().contains("SetColor"));

        // re-encoding gives back the same bytes
        let again = Message::encode(&header, Some(&body), None).unwrap();
        assert_eq!(again.as_bytes(), msg.as_bytes());
        assert_eq!(again.to_wire_string(), SET_COLOR);
        assert!(again.to_string().starts_with("[0x31, 0x00, 0x00, 0x34, 0x00"));
        assert!(again.to_string().ends_with("0xAC, 0x0D, 0x00, 0x04, 0x00, 0x00]"));
    }

    #[test]
    fn test_build_a_packet() {
        // packet taken from https://lan.developer.lifx.com/docs/building-a-lifx-packet
        let body = Body::from(SetColor {
            reserved: 0,
            color: HSBK {
                hue: 21845,
                saturation: 0xffff,
                brightness: 0xffff,
                kelvin: 3500,
            },
            duration: 1024,
        });
        let header = Header::build(&BuildOptions::default(), MessageType::SetColorLight);

        let bytes = Message::encode(&header, Some(&body), None)
            .unwrap()
            .into_bytes();
        assert_eq!(bytes.len(), 49);
        assert_eq!(
            bytes,
            vec![
                0x31, 0x00, 0x00, 0x34, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
                0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
                0x00, 0x00, 0x00, 0x00, 0x66, 0x00, 0x00, 0x00, 0x00, 0x55, 0x55, 0xFF, 0xFF, 0xFF,
                0xFF, 0xAC, 0x0D, 0x00, 0x04, 0x00, 0x00
            ]
        );
    }

    #[test]
    fn test_set_color_end_to_end() {
        let body = Body::from(SetColor {
            reserved: 0,
            color: HSBK::from_rgb((0, 255, 0), 3500),
            duration: 1024,
        });
        let header = Header::make(MessageType::SetColorLight);
        let msg = Message::encode(&header, Some(&body), None).unwrap();

        let (header, body) = msg.decode().unwrap();
        assert_eq!(header.typ, MessageType::SetColorLight);
        assert!(header.tagged);
        assert!(header.addressable);
        assert!(header.ack_required);
        match body {
            Body::SetColor(b) => {
                assert_eq!(b.color.rgb(), (0, 255, 0));
                assert_eq!(b.color.kelvin, 3500);
                assert_eq!(b.duration, 1024);
            }
            other => panic!("expected SetColor, got {:?}", other),
        }
    }

    #[test]
    fn test_state_light_capture() {
        let msg = Message::from_wire_string(STATE_LIGHT, None).unwrap();
        let (header, body) = msg.decode().unwrap();
        assert_eq!(header.typ, MessageType::StateLight);
        assert_eq!(header.size, 88);
        assert_eq!(header.origin, 1);
        assert!(!header.tagged);
        assert_eq!(header.target, 0x0000_f11a_12d5_73d0);
        assert_eq!(header.sequence, 0x4d);
        assert_eq!(&header.reserved, b"LIFXV2");

        let state: StateLight = match body {
            Body::StateLight(b) => b,
            other => panic!("expected StateLight, got {:?}", other),
        };
        assert_eq!(state.color.hue, 32369);
        assert_eq!(state.color.saturation, 19660);
        assert_eq!(state.color.brightness, 22281);
        assert_eq!(state.color.kelvin, 3500);
        assert_eq!(state.color.rgb(), (61, 87, 86));
        assert_eq!(state.power, power::ON);
        assert_eq!(state.label().unwrap(), "LIFX Bulb 121af1");
    }

    #[test]
    fn test_echo_response_capture() {
        let msg = Message::from_wire_string(ECHO_RESPONSE, None).unwrap();
        let (header, body) = msg.decode().unwrap();
        assert_eq!(header.typ, MessageType::EchoResponse);
        match body {
            Body::EchoResponse(b) => assert_eq!(&b.payload.0[..4], b"LIFX"),
            other => panic!("expected EchoResponse, got {:?}", other),
        }
    }

    #[test]
    fn test_state_host_info_capture() {
        let msg = Message::from_wire_string(STATE_HOST_INFO, None).unwrap();
        let (header, body) = msg.decode().unwrap();
        assert_eq!(header.typ, MessageType::StateHostInfo);
        match body {
            Body::StateHostInfo(b) => {
                assert_eq!(b.signal, 0.0);
                assert_eq!(b.tx, 0);
                assert_eq!(b.rx, 0);
                assert_eq!(b.reserved, 0x0f5e);
            }
            other => panic!("expected StateHostInfo, got {:?}", other),
        }
    }

    #[test]
    fn test_size_field() {
        for &typ in MessageType::ALL {
            let header = Header::make(typ);
            let body = Body::zeroed(typ);
            let msg = Message::encode(&header, body.as_ref(), None).unwrap();
            let expected = Header::SIZE + body.as_ref().map_or(0, Body::packed_size);
            assert_eq!(msg.len(), expected);

            let (decoded, _) = msg.decode().unwrap();
            assert_eq!(usize::from(decoded.size), expected, "{}", typ);
        }

        // header only, even for a type that normally has a payload
        let msg = Message::encode(&Header::make(MessageType::StateLight), None, None).unwrap();
        assert_eq!(msg.len(), 36);
        assert_eq!(msg.as_bytes()[0], 36);
    }

    #[test]
    fn test_frame_too_large() {
        let body = Body::Raw(vec![0; usize::from(u16::MAX)]);
        match Message::encode(&Header::make(MessageType::Unknown(999)), Some(&body), None) {
            Err(Error::FrameTooLarge(n)) => assert_eq!(n, 36 + 65535),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_short_buffers() {
        for len in 0..Header::SIZE {
            let msg = Message::from_bytes(vec![0; len], None);
            match msg.decode() {
                Err(Error::MalformedHeader(n)) => assert_eq!(n, len),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_unknown_type_keeps_payload() {
        let payload = vec![0xde, 0xad, 0xbe, 0xef, 0x01];
        for tag in [0u16, 1, 999, 0x4455, u16::MAX] {
            let header = Header::make(MessageType::from(tag));
            let msg =
                Message::encode(&header, Some(&Body::Raw(payload.clone())), None).unwrap();
            let (header, body) = msg.decode().unwrap();
            assert_eq!(header.typ, MessageType::Unknown(tag));
            assert_eq!(body, Body::Raw(payload.clone()));
        }
    }

    #[test]
    fn test_length_mismatch_falls_back_to_raw() {
        // a SetColor header with only 12 payload bytes
        let mut bytes = Message::from_wire_string(SET_COLOR, None)
            .unwrap()
            .into_bytes();
        bytes.pop();
        let (header, body) = Message::from_bytes(bytes.clone(), None).decode().unwrap();
        assert_eq!(header.typ, MessageType::SetColorLight);
        assert_eq!(body, Body::Raw(bytes[36..].to_vec()));
    }

    #[test]
    fn test_round_trip_with_target() {
        let options = BuildOptions {
            target: Some(0x0000_f11a_12d5_73d0),
            res_required: true,
            sequence: 200,
            source: 0x1234_5678,
            ..Default::default()
        };
        let header = Header::build(&options, MessageType::SetPowerLight);
        let body = Body::from(body::SetPower {
            level: power::ON,
            duration: 250,
        });
        let peer: SocketAddr = "192.168.1.40:56700".parse().unwrap();
        let msg = Message::encode(&header, Some(&body), Some(peer)).unwrap();
        assert_eq!(msg.peer(), Some(peer));
        assert_eq!(msg.len(), 36 + body::SetPower::SIZE);

        let (decoded, decoded_body) = msg.decode().unwrap();
        assert_eq!(decoded, Header { size: 88, ..header });
        assert!(!decoded.tagged);
        assert_eq!(decoded_body, body);
    }

    #[test]
    fn test_wire_string_errors() {
        assert!(matches!(
            Message::from_wire_string("310", None),
            Err(Error::InvalidWireString(_))
        ));
        assert!(matches!(
            Message::from_wire_string("31zz", None),
            Err(Error::InvalidWireString(_))
        ));
        let msg = Message::from_wire_string("fffefd", None).unwrap();
        assert_eq!(msg.as_bytes(), &[0xff, 0xfe, 0xfd]);
        assert_eq!(msg.to_string(), "[0xFF, 0xFE, 0xFD]");
        assert_eq!(msg.to_wire_string(), "FFFEFD");
        assert!(Message::from_wire_string("", None).unwrap().is_empty());
    }
}
