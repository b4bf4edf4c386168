#![no_main]
use libfuzzer_sys::fuzz_target;

use lifx_lan_core::{Body, Header, Message};

fuzz_target!(|data: &[u8]| {
    let msg = Message::from_bytes(data, None);
    match msg.decode() {
        Ok((header, body)) => {
            let _ = body.to_string();
            if let Some(color) = body.color() {
                let _ = color.rgb();
            }
            if let Body::Raw(raw) = &body {
                assert_eq!(raw.len(), data.len() - Header::SIZE);
            }
            let _ = header.to_string();
        }
        Err(_) => assert!(data.len() < 36),
    }
});
