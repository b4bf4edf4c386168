#![no_main]
use libfuzzer_sys::fuzz_target;

use lifx_lan_core::{Body, Header, Message};

fuzz_target!(|data: (Header, Body)| {
    let (mut header, body) = data;
    let typed = match body.message_type() {
        Some(typ) => {
            header.typ = typ;
            true
        }
        None => false,
    };

    let msg = match Message::encode(&header, Some(&body), None) {
        Ok(msg) => msg,
        // raw bodies may not fit in a frame
        Err(_) => return,
    };
    let (decoded_header, decoded_body) = msg.decode().unwrap();
    assert_eq!(decoded_header.typ.tag(), header.typ.tag());

    // NaN floats don't survive a field comparison, the bytes do
    let again = Message::encode(&decoded_header, Some(&decoded_body), None).unwrap();
    if typed {
        assert_eq!(decoded_body.message_type(), body.message_type());
        assert_eq!(again.as_bytes(), msg.as_bytes());
    } else {
        assert_eq!(again.len(), msg.len());
    }
});
