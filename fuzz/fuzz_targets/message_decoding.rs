#![no_main]

//! Fuzz target for inbound message decoding.
//!
//! Arbitrary bytes go through payload decoding, envelope parsing, routing key
//! extraction and retry header parsing. None of these may panic.

use courier_consumer::{
    event::decode_payload,
    message::{retry_count_from_headers, RETRY_COUNT_HEADER},
    Event,
};
use courier_forwarding::gateway::routing_key;
use lapin::types::{AMQPValue, FieldTable, LongString, ShortString};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(payload) = decode_payload(data) {
        if let Ok(event) = Event::from_envelope(payload) {
            let _ = routing_key(&event.data);
        }
    }

    let mut headers = FieldTable::default();
    headers.insert(
        ShortString::from(RETRY_COUNT_HEADER),
        AMQPValue::LongString(LongString::from(String::from_utf8_lossy(data).into_owned())),
    );
    let retry_count = retry_count_from_headers(Some(&headers));
    assert!(retry_count >= 1);
});
