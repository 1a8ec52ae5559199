//! Event envelope decoding.
//!
//! Payloads are JSON objects of the form `{"eventType": <tag>, "data": {...}}`.

use std::{fmt, str::FromStr};

use serde_json::Value;

use crate::error::{ConsumerError, Result};

/// Envelope field holding the event type tag.
pub const EVENT_TYPE_FIELD: &str = "eventType";

/// Envelope field holding the event data.
pub const DATA_FIELD: &str = "data";

const MISSING_EVENT_TYPE: &str = "<missing>";

/// Event types the router dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// `upsert-customer`
    UpsertCustomer,
    /// `upsert-doc-offers`
    UpsertDocOffers,
}

impl EventKind {
    /// Wire tag of the event type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UpsertCustomer => "upsert-customer",
            Self::UpsertDocOffers => "upsert-doc-offers",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = ConsumerError;

    fn from_str(tag: &str) -> Result<Self> {
        match tag {
            "upsert-customer" => Ok(Self::UpsertCustomer),
            "upsert-doc-offers" => Ok(Self::UpsertDocOffers),
            other => Err(ConsumerError::unsupported_event_type(other)),
        }
    }
}

/// A decoded event ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Event type.
    pub kind: EventKind,
    /// Event data, `null` when the envelope has none.
    pub data: Value,
}

impl Event {
    /// Interprets a decoded payload as an event envelope.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedEventType` when the payload is not an object, the
    /// tag is missing or not a string, or the tag is unknown.
    pub fn from_envelope(payload: Value) -> Result<Self> {
        let Value::Object(mut envelope) = payload else {
            return Err(ConsumerError::unsupported_event_type(MISSING_EVENT_TYPE));
        };

        let kind = match envelope.get(EVENT_TYPE_FIELD) {
            Some(Value::String(tag)) => tag.parse::<EventKind>()?,
            Some(other) => return Err(ConsumerError::unsupported_event_type(other.to_string())),
            None => return Err(ConsumerError::unsupported_event_type(MISSING_EVENT_TYPE)),
        };

        let data = envelope.remove(DATA_FIELD).unwrap_or(Value::Null);

        Ok(Self { kind, data })
    }
}

/// Decodes a raw payload as JSON.
///
/// # Errors
///
/// Returns `ConsumerError::Decode` when the payload is not valid JSON.
pub fn decode_payload(payload: &[u8]) -> Result<Value> {
    serde_json::from_slice(payload).map_err(|e| ConsumerError::decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn known_envelopes_decode() {
        let event = Event::from_envelope(json!({
            "eventType": "upsert-customer",
            "data": {"seller_id": 1}
        }))
        .unwrap();

        assert_eq!(event.kind, EventKind::UpsertCustomer);
        assert_eq!(event.data, json!({"seller_id": 1}));
    }

    #[test]
    fn missing_data_becomes_null() {
        let event = Event::from_envelope(json!({"eventType": "upsert-doc-offers"})).unwrap();
        assert_eq!(event.kind, EventKind::UpsertDocOffers);
        assert_eq!(event.data, Value::Null);
    }

    #[test]
    fn unknown_or_missing_tags_are_unsupported() {
        for (payload, expected) in [
            (json!({"eventType": "delete-customer"}), "delete-customer"),
            (json!({"data": {}}), "<missing>"),
            (json!({"eventType": 5}), "5"),
            (json!([1, 2, 3]), "<missing>"),
        ] {
            match Event::from_envelope(payload) {
                Err(ConsumerError::UnsupportedEventType { event_type }) => {
                    assert_eq!(event_type, expected);
                },
                other => panic!("unexpected result: {other:?}"),
            }
        }
    }

    #[test]
    fn invalid_json_is_decode_error() {
        assert!(matches!(decode_payload(b"{not json"), Err(ConsumerError::Decode { .. })));
        assert_eq!(decode_payload(b"{\"a\":1}").unwrap(), json!({"a": 1}));
    }
}
