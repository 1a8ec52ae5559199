//! Event envelope builders.

use serde_json::{json, Map, Value};

/// Tag of customer upsert events.
pub const UPSERT_CUSTOMER: &str = "upsert-customer";

/// Tag of document offers upsert events.
pub const UPSERT_DOC_OFFERS: &str = "upsert-doc-offers";

/// Builds `{"eventType": tag, "data": data}`.
pub fn envelope(event_type: &str, data: Value) -> Value {
    json!({ "eventType": event_type, "data": data })
}

/// Builder for event envelopes.
#[derive(Debug, Clone)]
pub struct EventBuilder {
    event_type: Option<Value>,
    data: Map<String, Value>,
}

impl EventBuilder {
    /// Customer upsert for `seller_id`.
    pub fn customer(seller_id: i64) -> Self {
        Self::new(UPSERT_CUSTOMER)
            .field("seller_id", seller_id)
            .field("guid", format!("cust-{seller_id}"))
            .field("name", "Test Customer")
    }

    /// Document offers upsert for `seller_id`.
    pub fn doc_offers(seller_id: i64) -> Self {
        Self::new(UPSERT_DOC_OFFERS)
            .field("seller_id", seller_id)
            .field("offers", json!([{ "sku": "A-1", "price": 10.5 }]))
    }

    /// Empty event with the given tag.
    pub fn new(event_type: &str) -> Self {
        Self { event_type: Some(Value::String(event_type.to_string())), data: Map::new() }
    }

    /// Replaces the tag with an arbitrary JSON value.
    #[must_use]
    pub fn event_type(mut self, value: impl Into<Value>) -> Self {
        self.event_type = Some(value.into());
        self
    }

    /// Drops the `eventType` field.
    #[must_use]
    pub fn without_event_type(mut self) -> Self {
        self.event_type = None;
        self
    }

    /// Sets a field in `data`.
    #[must_use]
    pub fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    /// Removes the routing key from `data`.
    #[must_use]
    pub fn without_seller(mut self) -> Self {
        self.data.remove("seller_id");
        self
    }

    /// The `data` object.
    pub fn data(&self) -> Value {
        Value::Object(self.data.clone())
    }

    /// The full envelope.
    pub fn build(self) -> Value {
        let mut envelope = Map::new();
        if let Some(event_type) = self.event_type {
            envelope.insert("eventType".to_string(), event_type);
        }
        envelope.insert("data".to_string(), Value::Object(self.data));
        Value::Object(envelope)
    }

    /// The envelope serialized as a message body.
    pub fn to_bytes(self) -> Vec<u8> {
        self.build().to_string().into_bytes()
    }
}
