//! Inbound message metadata extraction.
//!
//! Pulls the correlation id and retry counter out of broker properties. The
//! retry counter lives in the `x-retry-count` header; publishers encode it
//! with whatever integer width their client picks, and some send it as text.

use courier_core::CorrelationId;
use lapin::{
    message::Delivery,
    types::{AMQPValue, FieldTable, ShortString},
};

/// Header carrying the attempt counter.
pub const RETRY_COUNT_HEADER: &str = "x-retry-count";

/// Attempt number of a message that carries no usable retry header.
pub const FIRST_ATTEMPT: u32 = 1;

/// A message received from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Broker delivery tag used to ack or reject.
    pub delivery_tag: u64,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
    /// `messageId` property, `"unknown"` when absent.
    pub correlation_id: CorrelationId,
    /// Attempt number, starting at 1.
    pub retry_count: u32,
}

impl InboundMessage {
    /// Creates a first-attempt message with an unknown correlation id.
    pub fn new(delivery_tag: u64, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            delivery_tag,
            payload: payload.into(),
            correlation_id: CorrelationId::unknown(),
            retry_count: FIRST_ATTEMPT,
        }
    }

    /// Sets the correlation id.
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<CorrelationId>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    /// Sets the retry count. Zero is normalized to the first attempt.
    #[must_use]
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count.max(FIRST_ATTEMPT);
        self
    }

    /// Builds a message from a lapin delivery.
    pub fn from_delivery(delivery: &Delivery) -> Self {
        let message_id = delivery.properties.message_id().as_ref().map(|id| id.as_str());

        Self {
            delivery_tag: delivery.delivery_tag,
            payload: delivery.data.clone(),
            correlation_id: CorrelationId::from_property(message_id),
            retry_count: retry_count_from_headers(delivery.properties.headers().as_ref()),
        }
    }
}

/// Reads the attempt number from message headers.
///
/// Absent, zero, negative or unparsable values yield 1. Values beyond
/// `u32::MAX` saturate.
pub fn retry_count_from_headers(headers: Option<&FieldTable>) -> u32 {
    headers
        .and_then(|table| table.inner().get(&ShortString::from(RETRY_COUNT_HEADER)))
        .and_then(header_as_i64)
        .filter(|count| *count > 0)
        .map_or(FIRST_ATTEMPT, |count| u32::try_from(count).unwrap_or(u32::MAX))
}

#[allow(clippy::cast_possible_truncation)]
fn header_as_i64(value: &AMQPValue) -> Option<i64> {
    match value {
        AMQPValue::ShortShortInt(v) => Some(i64::from(*v)),
        AMQPValue::ShortShortUInt(v) => Some(i64::from(*v)),
        AMQPValue::ShortInt(v) => Some(i64::from(*v)),
        AMQPValue::ShortUInt(v) => Some(i64::from(*v)),
        AMQPValue::LongInt(v) => Some(i64::from(*v)),
        AMQPValue::LongUInt(v) => Some(i64::from(*v)),
        AMQPValue::LongLongInt(v) => Some(*v),
        AMQPValue::Float(v) if v.is_finite() => Some(*v as i64),
        AMQPValue::Double(v) if v.is_finite() => Some(*v as i64),
        AMQPValue::ShortString(v) => v.as_str().trim().parse().ok(),
        AMQPValue::LongString(v) => String::from_utf8_lossy(v.as_bytes()).trim().parse().ok(),
        _ => None,
    }
}
