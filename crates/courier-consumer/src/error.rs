//! Error types for message consumption.
//!
//! Per-message errors never escape the consumer: they are turned into an
//! acknowledge, republish or reject decision. Broker errors drive the
//! reconnect loop.

use courier_forwarding::ForwardingError;
use thiserror::Error;

/// Result type alias for consumer operations.
pub type Result<T> = std::result::Result<T, ConsumerError>;

/// Errors produced while consuming and handling messages.
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// Message payload is not valid JSON.
    #[error("failed to decode message payload: {message}")]
    Decode {
        /// Decoder error message
        message: String,
    },

    /// Event type tag is not one the router handles.
    #[error("unsupported event type: {event_type}")]
    UnsupportedEventType {
        /// The tag found in the envelope, or `<missing>`
        event_type: String,
    },

    /// Forwarding the event failed.
    #[error(transparent)]
    Forwarding(#[from] ForwardingError),

    /// Broker connection or channel operation failed.
    #[error("broker error: {message}")]
    Broker {
        /// Broker error message
        message: String,
    },

    /// Republishing a message failed or was not confirmed.
    #[error("publish failed: {message}")]
    Publish {
        /// Publish error message
        message: String,
    },

    /// Invalid broker or consumer configuration.
    #[error("invalid consumer configuration: {message}")]
    Configuration {
        /// Configuration error message
        message: String,
    },

    /// Graceful shutdown did not finish in time.
    #[error("shutdown timed out after {timeout_seconds}s")]
    ShutdownTimeout {
        /// Configured grace period in seconds
        timeout_seconds: u64,
    },
}

impl ConsumerError {
    /// Creates a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode { message: message.into() }
    }

    /// Creates an unsupported event type error.
    pub fn unsupported_event_type(event_type: impl Into<String>) -> Self {
        Self::UnsupportedEventType { event_type: event_type.into() }
    }

    /// Creates a broker error.
    pub fn broker(message: impl Into<String>) -> Self {
        Self::Broker { message: message.into() }
    }

    /// Creates a publish error.
    pub fn publish(message: impl Into<String>) -> Self {
        Self::Publish { message: message.into() }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }
}

impl From<lapin::Error> for ConsumerError {
    fn from(err: lapin::Error) -> Self {
        Self::broker(err.to_string())
    }
}
