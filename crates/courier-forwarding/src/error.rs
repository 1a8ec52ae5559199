//! Error types for forwarding operations.
//!
//! Every variant carries enough context to fill the failure document written
//! to the transfer log: HTTP failures keep status and body, transport and
//! routing failures report status code 0.

use std::fmt;

use courier_core::SellerId;
use thiserror::Error;

/// Result type alias for forwarding operations.
pub type Result<T> = std::result::Result<T, ForwardingError>;

/// Errors produced while forwarding one event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForwardingError {
    /// Event data has no usable `seller_id`.
    #[error("seller_id is required in event data")]
    MissingRoutingKey,

    /// `seller_id` is present but not an integer.
    #[error("seller_id must be an integer, got {value}")]
    InvalidRoutingKey {
        /// The offending value as JSON text
        value: String,
    },

    /// No active routing target exists for the seller.
    #[error("seller with id {seller_id} not found or inactive")]
    TargetUnavailable {
        /// Seller that could not be resolved
        seller_id: SellerId,
    },

    /// The routing lookup itself failed.
    #[error("routing lookup failed: {message}")]
    Resolution {
        /// Underlying storage error message
        message: String,
    },

    /// Network-level connectivity failure.
    #[error("network connection failed: {message}")]
    Network {
        /// Error message describing the network failure
        message: String,
    },

    /// HTTP request timeout exceeded.
    #[error("request timeout after {timeout_ms}ms")]
    Timeout {
        /// Configured timeout in milliseconds
        timeout_ms: u64,
    },

    /// Downstream answered with a non-2xx status.
    #[error("downstream responded with HTTP {status_code} {status_text}")]
    Http {
        /// HTTP status code
        status_code: u16,
        /// Canonical reason phrase
        status_text: String,
        /// Response body content
        body: String,
    },

    /// Invalid routing target or client configuration.
    #[error("invalid forwarding configuration: {message}")]
    Configuration {
        /// Configuration error message
        message: String,
    },
}

impl ForwardingError {
    /// Creates an invalid routing key error from the offending JSON value.
    pub fn invalid_routing_key(value: &serde_json::Value) -> Self {
        Self::InvalidRoutingKey { value: value.to_string() }
    }

    /// Creates a target unavailable error.
    pub fn target_unavailable(seller_id: SellerId) -> Self {
        Self::TargetUnavailable { seller_id }
    }

    /// Creates a resolution error.
    pub fn resolution(message: impl Into<String>) -> Self {
        Self::Resolution { message: message.into() }
    }

    /// Creates a network error from a message.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    /// Creates a timeout error for a timeout of `timeout_ms` milliseconds.
    pub fn timeout(timeout_ms: u64) -> Self {
        Self::Timeout { timeout_ms }
    }

    /// Creates an HTTP error from a downstream response.
    pub fn http(status_code: u16, status_text: impl Into<String>, body: impl Into<String>) -> Self {
        Self::Http { status_code, status_text: status_text.into(), body: body.into() }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// HTTP status code of the failure, or 0 when no response was received.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Http { status_code, .. } => *status_code,
            _ => 0,
        }
    }

    /// Reason phrase of the failure, empty when no response was received.
    pub fn status_text(&self) -> &str {
        match self {
            Self::Http { status_text, .. } => status_text,
            _ => "",
        }
    }

    /// Response body of the failure, empty when no response was received.
    pub fn response_body(&self) -> &str {
        match self {
            Self::Http { body, .. } => body,
            _ => "",
        }
    }

    /// Returns the category of this error for structured logging.
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::from(self)
    }
}

/// Category of forwarding error for logs and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed event data.
    Validation,
    /// Routing target missing or lookup failure.
    Routing,
    /// Network connectivity issues and timeouts.
    Network,
    /// Non-2xx downstream responses.
    Http,
    /// Configuration problems.
    Configuration,
}

impl From<&ForwardingError> for ErrorCategory {
    fn from(error: &ForwardingError) -> Self {
        match error {
            ForwardingError::MissingRoutingKey | ForwardingError::InvalidRoutingKey { .. } => {
                Self::Validation
            },
            ForwardingError::TargetUnavailable { .. } | ForwardingError::Resolution { .. } => {
                Self::Routing
            },
            ForwardingError::Network { .. } | ForwardingError::Timeout { .. } => Self::Network,
            ForwardingError::Http { .. } => Self::Http,
            ForwardingError::Configuration { .. } => Self::Configuration,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Routing => write!(f, "routing"),
            Self::Network => write!(f, "network"),
            Self::Http => write!(f, "http"),
            Self::Configuration => write!(f, "configuration"),
        }
    }
}
