//! Outcome of one forwarding attempt and its transfer log representation.

use chrono::{DateTime, Utc};
use courier_core::{AuditRecord, CorrelationId};
use serde::Serialize;

use crate::error::ForwardingError;

/// Result of a single forwarding attempt.
///
/// Always produced, whatever the exit path, and always turned into exactly one
/// [`AuditRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardingOutcome {
    /// Downstream accepted the event.
    Success {
        /// Response body text
        response_body: String,
    },
    /// The attempt failed before or at the downstream call.
    Failure {
        /// HTTP status code, 0 when no response was received
        status_code: u16,
        /// Reason phrase, empty when no response was received
        status_text: String,
        /// Response body, empty when no response was received
        response_body: String,
        /// Human-readable failure description
        message: String,
        /// Attempt number of the failed message
        retry_count: u32,
    },
}

/// Failure document stored in the transfer log `error_message` column.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FailureDocument<'a> {
    message: &'a str,
    status_code: u16,
    status_text: &'a str,
    response_data: &'a str,
    retry_count: u32,
}

impl ForwardingOutcome {
    /// Creates a success outcome.
    pub fn success(response_body: impl Into<String>) -> Self {
        Self::Success { response_body: response_body.into() }
    }

    /// Creates a failure outcome from a forwarding error.
    pub fn failure(error: &ForwardingError, retry_count: u32) -> Self {
        Self::Failure {
            status_code: error.status_code(),
            status_text: error.status_text().to_string(),
            response_body: error.response_body().to_string(),
            message: error.to_string(),
            retry_count,
        }
    }

    /// Whether the attempt succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Value of the `error_message` column: empty on success, the JSON
    /// failure document otherwise.
    pub fn error_message(&self) -> String {
        match self {
            Self::Success { .. } => String::new(),
            Self::Failure { status_code, status_text, response_body, message, retry_count } => {
                let document = FailureDocument {
                    message,
                    status_code: *status_code,
                    status_text,
                    response_data: response_body,
                    retry_count: *retry_count,
                };
                serde_json::to_string(&document).unwrap_or_else(|_| message.clone())
            },
        }
    }

    /// Value of the `response_message` column: the body on success, empty
    /// otherwise.
    pub fn response_message(&self) -> String {
        match self {
            Self::Success { response_body } => response_body.clone(),
            Self::Failure { .. } => String::new(),
        }
    }

    /// Builds the transfer log record for this outcome.
    pub fn into_audit_record(
        self,
        title: impl Into<String>,
        request: serde_json::Value,
        correlation_id: CorrelationId,
        created_at: DateTime<Utc>,
    ) -> AuditRecord {
        AuditRecord {
            title: title.into(),
            request,
            correlation_id,
            error_message: self.error_message(),
            response_message: self.response_message(),
            created_at,
        }
    }
}
