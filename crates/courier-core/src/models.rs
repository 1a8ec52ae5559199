//! Core domain models and strongly-typed identifiers.
//!
//! Defines routing targets, audit records and the newtype identifiers that
//! thread one logical event through consumption, forwarding and audit.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

type PgDb = sqlx::Postgres;
type PgValueRef<'r> = sqlx::postgres::PgValueRef<'r>;
type PgTypeInfo = sqlx::postgres::PgTypeInfo;
type PgArgumentBuffer = sqlx::postgres::PgArgumentBuffer;
type EncodeResult =
    Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync + 'static>>;
type BoxDynError = sqlx::error::BoxDynError;

/// Correlation id used when a message carries no `messageId` property.
pub const UNKNOWN_CORRELATION_ID: &str = "unknown";

/// Strongly-typed seller identifier.
///
/// The seller id is the routing key of an event: it selects the downstream
/// endpoint the event is forwarded to.
///
/// # Example
///
/// ```
/// use courier_core::models::SellerId;
/// let seller_id = SellerId(42);
/// assert_eq!(seller_id.to_string(), "42");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SellerId(pub i64);

impl fmt::Display for SellerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for SellerId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl sqlx::Type<PgDb> for SellerId {
    fn type_info() -> PgTypeInfo {
        <i64 as sqlx::Type<PgDb>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, PgDb> for SellerId {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let id = <i64 as sqlx::Decode<PgDb>>::decode(value)?;
        Ok(Self(id))
    }
}

impl sqlx::Encode<'_, PgDb> for SellerId {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> EncodeResult {
        <i64 as sqlx::Encode<PgDb>>::encode_by_ref(&self.0, buf)
    }
}

/// Application-level correlation identifier (`messageId`).
///
/// Follows one logical event through consumption, forwarding, every retry
/// and the audit log. Messages published without a `messageId` are tracked
/// as `"unknown"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Creates a correlation id from its string form.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Builds a correlation id from an optional broker property.
    ///
    /// Missing or blank values fall back to `"unknown"`.
    pub fn from_property(value: Option<&str>) -> Self {
        match value {
            Some(id) if !id.trim().is_empty() => Self(id.to_string()),
            _ => Self::unknown(),
        }
    }

    /// The placeholder correlation id for messages without a `messageId`.
    pub fn unknown() -> Self {
        Self(UNKNOWN_CORRELATION_ID.to_string())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the `"unknown"` placeholder.
    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN_CORRELATION_ID
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::unknown()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for CorrelationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Resolved forwarding destination for a seller.
///
/// Loaded from the `sellers` routing table. Only active targets are eligible
/// for forwarding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RoutingTarget {
    /// Seller this target belongs to.
    pub id: SellerId,

    /// Display name of the seller.
    pub name: Option<String>,

    /// Base address, with or without an explicit `http://`/`https://` scheme.
    pub address: String,

    /// Explicit port, if configured.
    pub port: Option<i32>,

    /// Credential sent in the `x-api-key` header.
    pub api_key: Option<String>,

    /// Whether the seller currently accepts forwarded events.
    pub is_active: bool,
}

impl RoutingTarget {
    /// Creates an active target without a port or credential.
    pub fn new(id: SellerId, address: impl Into<String>) -> Self {
        Self { id, name: None, address: address.into(), port: None, api_key: None, is_active: true }
    }

    /// Sets the explicit port.
    #[must_use]
    pub fn with_port(mut self, port: i32) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the credential.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Marks the target inactive.
    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// One row of the append-only transfer log.
///
/// Exactly one record is written per forwarding attempt, whatever the
/// outcome. Records are never updated or deleted by courier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Event type tag of the forwarded event.
    pub title: String,

    /// Event data exactly as it was forwarded.
    pub request: serde_json::Value,

    /// Correlation id of the message that produced the attempt.
    pub correlation_id: CorrelationId,

    /// Failure details as JSON; empty on success.
    pub error_message: String,

    /// Downstream response body; empty on failure.
    pub response_message: String,

    /// When the attempt finished.
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Whether the recorded attempt succeeded.
    pub fn succeeded(&self) -> bool {
        self.error_message.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correlation_id_defaults_to_unknown() {
        assert_eq!(CorrelationId::from_property(None).as_str(), "unknown");
        assert_eq!(CorrelationId::from_property(Some("   ")).as_str(), "unknown");
        assert!(CorrelationId::default().is_unknown());
    }

    #[test]
    fn correlation_id_keeps_property_value() {
        let id = CorrelationId::from_property(Some("msg-123"));
        assert_eq!(id.as_str(), "msg-123");
        assert!(!id.is_unknown());
        assert_eq!(id.to_string(), "msg-123");
    }

    #[test]
    fn routing_target_builder() {
        let target = RoutingTarget::new(SellerId(7), "shop.example.com")
            .with_port(8080)
            .with_api_key("secret")
            .with_name("Shop");

        assert_eq!(target.port, Some(8080));
        assert_eq!(target.api_key.as_deref(), Some("secret"));
        assert_eq!(target.name.as_deref(), Some("Shop"));
        assert!(target.is_active);
        assert!(!target.inactive().is_active);
    }

    #[test]
    fn audit_record_success_is_empty_error() {
        let record = AuditRecord {
            title: "upsert-customer".to_string(),
            request: serde_json::json!({"seller_id": 1}),
            correlation_id: CorrelationId::new("m-1"),
            error_message: String::new(),
            response_message: "{\"ok\":true}".to_string(),
            created_at: Utc::now(),
        };
        assert!(record.succeeded());

        let failed = AuditRecord { error_message: "{}".to_string(), ..record };
        assert!(!failed.succeeded());
    }
}
