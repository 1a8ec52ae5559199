//! Forwarding gateway for queue events.
//!
//! Turns one decoded event into one HTTP call against the seller's own
//! endpoint, and records the attempt in the transfer log whatever happens.
//!
//! # Flow
//!
//! 1. **Validate** - extract the `seller_id` routing key from the event data
//! 2. **Resolve** - look up the active routing target through a
//!    [`RoutingResolver`](storage::RoutingResolver)
//! 3. **Forward** - `POST` the event data to the destination URL with the
//!    seller's `x-api-key`
//! 4. **Audit** - append exactly one record through an
//!    [`AuditRecorder`](storage::AuditRecorder)
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use courier_core::{CorrelationId, RealClock};
//! use courier_forwarding::{
//!     storage::mock::{MockAuditRecorder, MockRoutingResolver},
//!     ClientConfig, ForwardingClient, ForwardingGateway,
//! };
//!
//! # async fn example() -> courier_forwarding::Result<()> {
//! let gateway = ForwardingGateway::new(
//!     Arc::new(MockRoutingResolver::new()),
//!     Arc::new(MockAuditRecorder::new()),
//!     ForwardingClient::new(ClientConfig::default())?,
//!     Arc::new(RealClock::new()),
//! );
//!
//! let data = serde_json::json!({ "seller_id": 42, "name": "Ada" });
//! gateway.upsert_customer(&data, &CorrelationId::new("msg-1"), 1).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod destination;
pub mod error;
pub mod gateway;
pub mod outcome;
pub mod storage;

pub use client::{ClientConfig, ForwardRequest, ForwardResponse, ForwardingClient};
pub use error::{ErrorCategory, ForwardingError, Result};
pub use gateway::{ForwardingGateway, Operation};
pub use outcome::ForwardingOutcome;

/// Default HTTP request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Default maximum number of redirects followed per request.
pub const DEFAULT_MAX_REDIRECTS: u32 = 3;

/// Downstream path for customer upserts.
pub const CUSTOMER_UPSERT_PATH: &str = "/api/fuma/customer/upsert";

/// Downstream path for document offer upserts.
pub const DOC_OFFERS_UPSERT_PATH: &str = "/api/fuma/doc-orders/upsert";

/// Header carrying the seller credential.
pub const API_KEY_HEADER: &str = "x-api-key";
