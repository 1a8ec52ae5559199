//! Test infrastructure for deterministic courier testing.
//!
//! Provides a wiremock-backed downstream API, a forwarding harness wired with
//! in-memory resolver and recorder plus a controllable clock, and builders
//! for event envelopes.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod fixtures;
pub mod harness;
pub mod http;

pub use courier_core::{AuditRecord, Clock, CorrelationId, RoutingTarget, SellerId, TestClock};
pub use fixtures::{envelope, EventBuilder};
pub use harness::ForwardingHarness;
pub use http::DownstreamServer;
