//! Core domain models and storage for the courier bridge.
//!
//! Provides strongly-typed identifiers, routing targets, audit records, the
//! clock abstraction and PostgreSQL repositories. The forwarding and consumer
//! crates depend on these foundational types.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod models;
pub mod storage;
pub mod time;

pub use error::{CoreError, Result};
pub use models::{AuditRecord, CorrelationId, RoutingTarget, SellerId};
pub use time::{Clock, RealClock, TestClock};
