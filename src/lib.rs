//! Courier: a queue-to-HTTP bridge.
//!
//! Consumes event messages from an AMQP queue, forwards each event to the
//! seller endpoint resolved from the routing table, records every attempt in
//! the transfer log and retries failures by republishing with a bounded
//! attempt counter.
//!
//! This crate holds the process-level pieces: configuration, tracing setup
//! and the health endpoints. The pipeline itself lives in `courier-consumer`
//! and `courier-forwarding`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod health;
pub mod telemetry;

pub use config::{Config, LogFormat};
pub use health::{create_router, HealthState};
pub use telemetry::init_tracing;
