//! Health endpoints for orchestration probes.
//!
//! `/health` reports the broker connection state and database reachability;
//! `/health/live` only says the process is serving requests.

use std::{sync::Arc, time::Instant};

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use courier_consumer::ConnectionState;
use courier_core::{storage::Storage, Clock};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

/// Shared state of the health endpoints.
#[derive(Clone)]
pub struct HealthState {
    storage: Arc<Storage>,
    broker: watch::Receiver<ConnectionState>,
    clock: Arc<dyn Clock>,
}

impl HealthState {
    /// Creates the state from storage and a broker state subscription.
    pub fn new(
        storage: Arc<Storage>,
        broker: watch::Receiver<ConnectionState>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { storage, broker, clock }
    }
}

/// Health check response body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status
    pub status: HealthStatus,
    /// When the check ran
    pub timestamp: DateTime<Utc>,
    /// Per-component results
    pub checks: HealthChecks,
    /// Service version
    pub version: String,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Broker connected and database reachable
    Healthy,
    /// At least one dependency is unavailable
    Degraded,
}

/// Component results.
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    /// Database reachability
    pub database: ComponentHealth,
    /// Broker connection
    pub broker: BrokerHealth,
}

/// Database check result.
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    /// Component status
    pub status: ComponentStatus,
    /// Error detail when down
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Check duration in milliseconds
    pub response_time_ms: u64,
}

/// Broker check result.
#[derive(Debug, Serialize)]
pub struct BrokerHealth {
    /// Component status
    pub status: ComponentStatus,
    /// Connection state
    pub state: ConnectionState,
}

/// Component-level status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Available
    Up,
    /// Unavailable
    Down,
}

/// Creates the health router.
pub fn create_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/live", get(liveness_check))
        .with_state(state)
}

/// Full health check. Responds 503 when degraded.
#[instrument(name = "health_check", skip(state))]
pub async fn health_check(State(state): State<HealthState>) -> Response {
    let broker_state = *state.broker.borrow();
    let broker_status =
        if broker_state.is_connected() { ComponentStatus::Up } else { ComponentStatus::Down };

    let started = Instant::now();
    let (database_status, message) = match state.storage.health_check().await {
        Ok(()) => (ComponentStatus::Up, None),
        Err(e) => {
            warn!(error = %e, "database health check failed");
            (ComponentStatus::Down, Some(format!("Database connection failed: {e}")))
        },
    };
    let response_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    let status = if database_status == ComponentStatus::Up && broker_status == ComponentStatus::Up
    {
        HealthStatus::Healthy
    } else {
        HealthStatus::Degraded
    };

    let response = HealthResponse {
        status,
        timestamp: state.clock.now_utc(),
        checks: HealthChecks {
            database: ComponentHealth { status: database_status, message, response_time_ms },
            broker: BrokerHealth { status: broker_status, state: broker_state },
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    let status_code = match status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Degraded => StatusCode::SERVICE_UNAVAILABLE,
    };

    debug!(?status, broker = %broker_state, database = ?database_status, "health check completed");

    (status_code, Json(response)).into_response()
}

/// Liveness probe. Touches no dependency.
#[instrument(name = "liveness_check", skip(state))]
pub async fn liveness_check(State(state): State<HealthState>) -> Response {
    let response = serde_json::json!({
        "status": "alive",
        "timestamp": state.clock.now_utc(),
        "service": "courier"
    });

    (StatusCode::OK, Json(response)).into_response()
}
