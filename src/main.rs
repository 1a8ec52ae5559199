//! Courier queue-to-HTTP bridge.
//!
//! Main entry point. Wires storage, forwarding, the queue consumer and the
//! health server, then runs until SIGINT or SIGTERM.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use courier::{health, init_tracing, Config, HealthState};
use courier_consumer::{ConnectionManager, MessageHandler, MessageRouter, QueueConsumer};
use courier_core::{storage::Storage, Clock, RealClock};
use courier_forwarding::{
    storage::{PostgresAuditRecorder, PostgresRoutingResolver},
    ForwardingClient, ForwardingGateway,
};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    init_tracing(&config.rust_log, config.log_format)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        broker_url = %config.rabbitmq_url_masked(),
        database_url = %config.database_url_masked(),
        queue = %config.rabbitmq_queue,
        max_retry_count = config.max_retry_count,
        "Starting courier"
    );

    let pool = create_database_pool(&config)?;
    let storage = Arc::new(Storage::new(pool.clone()));
    if let Err(e) = storage.ensure_schema().await {
        warn!(error = %e, "Could not verify database schema, continuing");
    }

    let clock: Arc<dyn Clock> = Arc::new(RealClock::new());
    let client = ForwardingClient::new(config.to_client_config())
        .context("Failed to build forwarding client")?;
    let gateway = Arc::new(ForwardingGateway::new(
        Arc::new(PostgresRoutingResolver::new(storage.clone())),
        Arc::new(PostgresAuditRecorder::new(storage.clone())),
        client,
        clock.clone(),
    ));

    let handler = Arc::new(MessageHandler::new(
        Arc::new(MessageRouter::new(gateway)),
        config.to_retry_policy(),
    ));
    let connection = Arc::new(ConnectionManager::new(config.to_broker_config()));
    let mut consumer = QueueConsumer::new(connection.clone(), handler, config.to_consumer_config())
        .with_clock(clock.clone());
    consumer.start();

    let addr = config.parse_server_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind health server to {addr}"))?;
    let app = health::create_router(HealthState::new(storage, connection.subscribe(), clock));

    info!(%addr, "Health server listening");
    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await
        {
            error!(error = %e, "Health server failed");
        }
    });

    if let Err(e) = server.await {
        error!(error = %e, "Health server task failed");
    }

    info!("Shutdown signal received, stopping consumer");
    if let Err(e) = consumer.shutdown().await {
        error!(error = %e, "Consumer did not shut down cleanly");
    }

    pool.close().await;
    info!("Courier shutdown complete");
    Ok(())
}

/// Creates the lazily connecting database pool.
///
/// The first query opens connections, so a database outage at startup does
/// not stop the consumer.
fn create_database_pool(config: &Config) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(Duration::from_secs(config.database_connection_timeout))
        .idle_timeout(Duration::from_secs(config.database_idle_timeout))
        .max_lifetime(Duration::from_secs(config.database_max_lifetime))
        .connect_lazy(&config.database_url)
        .context("Invalid database URL")
}

/// Waits for CTRL+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received CTRL+C, starting graceful shutdown");
        },
        () = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
