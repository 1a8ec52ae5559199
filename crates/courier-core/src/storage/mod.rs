//! Database access layer for routing lookups and the transfer log.
//!
//! Repositories translate between domain models and the `sellers` and
//! `transfer_log` tables. All SQL lives in this module.

use std::sync::Arc;

use sqlx::PgPool;

pub mod audit_log;
pub mod routing_targets;

use crate::error::Result;

/// Schema for the tables courier reads and writes.
///
/// Deployments usually own these tables already; `ensure_schema` only creates
/// them when missing, which keeps local and test databases usable.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS sellers (
        id BIGINT PRIMARY KEY,
        "name" TEXT,
        ip_address TEXT,
        port INTEGER,
        "x-api-key" TEXT,
        is_active BOOLEAN NOT NULL DEFAULT TRUE
    )
    "#,
    r"
    CREATE TABLE IF NOT EXISTS transfer_log (
        id BIGSERIAL PRIMARY KEY,
        title TEXT NOT NULL,
        request TEXT NOT NULL,
        transaction_id TEXT NOT NULL,
        error_message TEXT NOT NULL DEFAULT '',
        created_at TIMESTAMPTZ NOT NULL,
        response_message TEXT NOT NULL DEFAULT ''
    )
    ",
];

/// Container for all repository instances.
///
/// Repositories share one connection pool.
#[derive(Clone)]
pub struct Storage {
    /// Repository for seller routing lookups.
    pub routing_targets: Arc<routing_targets::Repository>,

    /// Repository for the append-only transfer log.
    pub audit_log: Arc<audit_log::Repository>,

    pool: Arc<PgPool>,
}

impl Storage {
    /// Creates a new storage instance with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        let pool = Arc::new(pool);

        Self {
            routing_targets: Arc::new(routing_targets::Repository::new(pool.clone())),
            audit_log: Arc::new(audit_log::Repository::new(pool.clone())),
            pool,
        }
    }

    /// Returns the shared connection pool.
    pub fn pool(&self) -> Arc<PgPool> {
        self.pool.clone()
    }

    /// Performs a health check on the database connection.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Database` if the connection is unhealthy.
    pub async fn health_check(&self) -> Result<()> {
        let _: (i32,) = sqlx::query_as("SELECT 1").fetch_one(&*self.pool).await?;

        Ok(())
    }

    /// Creates the `sellers` and `transfer_log` tables if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Database` if any statement fails.
    pub async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&*self.pool).await?;
        }

        Ok(())
    }
}
