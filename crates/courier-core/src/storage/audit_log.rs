//! Repository for the append-only transfer log.
//!
//! One row per forwarding attempt. Rows are inserted and read back, never
//! updated or deleted.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};

use crate::{
    error::Result,
    models::{AuditRecord, CorrelationId},
};

/// Repository for transfer log operations.
pub struct Repository {
    pool: Arc<PgPool>,
}

#[derive(sqlx::FromRow)]
struct TransferLogRow {
    title: String,
    request: String,
    transaction_id: String,
    error_message: String,
    response_message: String,
    created_at: DateTime<Utc>,
}

impl TransferLogRow {
    fn into_record(self) -> AuditRecord {
        // Rows written by other producers may hold non-JSON text.
        let request = serde_json::from_str(&self.request)
            .unwrap_or(serde_json::Value::String(self.request));

        AuditRecord {
            title: self.title,
            request,
            correlation_id: CorrelationId::new(self.transaction_id),
            error_message: self.error_message,
            response_message: self.response_message,
            created_at: self.created_at,
        }
    }
}

impl Repository {
    /// Creates a new repository instance.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Returns a reference to the database pool.
    pub fn pool(&self) -> Arc<PgPool> {
        self.pool.clone()
    }

    /// Appends an audit record.
    ///
    /// The request payload is stored as serialized JSON text.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or the insert fails.
    pub async fn create(&self, record: &AuditRecord) -> Result<()> {
        self.create_impl(&*self.pool, record).await
    }

    async fn create_impl<'e, E>(&self, executor: E, record: &AuditRecord) -> Result<()>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let request = serde_json::to_string(&record.request)?;

        sqlx::query(
            r"
            INSERT INTO transfer_log (
                title, request, transaction_id, error_message, created_at, response_message
            ) VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(&record.title)
        .bind(request)
        .bind(record.correlation_id.as_str())
        .bind(&record.error_message)
        .bind(record.created_at)
        .bind(&record.response_message)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Lists every record for a correlation id, oldest first.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn find_by_correlation_id(
        &self,
        correlation_id: &CorrelationId,
    ) -> Result<Vec<AuditRecord>> {
        let rows = sqlx::query_as::<_, TransferLogRow>(
            r"
            SELECT title, request, transaction_id, error_message, response_message, created_at
            FROM transfer_log
            WHERE transaction_id = $1
            ORDER BY created_at ASC
            ",
        )
        .bind(correlation_id.as_str())
        .fetch_all(&*self.pool)
        .await?;

        Ok(rows.into_iter().map(TransferLogRow::into_record).collect())
    }
}
