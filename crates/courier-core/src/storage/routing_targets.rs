//! Repository for seller routing lookups.
//!
//! Reads the `sellers` table. The credential column is literally named
//! `x-api-key` and must be quoted.

use std::sync::Arc;

use sqlx::{Executor, PgPool, Postgres};

use crate::{
    error::Result,
    models::{RoutingTarget, SellerId},
};

/// Repository for routing target database operations.
pub struct Repository {
    pool: Arc<PgPool>,
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

    /// Finds the active routing target for a seller.
    ///
    /// Returns `None` when the seller does not exist or is inactive.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn find_active_by_id(&self, seller_id: SellerId) -> Result<Option<RoutingTarget>> {
        let target = sqlx::query_as::<_, RoutingTarget>(
            r#"
            SELECT id::bigint AS id,
                   "name",
                   COALESCE(ip_address, '') AS address,
                   port::integer AS port,
                   "x-api-key" AS api_key,
                   is_active
            FROM public.sellers
            WHERE id = $1 AND is_active = true
            "#,
        )
        .bind(seller_id)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(target)
    }

    /// Inserts or replaces a routing target.
    ///
    /// # Errors
    ///
    /// Returns error if the insert fails.
    pub async fn upsert(&self, target: &RoutingTarget) -> Result<SellerId> {
        self.upsert_impl(&*self.pool, target).await
    }

    async fn upsert_impl<'e, E>(&self, executor: E, target: &RoutingTarget) -> Result<SellerId>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO sellers (id, "name", ip_address, port, "x-api-key", is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                "name" = EXCLUDED."name",
                ip_address = EXCLUDED.ip_address,
                port = EXCLUDED.port,
                "x-api-key" = EXCLUDED."x-api-key",
                is_active = EXCLUDED.is_active
            RETURNING id
            "#,
        )
        .bind(target.id)
        .bind(&target.name)
        .bind(&target.address)
        .bind(target.port)
        .bind(&target.api_key)
        .bind(target.is_active)
        .fetch_one(executor)
        .await?;

        Ok(SellerId(id))
    }
}
