//! Storage abstraction layer for the forwarding gateway.
//!
//! The gateway depends on two narrow seams: resolving a seller to its routing
//! target and appending to the transfer log. Production implementations wrap
//! `courier_core::storage::Storage`; tests use the in-memory mocks.

use std::{future::Future, pin::Pin, sync::Arc};

use courier_core::{error::Result, storage::Storage, AuditRecord, RoutingTarget, SellerId};

/// Resolves a seller id to the endpoint its events are forwarded to.
pub trait RoutingResolver: Send + Sync + 'static {
    /// Looks up the active routing target for a seller.
    ///
    /// Returns `None` when the seller does not exist or is inactive.
    fn resolve(
        &self,
        seller_id: SellerId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<RoutingTarget>>> + Send + '_>>;
}

/// Appends forwarding attempts to the transfer log.
pub trait AuditRecorder: Send + Sync + 'static {
    /// Persists one audit record.
    fn record(&self, record: AuditRecord) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Routing resolver backed by the `sellers` table.
pub struct PostgresRoutingResolver {
    storage: Arc<Storage>,
}

impl PostgresRoutingResolver {
    /// Creates a new PostgreSQL resolver.
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }
}

impl RoutingResolver for PostgresRoutingResolver {
    fn resolve(
        &self,
        seller_id: SellerId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<RoutingTarget>>> + Send + '_>> {
        let storage = self.storage.clone();
        Box::pin(async move { storage.routing_targets.find_active_by_id(seller_id).await })
    }
}

/// Audit recorder backed by the `transfer_log` table.
pub struct PostgresAuditRecorder {
    storage: Arc<Storage>,
}

impl PostgresAuditRecorder {
    /// Creates a new PostgreSQL recorder.
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }
}

impl AuditRecorder for PostgresAuditRecorder {
    fn record(&self, record: AuditRecord) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let storage = self.storage.clone();
        Box::pin(async move { storage.audit_log.create(&record).await })
    }
}

/// In-memory implementations for tests.
pub mod mock {
    use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc};

    use courier_core::{error::Result, AuditRecord, CoreError, CorrelationId};
    use tokio::sync::RwLock;

    use super::{AuditRecorder, RoutingResolver, RoutingTarget, SellerId};

    /// Mock routing resolver holding targets in memory.
    ///
    /// Inactive targets are stored but never resolved. Every lookup is
    /// recorded for verification.
    #[derive(Clone, Default)]
    pub struct MockRoutingResolver {
        targets: Arc<RwLock<HashMap<SellerId, RoutingTarget>>>,
        lookups: Arc<RwLock<Vec<SellerId>>>,
        resolve_error: Arc<RwLock<Option<String>>>,
    }

    impl MockRoutingResolver {
        /// Creates a resolver with no targets.
        pub fn new() -> Self {
            Self::default()
        }

        /// Adds or replaces a routing target.
        pub async fn add_target(&self, target: RoutingTarget) {
            self.targets.write().await.insert(target.id, target);
        }

        /// Injects an error for the next lookup.
        pub async fn inject_resolve_error(&self, error: impl Into<String>) {
            *self.resolve_error.write().await = Some(error.into());
        }

        /// Returns every seller id looked up so far.
        pub async fn lookups(&self) -> Vec<SellerId> {
            self.lookups.read().await.clone()
        }
    }

    impl RoutingResolver for MockRoutingResolver {
        fn resolve(
            &self,
            seller_id: SellerId,
        ) -> Pin<Box<dyn Future<Output = Result<Option<RoutingTarget>>> + Send + '_>> {
            Box::pin(async move {
                self.lookups.write().await.push(seller_id);

                let error = self.resolve_error.write().await.take();
                if let Some(error) = error {
                    return Err(CoreError::Database(error));
                }

                Ok(self
                    .targets
                    .read()
                    .await
                    .get(&seller_id)
                    .filter(|target| target.is_active)
                    .cloned())
            })
        }
    }

    /// Mock audit recorder collecting records in memory.
    #[derive(Clone, Default)]
    pub struct MockAuditRecorder {
        records: Arc<RwLock<Vec<AuditRecord>>>,
        record_error: Arc<RwLock<Option<String>>>,
    }

    impl MockAuditRecorder {
        /// Creates an empty recorder.
        pub fn new() -> Self {
            Self::default()
        }

        /// Injects an error for the next write. The record is dropped.
        pub async fn inject_record_error(&self, error: impl Into<String>) {
            *self.record_error.write().await = Some(error.into());
        }

        /// Returns all persisted records in write order.
        pub async fn recorded(&self) -> Vec<AuditRecord> {
            self.records.read().await.clone()
        }

        /// Returns the records written for one correlation id.
        pub async fn recorded_for(&self, correlation_id: &CorrelationId) -> Vec<AuditRecord> {
            self.records
                .read()
                .await
                .iter()
                .filter(|record| &record.correlation_id == correlation_id)
                .cloned()
                .collect()
        }
    }

    impl AuditRecorder for MockAuditRecorder {
        fn record(
            &self,
            record: AuditRecord,
        ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
            Box::pin(async move {
                let error = self.record_error.write().await.take();
                if let Some(error) = error {
                    return Err(CoreError::Database(error));
                }

                self.records.write().await.push(record);
                Ok(())
            })
        }
    }
}
