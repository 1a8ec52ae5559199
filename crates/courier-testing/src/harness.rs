//! Forwarding harness with in-memory collaborators.

use std::{
    sync::Arc,
    time::{Duration, UNIX_EPOCH},
};

use anyhow::{Context, Result};
use courier_core::{AuditRecord, CorrelationId, RoutingTarget, SellerId, TestClock};
use courier_forwarding::{
    storage::mock::{MockAuditRecorder, MockRoutingResolver},
    ClientConfig, ForwardingClient, ForwardingGateway,
};

use crate::http::DownstreamServer;

/// Start of the harness clock: 2025-10-09T18:13:20Z.
pub const HARNESS_EPOCH_SECONDS: u64 = 1_760_033_600;

/// Client timeout used by the harness.
pub const HARNESS_TIMEOUT: Duration = Duration::from_millis(500);

/// A forwarding gateway wired to a mock downstream, an in-memory resolver and
/// recorder, and a test clock.
///
/// ```no_run
/// # async fn example() -> anyhow::Result<()> {
/// use courier_testing::ForwardingHarness;
///
/// let harness = ForwardingHarness::new().await?;
/// harness.add_seller(7).await;
/// harness.downstream.respond("/api/fuma/customer/upsert", 200).await;
/// # Ok(())
/// # }
/// ```
pub struct ForwardingHarness {
    /// Downstream seller API.
    pub downstream: DownstreamServer,
    /// Routing lookups.
    pub resolver: MockRoutingResolver,
    /// Audit log.
    pub recorder: MockAuditRecorder,
    /// Clock stamped onto audit records.
    pub clock: TestClock,
    gateway: Arc<ForwardingGateway>,
}

impl ForwardingHarness {
    /// Starts the downstream and builds the gateway.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built.
    pub async fn new() -> Result<Self> {
        Self::with_timeout(HARNESS_TIMEOUT).await
    }

    /// Like [`ForwardingHarness::new`] with a custom client timeout.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built.
    pub async fn with_timeout(timeout: Duration) -> Result<Self> {
        let downstream = DownstreamServer::start().await;
        let resolver = MockRoutingResolver::new();
        let recorder = MockAuditRecorder::new();
        let clock =
            TestClock::with_start_time(UNIX_EPOCH + Duration::from_secs(HARNESS_EPOCH_SECONDS));

        let client = ForwardingClient::new(ClientConfig { timeout, ..ClientConfig::default() })
            .context("failed to build forwarding client")?;

        let gateway = Arc::new(ForwardingGateway::new(
            Arc::new(resolver.clone()),
            Arc::new(recorder.clone()),
            client,
            Arc::new(clock.clone()),
        ));

        Ok(Self { downstream, resolver, recorder, clock, gateway })
    }

    /// Shared gateway handle.
    pub fn gateway(&self) -> Arc<ForwardingGateway> {
        self.gateway.clone()
    }

    /// Registers an active seller pointing at the downstream, with api key
    /// `key-{id}`.
    pub async fn add_seller(&self, id: i64) -> RoutingTarget {
        let target = RoutingTarget::new(SellerId(id), self.downstream.url())
            .with_name(format!("seller-{id}"))
            .with_api_key(Self::api_key_for(id));
        self.resolver.add_target(target.clone()).await;
        target
    }

    /// Registers an inactive seller pointing at the downstream.
    pub async fn add_inactive_seller(&self, id: i64) -> RoutingTarget {
        let target = RoutingTarget::new(SellerId(id), self.downstream.url()).inactive();
        self.resolver.add_target(target.clone()).await;
        target
    }

    /// Api key registered by [`ForwardingHarness::add_seller`].
    pub fn api_key_for(id: i64) -> String {
        format!("key-{id}")
    }

    /// All audit records written so far.
    pub async fn audit_records(&self) -> Vec<AuditRecord> {
        self.recorder.recorded().await
    }

    /// Audit records for one correlation id.
    pub async fn audit_records_for(&self, correlation_id: &str) -> Vec<AuditRecord> {
        self.recorder.recorded_for(&CorrelationId::new(correlation_id)).await
    }
}
