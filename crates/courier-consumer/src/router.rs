//! Dispatch of decoded events to gateway operations.

use std::{future::Future, pin::Pin, sync::Arc};

use courier_core::CorrelationId;
use courier_forwarding::ForwardingGateway;
use serde_json::Value;

use crate::{
    error::Result,
    event::{Event, EventKind},
};

/// Handles one decoded payload.
///
/// The handler only knows this seam; [`MessageRouter`] is the production
/// implementation.
pub trait EventDispatcher: Send + Sync + 'static {
    /// Dispatches a decoded payload.
    fn dispatch<'a>(
        &'a self,
        payload: Value,
        correlation_id: &'a CorrelationId,
        retry_count: u32,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// Routes events to the forwarding gateway by event type.
pub struct MessageRouter {
    gateway: Arc<ForwardingGateway>,
}

impl MessageRouter {
    /// Creates a router over the given gateway.
    pub fn new(gateway: Arc<ForwardingGateway>) -> Self {
        Self { gateway }
    }

    /// Routes one event.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedEventType` for unknown tags and propagates gateway
    /// errors unchanged.
    pub async fn route(
        &self,
        payload: Value,
        correlation_id: &CorrelationId,
        retry_count: u32,
    ) -> Result<()> {
        let event = Event::from_envelope(payload)?;
        tracing::debug!(event_type = %event.kind, "routing event");

        match event.kind {
            EventKind::UpsertCustomer => {
                self.gateway.upsert_customer(&event.data, correlation_id, retry_count).await?;
            },
            EventKind::UpsertDocOffers => {
                self.gateway.upsert_doc_offers(&event.data, correlation_id, retry_count).await?;
            },
        }

        Ok(())
    }
}

impl EventDispatcher for MessageRouter {
    fn dispatch<'a>(
        &'a self,
        payload: Value,
        correlation_id: &'a CorrelationId,
        retry_count: u32,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(self.route(payload, correlation_id, retry_count))
    }
}
