//! Forwarding gateway: one event in, one HTTP call and one audit record out.

use std::{fmt, sync::Arc};

use courier_core::{Clock, CorrelationId, SellerId};
use serde_json::Value;
use tracing::{info_span, Instrument};

use crate::{
    client::{ForwardRequest, ForwardResponse, ForwardingClient},
    destination::destination_url,
    error::{ForwardingError, Result},
    outcome::ForwardingOutcome,
    storage::{AuditRecorder, RoutingResolver},
    CUSTOMER_UPSERT_PATH, DOC_OFFERS_UPSERT_PATH,
};

/// Field in the event data that selects the seller.
pub const ROUTING_KEY_FIELD: &str = "seller_id";

// 2^53: larger floats no longer map to a unique integer.
const MAX_SAFE_FLOAT_ID: f64 = 9_007_199_254_740_992.0;

/// Downstream operation an event is forwarded to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Customer upsert.
    UpsertCustomer,
    /// Document offer upsert.
    UpsertDocOffers,
}

impl Operation {
    /// Path appended to the seller's base URL.
    pub fn path(self) -> &'static str {
        match self {
            Self::UpsertCustomer => CUSTOMER_UPSERT_PATH,
            Self::UpsertDocOffers => DOC_OFFERS_UPSERT_PATH,
        }
    }

    /// Event type tag, used as the transfer log title.
    pub fn title(self) -> &'static str {
        match self {
            Self::UpsertCustomer => "upsert-customer",
            Self::UpsertDocOffers => "upsert-doc-offers",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Forwards events to seller endpoints and records every attempt.
pub struct ForwardingGateway {
    resolver: Arc<dyn RoutingResolver>,
    recorder: Arc<dyn AuditRecorder>,
    client: ForwardingClient,
    clock: Arc<dyn Clock>,
}

impl ForwardingGateway {
    /// Creates a gateway from its collaborators.
    pub fn new(
        resolver: Arc<dyn RoutingResolver>,
        recorder: Arc<dyn AuditRecorder>,
        client: ForwardingClient,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { resolver, recorder, client, clock }
    }

    /// Forwards a customer upsert.
    ///
    /// # Errors
    ///
    /// See [`ForwardingGateway::forward`].
    pub async fn upsert_customer(
        &self,
        data: &Value,
        correlation_id: &CorrelationId,
        retry_count: u32,
    ) -> Result<()> {
        self.forward(Operation::UpsertCustomer, data, correlation_id, retry_count).await
    }

    /// Forwards a document offer upsert.
    ///
    /// # Errors
    ///
    /// See [`ForwardingGateway::forward`].
    pub async fn upsert_doc_offers(
        &self,
        data: &Value,
        correlation_id: &CorrelationId,
        retry_count: u32,
    ) -> Result<()> {
        self.forward(Operation::UpsertDocOffers, data, correlation_id, retry_count).await
    }

    /// Runs one forwarding attempt and appends its audit record.
    ///
    /// The audit write happens after the attempt on every exit path. A failed
    /// audit write is logged and does not change the returned result.
    ///
    /// # Errors
    ///
    /// - `MissingRoutingKey` / `InvalidRoutingKey` for bad `seller_id` values
    /// - `TargetUnavailable` when the seller is unknown or inactive
    /// - `Resolution` when the routing lookup fails
    /// - `Configuration` for unusable routing targets
    /// - `Http`, `Timeout`, `Network` for downstream failures
    pub async fn forward(
        &self,
        operation: Operation,
        data: &Value,
        correlation_id: &CorrelationId,
        retry_count: u32,
    ) -> Result<()> {
        let span = info_span!(
            "forward",
            %operation,
            correlation_id = %correlation_id,
            retry_count
        );

        async move {
            let result = self.attempt(operation, data, correlation_id, retry_count).await;

            let outcome = match &result {
                Ok(response) => ForwardingOutcome::success(response.body.clone()),
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        category = %e.category(),
                        status = e.status_code(),
                        "forwarding failed"
                    );
                    ForwardingOutcome::failure(e, retry_count)
                },
            };

            let record = outcome.into_audit_record(
                operation.title(),
                data.clone(),
                correlation_id.clone(),
                self.clock.now_utc(),
            );
            if let Err(e) = self.recorder.record(record).await {
                tracing::error!(error = %e, "failed to write transfer log");
            }

            result.map(|_| ())
        }
        .instrument(span)
        .await
    }

    async fn attempt(
        &self,
        operation: Operation,
        data: &Value,
        correlation_id: &CorrelationId,
        retry_count: u32,
    ) -> Result<ForwardResponse> {
        let seller_id = routing_key(data)?;

        let target = self
            .resolver
            .resolve(seller_id)
            .await
            .map_err(|e| ForwardingError::resolution(e.to_string()))?
            .filter(|target| target.is_active)
            .ok_or_else(|| ForwardingError::target_unavailable(seller_id))?;

        let url = destination_url(&target.address, target.port, operation.path())?;
        tracing::debug!(%seller_id, %url, "resolved destination");

        let response = self
            .client
            .forward(ForwardRequest {
                url,
                body: data.clone(),
                api_key: target.api_key,
                correlation_id: correlation_id.clone(),
                retry_count,
            })
            .await?;

        response.error_for_status()
    }
}

/// Extracts the seller id routing key from event data.
///
/// Absent, `null`, blank strings and the number zero count as missing.
/// Integral numbers and numeric strings are accepted. The string `"0"` is a
/// present key: it parses to seller 0 and fails at lookup.
///
/// # Errors
///
/// Returns `MissingRoutingKey` for missing values and `InvalidRoutingKey`
/// for values that are not integers.
pub fn routing_key(data: &Value) -> Result<SellerId> {
    let value = match data.get(ROUTING_KEY_FIELD) {
        None | Some(Value::Null) => return Err(ForwardingError::MissingRoutingKey),
        Some(value) => value,
    };

    let id = match value {
        Value::Number(number) => match (number.as_i64(), number.as_f64()) {
            (Some(id), _) => Some(id),
            (None, Some(float)) if float.fract() == 0.0 && float.abs() < MAX_SAFE_FLOAT_ID => {
                Some(float as i64)
            },
            _ => None,
        },
        Value::String(text) if text.trim().is_empty() => {
            return Err(ForwardingError::MissingRoutingKey)
        },
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    };

    match (value, id) {
        (Value::Number(_), Some(0)) => Err(ForwardingError::MissingRoutingKey),
        (_, Some(id)) => Ok(SellerId(id)),
        (_, None) => Err(ForwardingError::invalid_routing_key(value)),
    }
}
