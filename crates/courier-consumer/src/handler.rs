//! Per-message handling protocol.
//!
//! Decode, dispatch, then settle the delivery. Success is acknowledged. Any
//! failure goes through the retry protocol: below the cap a copy with the
//! next `x-retry-count` is published and the original rejected; at the cap
//! the original is rejected and nothing is published. Originals are never
//! requeued.

use std::sync::Arc;

use tracing::{error, info, info_span, warn, Instrument};

use crate::{
    channel::{MessageChannel, OutboundMessage},
    error::ConsumerError,
    event::decode_payload,
    message::InboundMessage,
    retry::{RetryDecision, RetryPolicy},
    router::EventDispatcher,
};

/// How a delivery was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlingOutcome {
    /// Handled successfully and acknowledged.
    Acknowledged,
    /// A retry copy was published and the original rejected.
    Republished {
        /// Attempt number carried by the copy
        retry_count: u32,
    },
    /// Rejected without a retry copy.
    Rejected {
        /// Why no copy was published
        reason: RejectReason,
    },
}

/// Why a failed message was dropped instead of retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The attempt counter reached the policy maximum.
    RetriesExhausted,
    /// The payload could not be decoded for republishing.
    Undecodable,
    /// Publishing the retry copy failed.
    PublishFailed,
}

/// Runs the per-message protocol against a broker channel.
pub struct MessageHandler {
    dispatcher: Arc<dyn EventDispatcher>,
    policy: RetryPolicy,
}

impl MessageHandler {
    /// Creates a handler over a dispatcher and retry policy.
    pub fn new(dispatcher: Arc<dyn EventDispatcher>, policy: RetryPolicy) -> Self {
        Self { dispatcher, policy }
    }

    /// Returns the retry policy.
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Handles one delivery and settles it on `channel`.
    ///
    /// Never fails: every error becomes an ack, republish or reject decision.
    /// Channel failures while settling are logged.
    pub async fn handle_message(
        &self,
        channel: &dyn MessageChannel,
        message: InboundMessage,
    ) -> HandlingOutcome {
        let span = info_span!(
            "handle_message",
            correlation_id = %message.correlation_id,
            retry_count = message.retry_count,
            delivery_tag = message.delivery_tag
        );

        async move {
            let result = match decode_payload(&message.payload) {
                Ok(payload) => {
                    self.dispatcher
                        .dispatch(payload, &message.correlation_id, message.retry_count)
                        .await
                },
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => {
                    if let Err(e) = channel.ack(message.delivery_tag).await {
                        error!(error = %e, "failed to acknowledge message");
                    }
                    info!("message processed");
                    HandlingOutcome::Acknowledged
                },
                Err(e) => {
                    warn!(error = %e, "message processing failed");
                    self.handle_message_error(channel, &message, &e).await
                },
            }
        }
        .instrument(span)
        .await
    }

    /// Applies the retry protocol to a failed message.
    pub async fn handle_message_error(
        &self,
        channel: &dyn MessageChannel,
        message: &InboundMessage,
        cause: &ConsumerError,
    ) -> HandlingOutcome {
        let next_retry_count = match self.policy.decide(message.retry_count) {
            RetryDecision::GiveUp { reason } => {
                error!(error = %cause, %reason, "dropping message");
                reject(channel, message.delivery_tag).await;
                return HandlingOutcome::Rejected { reason: RejectReason::RetriesExhausted };
            },
            RetryDecision::Republish { next_retry_count } => next_retry_count,
        };

        // Re-serialize so the copy is canonical JSON.
        let payload = match decode_payload(&message.payload).and_then(|value| {
            serde_json::to_vec(&value).map_err(|e| ConsumerError::decode(e.to_string()))
        }) {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, "payload cannot be republished, dropping message");
                reject(channel, message.delivery_tag).await;
                return HandlingOutcome::Rejected { reason: RejectReason::Undecodable };
            },
        };

        let copy = OutboundMessage {
            payload,
            correlation_id: message.correlation_id.clone(),
            retry_count: next_retry_count,
        };

        match channel.publish(copy).await {
            Ok(()) => {
                reject(channel, message.delivery_tag).await;
                info!(next_retry_count, "message republished for retry");
                HandlingOutcome::Republished { retry_count: next_retry_count }
            },
            Err(e) => {
                error!(error = %e, "failed to republish message, dropping it");
                reject(channel, message.delivery_tag).await;
                HandlingOutcome::Rejected { reason: RejectReason::PublishFailed }
            },
        }
    }
}

async fn reject(channel: &dyn MessageChannel, delivery_tag: u64) {
    if let Err(e) = channel.reject(delivery_tag).await {
        error!(error = %e, delivery_tag, "failed to reject message");
    }
}
