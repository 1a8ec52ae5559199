//! Broker channel abstraction used by the message handler.
//!
//! The handler only needs three operations: acknowledge, reject without
//! requeue, and publish a retry copy. `AmqpChannel` performs them on a lapin
//! channel; `mock::RecordingChannel` records them for tests.

use std::{future::Future, pin::Pin};

use courier_core::CorrelationId;
use lapin::{
    options::{BasicAckOptions, BasicNackOptions, BasicPublishOptions},
    types::{AMQPValue, FieldTable, ShortString},
    BasicProperties, Channel,
};

use crate::{
    error::{ConsumerError, Result},
    message::RETRY_COUNT_HEADER,
};

/// Content type of republished messages.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// AMQP delivery mode for persistent messages.
pub const PERSISTENT_DELIVERY_MODE: u8 = 2;

/// A message to publish back onto the work queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// JSON payload bytes.
    pub payload: Vec<u8>,
    /// Correlation id, sent as `messageId`.
    pub correlation_id: CorrelationId,
    /// Value of the `x-retry-count` header.
    pub retry_count: u32,
}

/// Operations the handler performs on the broker.
pub trait MessageChannel: Send + Sync {
    /// Acknowledges a delivery.
    fn ack(&self, delivery_tag: u64) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Rejects a delivery without requeueing it.
    fn reject(&self, delivery_tag: u64) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Publishes a message to the work exchange and waits for the broker to
    /// confirm it.
    fn publish(
        &self,
        message: OutboundMessage,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// `MessageChannel` backed by a lapin channel with publisher confirms.
#[derive(Clone)]
pub struct AmqpChannel {
    channel: Channel,
    exchange: String,
    routing_key: String,
}

impl AmqpChannel {
    /// Wraps a channel that publishes to `exchange` with `routing_key`.
    pub fn new(channel: Channel, exchange: impl Into<String>, routing_key: impl Into<String>) -> Self {
        Self { channel, exchange: exchange.into(), routing_key: routing_key.into() }
    }
}

impl MessageChannel for AmqpChannel {
    fn ack(&self, delivery_tag: u64) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.channel.basic_ack(delivery_tag, BasicAckOptions::default()).await?;
            Ok(())
        })
    }

    fn reject(&self, delivery_tag: u64) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.channel
                .basic_nack(delivery_tag, BasicNackOptions { multiple: false, requeue: false })
                .await?;
            Ok(())
        })
    }

    fn publish(
        &self,
        message: OutboundMessage,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let properties = publish_properties(&message);

            let confirmation = self
                .channel
                .basic_publish(
                    &self.exchange,
                    &self.routing_key,
                    BasicPublishOptions::default(),
                    &message.payload,
                    properties,
                )
                .await
                .map_err(|e| ConsumerError::publish(e.to_string()))?
                .await
                .map_err(|e| ConsumerError::publish(e.to_string()))?;

            if confirmation.is_nack() {
                return Err(ConsumerError::publish("broker did not confirm republished message"));
            }

            Ok(())
        })
    }
}

fn publish_properties(message: &OutboundMessage) -> BasicProperties {
    let mut headers = FieldTable::default();
    headers.insert(
        ShortString::from(RETRY_COUNT_HEADER),
        AMQPValue::LongLongInt(i64::from(message.retry_count)),
    );

    BasicProperties::default()
        .with_delivery_mode(PERSISTENT_DELIVERY_MODE)
        .with_content_type(ShortString::from(JSON_CONTENT_TYPE))
        .with_message_id(ShortString::from(message.correlation_id.as_str()))
        .with_headers(headers)
}

/// Recording implementation for tests.
pub mod mock {
    use std::{future::Future, pin::Pin, sync::Arc};

    use tokio::sync::RwLock;

    use super::{MessageChannel, OutboundMessage};
    use crate::error::{ConsumerError, Result};

    /// One operation performed on the channel.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum ChannelOperation {
        /// Delivery acknowledged.
        Ack(u64),
        /// Delivery rejected without requeue.
        Reject(u64),
        /// Message published.
        Publish(OutboundMessage),
    }

    /// Channel that records operations instead of talking to a broker.
    #[derive(Clone, Default)]
    pub struct RecordingChannel {
        operations: Arc<RwLock<Vec<ChannelOperation>>>,
        publish_error: Arc<RwLock<Option<String>>>,
        ack_error: Arc<RwLock<Option<String>>>,
    }

    impl RecordingChannel {
        /// Creates an empty recording channel.
        pub fn new() -> Self {
            Self::default()
        }

        /// Makes the next publish fail. The message is not recorded.
        pub async fn inject_publish_error(&self, error: impl Into<String>) {
            *self.publish_error.write().await = Some(error.into());
        }

        /// Makes the next ack fail. The ack is not recorded.
        pub async fn inject_ack_error(&self, error: impl Into<String>) {
            *self.ack_error.write().await = Some(error.into());
        }

        /// Returns every recorded operation in order.
        pub async fn operations(&self) -> Vec<ChannelOperation> {
            self.operations.read().await.clone()
        }

        /// Returns the published messages in order.
        pub async fn published(&self) -> Vec<OutboundMessage> {
            self.operations
                .read()
                .await
                .iter()
                .filter_map(|operation| match operation {
                    ChannelOperation::Publish(message) => Some(message.clone()),
                    _ => None,
                })
                .collect()
        }

        async fn push(&self, operation: ChannelOperation) {
            self.operations.write().await.push(operation);
        }
    }

    impl MessageChannel for RecordingChannel {
        fn ack(&self, delivery_tag: u64) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
            Box::pin(async move {
                let error = self.ack_error.write().await.take();
                if let Some(error) = error {
                    return Err(ConsumerError::broker(error));
                }

                self.push(ChannelOperation::Ack(delivery_tag)).await;
                Ok(())
            })
        }

        fn reject(
            &self,
            delivery_tag: u64,
        ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
            Box::pin(async move {
                self.push(ChannelOperation::Reject(delivery_tag)).await;
                Ok(())
            })
        }

        fn publish(
            &self,
            message: OutboundMessage,
        ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
            Box::pin(async move {
                let error = self.publish_error.write().await.take();
                if let Some(error) = error {
                    return Err(ConsumerError::publish(error));
                }

                self.push(ChannelOperation::Publish(message)).await;
                Ok(())
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{mock::*, *};

    #[test]
    fn publish_properties_mark_retry_copy() {
        let message = OutboundMessage {
            payload: b"{}".to_vec(),
            correlation_id: CorrelationId::new("msg-7"),
            retry_count: 2,
        };

        let properties = publish_properties(&message);

        assert_eq!(*properties.delivery_mode(), Some(PERSISTENT_DELIVERY_MODE));
        assert_eq!(properties.content_type().as_ref().map(ShortString::as_str), Some("application/json"));
        assert_eq!(properties.message_id().as_ref().map(ShortString::as_str), Some("msg-7"));
        assert_eq!(
            crate::message::retry_count_from_headers(properties.headers().as_ref()),
            2
        );
    }

    #[tokio::test]
    async fn recording_channel_keeps_order() {
        let channel = RecordingChannel::new();
        channel.ack(1).await.unwrap();
        channel.reject(2).await.unwrap();

        assert_eq!(
            channel.operations().await,
            vec![ChannelOperation::Ack(1), ChannelOperation::Reject(2)]
        );
    }

    #[tokio::test]
    async fn injected_publish_error_fires_once() {
        let channel = RecordingChannel::new();
        channel.inject_publish_error("channel closed").await;
        let message = OutboundMessage {
            payload: Vec::new(),
            correlation_id: CorrelationId::unknown(),
            retry_count: 2,
        };

        assert!(channel.publish(message.clone()).await.is_err());
        assert!(channel.publish(message).await.is_ok());
        assert_eq!(channel.published().await.len(), 1);
    }
}
