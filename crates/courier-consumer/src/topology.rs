//! Broker topology declaration.

use lapin::{
    options::{BasicQosOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions},
    types::FieldTable,
    Channel, ExchangeKind,
};
use tracing::debug;

use crate::{connection::BrokerConfig, error::Result};

/// Declares the durable topic exchange and queue, binds them on the
/// configured routing key and applies the prefetch limit.
///
/// Declarations are idempotent; running them on every reconnect is safe.
///
/// # Errors
///
/// Returns `ConsumerError::Broker` if any declaration is refused.
pub async fn declare_topology(channel: &Channel, config: &BrokerConfig) -> Result<()> {
    channel
        .exchange_declare(
            &config.exchange,
            ExchangeKind::Topic,
            ExchangeDeclareOptions { durable: true, ..ExchangeDeclareOptions::default() },
            FieldTable::default(),
        )
        .await?;

    channel
        .queue_declare(
            &config.queue,
            QueueDeclareOptions { durable: true, ..QueueDeclareOptions::default() },
            FieldTable::default(),
        )
        .await?;

    channel
        .queue_bind(
            &config.queue,
            &config.exchange,
            &config.routing_key,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await?;

    channel.basic_qos(config.prefetch_count, BasicQosOptions::default()).await?;

    debug!(
        exchange = %config.exchange,
        queue = %config.queue,
        routing_key = %config.routing_key,
        prefetch = config.prefetch_count,
        "topology declared"
    );

    Ok(())
}
