//! Settlement publishing.
//!
//! The matcher hands every settlement to one [`SettlementPublisher`], chosen
//! once from [`BrokerConfig`] by [`build_publisher`]:
//!
//! - [`LocalSettlementPublisher`] serializes the message for the log and
//!   applies it in-process before `publish` returns.
//! - [`BrokerSettlementPublisher`] wraps the message in a
//!   [`SettlementEnvelope`] keyed by bet id and hands it to a
//!   [`SettlementTransport`]. It returns without waiting for the consumer.

use crate::config::BrokerConfig;
use crate::entities::StoreError;
use crate::events::{SettlementEnvelope, SettlementEnvelopeSender};
use crate::processors::settlement_consumer::SettlementConsumer;
use crate::settlement::BetSettlement;
use crate::utils::TimedOut;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Errors that fail a single publish call.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("publish {0}")]
    TimedOut(#[from] TimedOut),
}

#[derive(Debug, Error)]
pub enum TransportError {
    /// The receiving side of the channel is gone
    #[error("settlement channel closed")]
    ChannelClosed,

    /// The outbox insert failed
    #[error("outbox error: {0}")]
    Outbox(#[from] StoreError),
}

#[async_trait]
pub trait SettlementPublisher: Send + Sync {
    async fn publish(&self, settlement: &BetSettlement) -> Result<(), PublishError>;
}

/// Ordered-per-key delivery of settlement envelopes.
#[async_trait]
pub trait SettlementTransport: Send + Sync {
    async fn send(&self, envelope: SettlementEnvelope) -> Result<(), TransportError>;
}

/// Applies settlements in the calling task.
pub struct LocalSettlementPublisher {
    topic: String,
    consumer: SettlementConsumer,
}

impl LocalSettlementPublisher {
    pub fn new(topic: impl Into<String>, consumer: SettlementConsumer) -> Self {
        Self {
            topic: topic.into(),
            consumer,
        }
    }
}

#[async_trait]
impl SettlementPublisher for LocalSettlementPublisher {
    async fn publish(&self, settlement: &BetSettlement) -> Result<(), PublishError> {
        let message = settlement.to_message();
        let payload = match serde_json::to_string(&message) {
            Ok(payload) => payload,
            Err(e) => {
                error!(
                    bet_id = settlement.bet_id,
                    error = %PublishError::Serialization(e),
                    "Failed to serialize settlement, dropping"
                );
                return Ok(());
            }
        };
        info!(
            topic = %self.topic,
            bet_id = settlement.bet_id,
            payload = %payload,
            "Applying settlement in-process"
        );

        if let Err(e) = self.consumer.apply_settlement(&message).await {
            error!(
                bet_id = settlement.bet_id,
                error = %e,
                "Settlement side effect failed"
            );
        }
        Ok(())
    }
}

/// Hands settlements to a transport for asynchronous delivery.
pub struct BrokerSettlementPublisher<T> {
    topic: String,
    transport: T,
}

impl<T: SettlementTransport> BrokerSettlementPublisher<T> {
    pub fn new(topic: impl Into<String>, transport: T) -> Self {
        Self {
            topic: topic.into(),
            transport,
        }
    }
}

#[async_trait]
impl<T: SettlementTransport> SettlementPublisher for BrokerSettlementPublisher<T> {
    async fn publish(&self, settlement: &BetSettlement) -> Result<(), PublishError> {
        let payload = serde_json::to_string(&settlement.to_message())?;
        let envelope = SettlementEnvelope {
            message_id: Uuid::now_v7(),
            topic: self.topic.clone(),
            key: settlement.bet_id.to_string(),
            payload,
        };
        let message_id = envelope.message_id;
        self.transport.send(envelope).await?;
        debug!(
            topic = %self.topic,
            bet_id = settlement.bet_id,
            message_id = %message_id,
            "Settlement handed to transport"
        );
        Ok(())
    }
}

/// In-process transport over a bounded channel.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: SettlementEnvelopeSender,
}

impl ChannelTransport {
    pub fn new(tx: SettlementEnvelopeSender) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl SettlementTransport for ChannelTransport {
    async fn send(&self, envelope: SettlementEnvelope) -> Result<(), TransportError> {
        self.tx
            .send(envelope)
            .await
            .map_err(|_| TransportError::ChannelClosed)
    }
}

/// Select the publisher for the configured delivery mode.
///
/// `transport` is only used in broker mode.
pub fn build_publisher<T>(
    config: &BrokerConfig,
    consumer: SettlementConsumer,
    transport: T,
) -> Arc<dyn SettlementPublisher>
where
    T: SettlementTransport + 'static,
{
    if config.use_real_broker {
        info!(topic = %config.settlement_topic, "Settlements delivered through the broker");
        Arc::new(BrokerSettlementPublisher::new(
            config.settlement_topic.clone(),
            transport,
        ))
    } else {
        info!(topic = %config.settlement_topic, "Settlements applied in-process");
        Arc::new(LocalSettlementPublisher::new(
            config.settlement_topic.clone(),
            consumer,
        ))
    }
}
