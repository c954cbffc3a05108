//! OutboxRelay processor.
//!
//! The durable broker path. [`OutboxTransport`] appends settlement envelopes
//! to the outbox table and the relay delivers them to the consumer:
//! - Polling undelivered rows every `poll_interval`, oldest first
//! - Marking a row delivered once the consumer applied it
//! - Recording failures and backing off (2^attempts seconds, capped at 2^11)
//! - Holding back later rows of a key until the earlier ones are delivered
//! - Reporting rows that ran out of attempts
//!
//! A crash between apply and mark redelivers the row, so delivery is
//! at-least-once.

use crate::config::OutboxConfig;
use crate::entities::outbox::{
    CountStuckOutbox, GetUndeliveredOutbox, InsertOutboxMessage, MarkOutboxDelivered,
    MarkOutboxFailed,
};
use crate::entities::{OutboxStore, StoreError};
use crate::events::SettlementEnvelope;
use crate::processors::settlement_consumer::SettlementConsumer;
use crate::processors::settlement_dispatcher::{SettlementTransport, TransportError};
use async_trait::async_trait;
use kanau::processor::Processor;
use std::collections::HashSet;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Durable transport backed by the outbox table.
#[derive(Debug, Clone)]
pub struct OutboxTransport<S> {
    store: S,
}

impl<S: OutboxStore> OutboxTransport<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: OutboxStore> SettlementTransport for OutboxTransport<S> {
    async fn send(&self, envelope: SettlementEnvelope) -> Result<(), TransportError> {
        let key = envelope.key.clone();
        let id = Processor::<InsertOutboxMessage>::process(
            &self.store,
            InsertOutboxMessage { envelope },
        )
        .await?;
        debug!(outbox_id = id, key = %key, "Settlement queued in outbox");
        Ok(())
    }
}

/// Outcome of one relay pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayReport {
    pub delivered: usize,
    pub failed: usize,
    /// Undelivered rows that exhausted their attempts.
    pub stuck: i64,
}

pub struct OutboxRelay<S> {
    store: S,
    consumer: SettlementConsumer,
    config: OutboxConfig,
}

impl<S: OutboxStore> OutboxRelay<S> {
    pub fn new(store: S, consumer: SettlementConsumer, config: OutboxConfig) -> Self {
        Self {
            store,
            consumer,
            config,
        }
    }

    /// Run the OutboxRelay.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "OutboxRelay started"
        );

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("OutboxRelay received shutdown signal");
                        break;
                    }
                }

                _ = tokio::time::sleep(self.config.poll_interval) => {
                    if let Err(e) = self.relay_once().await {
                        error!(error = %e, "Failed to relay outbox");
                    }
                }
            }
        }

        info!("OutboxRelay shutdown complete");
    }

    /// Deliver one batch of ready rows.
    pub async fn relay_once(&self) -> Result<RelayReport, StoreError> {
        let records = Processor::<GetUndeliveredOutbox>::process(
            &self.store,
            GetUndeliveredOutbox {
                max_attempts: self.config.max_attempts,
                limit: self.config.batch_size,
            },
        )
        .await?;

        let mut report = RelayReport::default();
        let mut failed_keys = HashSet::new();

        for record in records {
            if failed_keys.contains(&record.message_key) {
                continue;
            }
            let id = record.id;
            let attempts = record.attempts;
            let envelope = SettlementEnvelope::from(record);

            match self.consumer.handle_envelope(&envelope).await {
                Ok(applied) => {
                    Processor::<MarkOutboxDelivered>::process(
                        &self.store,
                        MarkOutboxDelivered { id },
                    )
                    .await?;
                    report.delivered += 1;
                    debug!(
                        outbox_id = id,
                        key = %envelope.key,
                        applied = ?applied,
                        "Settlement delivered"
                    );
                }
                Err(e) => {
                    warn!(
                        outbox_id = id,
                        key = %envelope.key,
                        attempts = attempts + 1,
                        error = %e,
                        "Settlement delivery failed"
                    );
                    Processor::<MarkOutboxFailed>::process(
                        &self.store,
                        MarkOutboxFailed {
                            id,
                            error: e.to_string(),
                        },
                    )
                    .await?;
                    failed_keys.insert(envelope.key);
                    report.failed += 1;
                }
            }
        }

        report.stuck = Processor::<CountStuckOutbox>::process(
            &self.store,
            CountStuckOutbox {
                max_attempts: self.config.max_attempts,
            },
        )
        .await?;
        if report.stuck > 0 {
            warn!(
                stuck = report.stuck,
                max_attempts = self.config.max_attempts,
                "Outbox rows exhausted their attempts and need reconciliation"
            );
        }

        Ok(report)
    }
}
