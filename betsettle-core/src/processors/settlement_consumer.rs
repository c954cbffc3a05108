//! SettlementConsumer processor.
//!
//! The consumer side of settlement delivery. It is responsible for:
//! - Turning a settlement message into exactly one ledger signal
//!   (credit payout, forfeit stake, refund stake)
//! - Treating unknown statuses and malformed payloads as data-integrity
//!   warnings that are logged and dropped
//! - Draining the in-process settlement channel in broker mode
//!
//! Delivery is at-least-once, so the same settlement may be applied more
//! than once. The ledger is expected to deduplicate on bet id and status.

use crate::events::{SettlementEnvelope, SettlementEnvelopeReceiver};
use async_trait::async_trait;
use betsettle_sdk::objects::{BetSettlementMessage, SettlementStatus};
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Errors reported by a ledger collaborator.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The ledger could not be reached
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// The ledger refused the operation
    #[error("ledger rejected bet {bet_id}: {reason}")]
    Rejected { bet_id: i64, reason: String },
}

/// Account side effects of a settlement.
#[async_trait]
pub trait SettlementLedger: Send + Sync {
    async fn credit_payout(
        &self,
        bet_id: i64,
        user_id: &str,
        amount: Decimal,
    ) -> Result<(), LedgerError>;

    async fn forfeit_stake(&self, bet_id: i64, user_id: &str) -> Result<(), LedgerError>;

    /// The refund amount is the ledger's decision.
    async fn refund_stake(&self, bet_id: i64, user_id: &str) -> Result<(), LedgerError>;
}

/// Ledger that only emits each signal as a structured log line.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLedger;

#[async_trait]
impl SettlementLedger for TracingLedger {
    async fn credit_payout(
        &self,
        bet_id: i64,
        user_id: &str,
        amount: Decimal,
    ) -> Result<(), LedgerError> {
        info!(bet_id, user_id, amount = %amount, "Ledger: credit payout");
        Ok(())
    }

    async fn forfeit_stake(&self, bet_id: i64, user_id: &str) -> Result<(), LedgerError> {
        info!(bet_id, user_id, "Ledger: stake forfeited");
        Ok(())
    }

    async fn refund_stake(&self, bet_id: i64, user_id: &str) -> Result<(), LedgerError> {
        info!(bet_id, user_id, "Ledger: refund stake");
        Ok(())
    }
}

/// What a settlement turned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Credited,
    Forfeited,
    Refunded,
    /// Data-integrity problem; nothing was done.
    Ignored,
}

#[derive(Clone)]
pub struct SettlementConsumer {
    ledger: Arc<dyn SettlementLedger>,
}

impl SettlementConsumer {
    pub fn new(ledger: Arc<dyn SettlementLedger>) -> Self {
        Self { ledger }
    }

    /// Apply the side effect of one settlement.
    ///
    /// Only ledger failures are errors. An unknown status or a won
    /// settlement without a positive payout is logged and ignored.
    pub async fn apply_settlement(
        &self,
        message: &BetSettlementMessage,
    ) -> Result<Applied, LedgerError> {
        let bet_id = message.bet_id;
        let user_id = message.user_id.as_str();
        match message.settlement_status {
            SettlementStatus::Won => {
                let amount = match message.payout() {
                    Ok(amount) if amount > Decimal::ZERO => amount,
                    Ok(_) | Err(_) => {
                        warn!(
                            bet_id,
                            payout_amount = %message.payout_amount,
                            "Won settlement without a positive payout, ignoring"
                        );
                        return Ok(Applied::Ignored);
                    }
                };
                self.ledger.credit_payout(bet_id, user_id, amount).await?;
                Ok(Applied::Credited)
            }
            SettlementStatus::Lost => {
                self.ledger.forfeit_stake(bet_id, user_id).await?;
                Ok(Applied::Forfeited)
            }
            SettlementStatus::Void => {
                self.ledger.refund_stake(bet_id, user_id).await?;
                Ok(Applied::Refunded)
            }
            SettlementStatus::Unknown => {
                warn!(
                    bet_id,
                    event_id = %message.event_id,
                    "Settlement with unknown status, no side effect performed"
                );
                Ok(Applied::Ignored)
            }
        }
    }

    /// Decode and apply a settlement envelope.
    ///
    /// A payload that does not decode is a data-integrity warning and is
    /// dropped.
    pub async fn handle_envelope(
        &self,
        envelope: &SettlementEnvelope,
    ) -> Result<Applied, LedgerError> {
        let message = match serde_json::from_str::<BetSettlementMessage>(&envelope.payload) {
            Ok(message) => message,
            Err(e) => {
                warn!(
                    message_id = %envelope.message_id,
                    key = %envelope.key,
                    error = %e,
                    "Malformed settlement payload, dropping"
                );
                return Ok(Applied::Ignored);
            }
        };
        self.apply_settlement(&message).await
    }

    /// Consume envelopes from the in-process settlement channel.
    pub async fn run(
        self,
        mut envelope_rx: SettlementEnvelopeReceiver,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        info!("SettlementConsumer started");

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("SettlementConsumer received shutdown signal");
                        break;
                    }
                }

                envelope = envelope_rx.recv() => {
                    let Some(envelope) = envelope else {
                        info!("Settlement channel closed");
                        break;
                    };
                    debug!(
                        message_id = %envelope.message_id,
                        key = %envelope.key,
                        "Received settlement"
                    );

                    if let Err(e) = self.handle_envelope(&envelope).await {
                        error!(
                            message_id = %envelope.message_id,
                            key = %envelope.key,
                            error = %e,
                            "Failed to apply settlement"
                        );
                    }
                }
            }
        }

        info!("SettlementConsumer shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::settlement_envelope_channel;
    use crate::processors::testing::{LedgerCall, RecordingLedger};
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn message(status: SettlementStatus, payout: &str) -> BetSettlementMessage {
        BetSettlementMessage {
            bet_id: 1,
            user_id: "user1".into(),
            settlement_status: status,
            payout_amount: payout.into(),
            settlement_time: OffsetDateTime::now_utc(),
            event_id: "E1".into(),
        }
    }

    fn consumer(ledger: &Arc<RecordingLedger>) -> SettlementConsumer {
        SettlementConsumer::new(ledger.clone())
    }

    #[tokio::test]
    async fn test_won_credits_payout() {
        let ledger = Arc::new(RecordingLedger::default());
        let applied = consumer(&ledger)
            .apply_settlement(&message(SettlementStatus::Won, "200.00"))
            .await
            .unwrap();
        assert_eq!(applied, Applied::Credited);
        assert_eq!(
            ledger.calls(),
            vec![LedgerCall::Credit {
                bet_id: 1,
                user_id: "user1".into(),
                amount: Decimal::new(20000, 2),
            }]
        );
    }

    #[tokio::test]
    async fn test_lost_and_void_signal_ledger() {
        let ledger = Arc::new(RecordingLedger::default());
        let consumer = consumer(&ledger);
        let lost = consumer
            .apply_settlement(&message(SettlementStatus::Lost, "0.00"))
            .await
            .unwrap();
        let void = consumer
            .apply_settlement(&message(SettlementStatus::Void, "100.00"))
            .await
            .unwrap();
        assert_eq!(lost, Applied::Forfeited);
        assert_eq!(void, Applied::Refunded);
        assert_eq!(
            ledger.calls(),
            vec![
                LedgerCall::Forfeit { bet_id: 1 },
                LedgerCall::Refund { bet_id: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_status_and_bad_payout_are_ignored() {
        let ledger = Arc::new(RecordingLedger::default());
        let consumer = consumer(&ledger);
        let unknown = consumer
            .apply_settlement(&message(SettlementStatus::Unknown, "0.00"))
            .await
            .unwrap();
        let bad_payout = consumer
            .apply_settlement(&message(SettlementStatus::Won, "lots"))
            .await
            .unwrap();
        let zero_payout = consumer
            .apply_settlement(&message(SettlementStatus::Won, "0.00"))
            .await
            .unwrap();
        assert_eq!(unknown, Applied::Ignored);
        assert_eq!(bad_payout, Applied::Ignored);
        assert_eq!(zero_payout, Applied::Ignored);
        assert!(ledger.calls().is_empty());
    }

    #[tokio::test]
    async fn test_ledger_failure_propagates() {
        let ledger = Arc::new(RecordingLedger::default());
        ledger.set_failing(true);
        let result = consumer(&ledger)
            .apply_settlement(&message(SettlementStatus::Lost, "0.00"))
            .await;
        assert!(matches!(result, Err(LedgerError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_malformed_envelope_is_dropped() {
        let ledger = Arc::new(RecordingLedger::default());
        let envelope = SettlementEnvelope {
            message_id: Uuid::now_v7(),
            topic: "bet-settlements".into(),
            key: "1".into(),
            payload: "{not json".into(),
        };
        let applied = consumer(&ledger).handle_envelope(&envelope).await.unwrap();
        assert_eq!(applied, Applied::Ignored);
        assert!(ledger.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_status_on_the_wire_is_ignored() {
        let ledger = Arc::new(RecordingLedger::default());
        let envelope = SettlementEnvelope {
            message_id: Uuid::now_v7(),
            topic: "bet-settlements".into(),
            key: "1".into(),
            payload: r#"{"betId":1,"userId":"user1","settlementStatus":"CASHED_OUT","payoutAmount":"0.00","settlementTime":"2024-01-01T00:00:00Z","eventId":"E1"}"#.into(),
        };
        let applied = consumer(&ledger).handle_envelope(&envelope).await.unwrap();
        assert_eq!(applied, Applied::Ignored);
    }

    #[tokio::test]
    async fn test_run_drains_channel_until_closed() {
        let ledger = Arc::new(RecordingLedger::default());
        let (tx, rx) = settlement_envelope_channel();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let payload = serde_json::to_string(&message(SettlementStatus::Won, "50.00")).unwrap();
        tx.send(SettlementEnvelope {
            message_id: Uuid::now_v7(),
            topic: "bet-settlements".into(),
            key: "1".into(),
            payload,
        })
        .await
        .unwrap();
        drop(tx);

        consumer(&ledger).run(rx, shutdown_rx).await;
        assert_eq!(ledger.calls().len(), 1);
    }
}
