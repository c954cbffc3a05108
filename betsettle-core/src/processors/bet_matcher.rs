//! BetMatcher processor.
//!
//! The BetMatcher is responsible for:
//! - Receiving `EventOutcomeMessage` from the outcome channel
//! - Validating it into an `EventOutcome` (malformed messages are dropped)
//! - Querying the pending bets of the event
//! - Deciding won/lost and payout per bet
//! - Moving each bet out of `pending`, one committed update per bet
//! - Publishing a settlement for every bet it moved
//!
//! A failure on one bet never stops the others. Only a failed candidate
//! query fails the outcome, which is then redelivered with backoff.
//! Redelivery is safe: bets settled by an earlier delivery are no longer
//! pending and are not queried again.

use crate::config::MatcherConfig;
use crate::entities::bets::{FindPendingBetsForEvent, GetBetById, UpdateBetStatus};
use crate::entities::{BetStore, StoreError};
use crate::events::{EventOutcome, OutcomeReceiver};
use crate::odds::OddsProvider;
use crate::processors::settlement_dispatcher::{PublishError, SettlementPublisher};
use crate::settlement::BetSettlement;
use crate::utils::{TimedOut, calculate_retry_delay, with_timeout};
use betsettle_sdk::objects::EventOutcomeMessage;
use kanau::processor::Processor;
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Errors that fail a whole outcome.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("pending bets query failed: {0}")]
    Store(#[from] StoreError),

    #[error("pending bets query {0}")]
    TimedOut(#[from] TimedOut),
}

/// Per-outcome counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettlementReport {
    /// Pending bets found for the event.
    pub candidates: usize,
    /// Bets moved to a terminal status and published.
    pub settled: usize,
    /// Bets not moved by this outcome: the update failed, the bet was
    /// already settled or missing, or the payout overflowed.
    pub skipped: usize,
    /// Bets moved to a terminal status whose settlement was not published.
    pub publish_failed: usize,
}

pub struct BetMatcher<S> {
    store: S,
    odds: Arc<dyn OddsProvider>,
    publisher: Arc<dyn SettlementPublisher>,
    config: MatcherConfig,
}

impl<S: BetStore> BetMatcher<S> {
    pub fn new(
        store: S,
        odds: Arc<dyn OddsProvider>,
        publisher: Arc<dyn SettlementPublisher>,
        config: MatcherConfig,
    ) -> Self {
        Self {
            store,
            odds,
            publisher,
            config,
        }
    }

    /// Run the BetMatcher.
    ///
    /// Outcomes are processed one at a time. Shutdown is checked between
    /// outcomes, never in the middle of one.
    pub async fn run(
        self,
        mut outcome_rx: OutcomeReceiver,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        info!("BetMatcher started");

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("BetMatcher received shutdown signal");
                        break;
                    }
                }

                message = outcome_rx.recv() => match message {
                    Some(message) => {
                        debug!(event_id = %message.event_id, "Received event outcome");
                        self.handle_message(message).await;
                    }
                    None => {
                        info!("Outcome channel closed");
                        break;
                    }
                },
            }
        }

        info!("BetMatcher shutdown complete");
    }

    /// Validate and process one inbound outcome, redelivering on failure.
    ///
    /// Returns `None` when the message was dropped.
    pub async fn handle_message(&self, message: EventOutcomeMessage) -> Option<SettlementReport> {
        let outcome = match EventOutcome::try_from(message) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "Dropping malformed event outcome");
                return None;
            }
        };

        let mut attempt = 0;
        loop {
            match self.process_event_outcome(&outcome).await {
                Ok(report) => return Some(report),
                Err(e) if attempt < self.config.max_redeliveries => {
                    let delay = calculate_retry_delay(attempt);
                    attempt += 1;
                    warn!(
                        event_id = %outcome.event_id(),
                        attempt,
                        delay_secs = delay.as_secs(),
                        error = %e,
                        "Event outcome failed, redelivering"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!(
                        event_id = %outcome.event_id(),
                        attempts = attempt + 1,
                        error = %e,
                        "Event outcome dropped after redeliveries"
                    );
                    return None;
                }
            }
        }
    }

    /// Settle every pending bet of the outcome's event.
    #[tracing::instrument(skip_all, fields(event_id = %outcome.event_id()))]
    pub async fn process_event_outcome(
        &self,
        outcome: &EventOutcome,
    ) -> Result<SettlementReport, MatchError> {
        let candidates = with_timeout(
            self.config.store_timeout,
            Processor::<FindPendingBetsForEvent>::process(
                &self.store,
                FindPendingBetsForEvent {
                    event_id: outcome.event_id().to_string(),
                },
            ),
        )
        .await??;

        let mut report = SettlementReport {
            candidates: candidates.len(),
            ..SettlementReport::default()
        };
        if candidates.is_empty() {
            info!("No pending bets for event");
            return Ok(report);
        }

        for bet in &candidates {
            let odds = self.odds.odds_for(&bet.event_market_id);
            let Some(settlement) =
                BetSettlement::decide(bet, outcome, odds, OffsetDateTime::now_utc())
            else {
                error!(
                    bet_id = bet.bet_id,
                    bet_amount = %bet.bet_amount,
                    odds = %odds,
                    "Payout overflows, bet left pending"
                );
                report.skipped += 1;
                continue;
            };

            if !self.transition(&settlement).await {
                report.skipped += 1;
                continue;
            }

            match self.publish(&settlement).await {
                Ok(()) => report.settled += 1,
                Err(e) => {
                    report.publish_failed += 1;
                    error!(
                        bet_id = settlement.bet_id,
                        status = %settlement.settlement_status,
                        error = %e,
                        "Bet settled but its settlement was not published"
                    );
                }
            }
        }

        info!(
            candidates = report.candidates,
            settled = report.settled,
            skipped = report.skipped,
            publish_failed = report.publish_failed,
            "Event outcome processed"
        );
        Ok(report)
    }

    /// Apply the settlement's status. `false` leaves the bet unpublished.
    async fn transition(&self, settlement: &BetSettlement) -> bool {
        let bet_id = settlement.bet_id;
        let update = Processor::<UpdateBetStatus>::process(
            &self.store,
            UpdateBetStatus {
                bet_id,
                status: settlement.target_status(),
            },
        );

        match with_timeout(self.config.store_timeout, update).await {
            Ok(Ok(bet)) => {
                debug!(bet_id, status = %bet.status, "Bet settled");
                true
            }
            Ok(Err(StoreError::InvalidTransition { from, .. })) => {
                info!(bet_id, status = %from, "Bet already settled, skipping");
                false
            }
            Ok(Err(e)) => {
                warn!(bet_id, error = %e, "Bet status update failed, bet left pending");
                false
            }
            Err(e) => {
                warn!(bet_id, error = %e, "Bet status update timed out, re-reading bet");
                self.confirm_transition(settlement).await
            }
        }
    }

    /// After a timed out update, check whether it committed anyway.
    ///
    /// A bet already in the target status is treated as moved by this
    /// settlement so its message is still published.
    async fn confirm_transition(&self, settlement: &BetSettlement) -> bool {
        let bet_id = settlement.bet_id;
        let lookup = Processor::<GetBetById>::process(&self.store, GetBetById { bet_id });

        match with_timeout(self.config.store_timeout, lookup).await {
            Ok(Ok(Some(bet))) if bet.status == settlement.target_status() => {
                info!(bet_id, status = %bet.status, "Timed out update was committed");
                true
            }
            Ok(Ok(Some(bet))) => {
                warn!(bet_id, status = %bet.status, "Timed out update was not applied, skipping");
                false
            }
            Ok(Ok(None)) => {
                warn!(bet_id, "Bet disappeared during status update");
                false
            }
            Ok(Err(e)) => {
                error!(bet_id, error = %e, "Could not confirm bet status after timeout");
                false
            }
            Err(e) => {
                error!(bet_id, error = %e, "Could not confirm bet status after timeout");
                false
            }
        }
    }

    async fn publish(&self, settlement: &BetSettlement) -> Result<(), PublishError> {
        with_timeout(self.config.publish_timeout, self.publisher.publish(settlement)).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::BetStatus;
    use crate::entities::bets::{Bet, CreateBet};
    use crate::entities::memory::{MemoryBetStore, UpdateFault};
    use crate::events::outcome_channel;
    use crate::odds::MarketOdds;
    use crate::processors::testing::RecordingPublisher;
    use crate::settlement::SettlementStatus;
    use rust_decimal::Decimal;
    use std::collections::HashMap;
    use std::time::Duration;

    struct Fixture {
        store: MemoryBetStore,
        publisher: Arc<RecordingPublisher>,
        matcher: BetMatcher<MemoryBetStore>,
    }

    fn fixture() -> Fixture {
        fixture_with_odds(MarketOdds::default())
    }

    fn fixture_with_odds(odds: MarketOdds) -> Fixture {
        let store = MemoryBetStore::new();
        let publisher = Arc::new(RecordingPublisher::default());
        let matcher = BetMatcher::new(
            store.clone(),
            Arc::new(odds),
            publisher.clone(),
            MatcherConfig::default(),
        );
        Fixture {
            store,
            publisher,
            matcher,
        }
    }

    async fn place(store: &MemoryBetStore, event_id: &str, winner: &str, amount: Decimal) -> Bet {
        store
            .process(CreateBet {
                user_id: "user1".into(),
                event_id: event_id.into(),
                event_market_id: "match-winner".into(),
                event_winner_id: winner.into(),
                bet_amount: amount,
            })
            .await
            .unwrap()
    }

    fn outcome(event_id: &str, winner: &str) -> EventOutcome {
        EventOutcome::new(event_id, "Final", winner).unwrap()
    }

    #[tokio::test]
    async fn test_matching_bet_wins_double_stake() {
        let f = fixture();
        let bet = place(&f.store, "E1", "team1", Decimal::new(10000, 2)).await;

        let report = f.matcher.process_event_outcome(&outcome("E1", "team1")).await.unwrap();

        assert_eq!(report.settled, 1);
        let published = f.publisher.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].bet_id, bet.bet_id);
        assert_eq!(published[0].settlement_status, SettlementStatus::Won);
        assert_eq!(published[0].payout_amount, Decimal::new(20000, 2));
        assert_eq!(published[0].to_message().payout_amount, "200.00");
        assert_eq!(f.store.get(bet.bet_id).unwrap().status, BetStatus::Won);
    }

    #[tokio::test]
    async fn test_other_winner_loses() {
        let f = fixture();
        let bet = place(&f.store, "E1", "team1", Decimal::new(10000, 2)).await;

        f.matcher.process_event_outcome(&outcome("E1", "team2")).await.unwrap();

        let published = f.publisher.published();
        assert_eq!(published[0].settlement_status, SettlementStatus::Lost);
        assert_eq!(published[0].to_message().payout_amount, "0.00");
        assert_eq!(f.store.get(bet.bet_id).unwrap().status, BetStatus::Lost);
    }

    #[tokio::test]
    async fn test_event_without_pending_bets_is_noop() {
        let f = fixture();
        place(&f.store, "E2", "team1", Decimal::ONE).await;

        let report = f.matcher.process_event_outcome(&outcome("E1", "team1")).await.unwrap();

        assert_eq!(report, SettlementReport::default());
        assert!(f.publisher.published().is_empty());
        assert_eq!(f.store.update_calls(), 0);
        assert_eq!(f.store.get(1).unwrap().status, BetStatus::Pending);
    }

    #[tokio::test]
    async fn test_mixed_predictions_settle_both() {
        let f = fixture();
        let winner = place(&f.store, "E1", "team1", Decimal::new(5000, 2)).await;
        let loser = place(&f.store, "E1", "team2", Decimal::new(7500, 2)).await;

        f.matcher.process_event_outcome(&outcome("E1", "team1")).await.unwrap();

        let published = f.publisher.published();
        assert_eq!(published.len(), 2);
        let won: Vec<_> = published
            .iter()
            .filter(|s| s.settlement_status == SettlementStatus::Won)
            .collect();
        let lost: Vec<_> = published
            .iter()
            .filter(|s| s.settlement_status == SettlementStatus::Lost)
            .collect();
        assert_eq!(won.len(), 1);
        assert_eq!(lost.len(), 1);
        assert_eq!(won[0].bet_id, winner.bet_id);
        assert_eq!(won[0].payout_amount, Decimal::new(10000, 2));
        assert_eq!(lost[0].bet_id, loser.bet_id);
        assert_eq!(lost[0].payout_amount, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_duplicate_outcome_settles_once() {
        let f = fixture();
        place(&f.store, "E1", "team1", Decimal::ONE).await;
        place(&f.store, "E1", "team2", Decimal::ONE).await;

        let first = f.matcher.process_event_outcome(&outcome("E1", "team1")).await.unwrap();
        let second = f.matcher.process_event_outcome(&outcome("E1", "team1")).await.unwrap();

        assert_eq!(first.settled, 2);
        assert_eq!(second.candidates, 0);
        assert_eq!(f.publisher.published().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_update_skips_only_that_bet() {
        let f = fixture();
        let broken = place(&f.store, "E1", "team1", Decimal::ONE).await;
        let healthy = place(&f.store, "E1", "team1", Decimal::ONE).await;
        f.store.fail_updates_for(broken.bet_id);

        let report = f.matcher.process_event_outcome(&outcome("E1", "team1")).await.unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(report.settled, 1);
        let published = f.publisher.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].bet_id, healthy.bet_id);
        assert_eq!(f.store.get(broken.bet_id).unwrap().status, BetStatus::Pending);
    }

    #[tokio::test]
    async fn test_publish_failure_does_not_abort_batch() {
        let f = fixture();
        let first = place(&f.store, "E1", "team1", Decimal::ONE).await;
        let second = place(&f.store, "E1", "team2", Decimal::ONE).await;
        f.publisher.fail_for(first.bet_id);

        let report = f.matcher.process_event_outcome(&outcome("E1", "team1")).await.unwrap();

        assert_eq!(report.publish_failed, 1);
        assert_eq!(report.settled, 1);
        assert_eq!(f.publisher.published()[0].bet_id, second.bet_id);
        // the status write is kept even though the message was lost
        assert_eq!(f.store.get(first.bet_id).unwrap().status, BetStatus::Won);
    }

    #[tokio::test]
    async fn test_bet_settled_concurrently_is_skipped() {
        let f = fixture();
        let raced = place(&f.store, "E1", "team1", Decimal::ONE).await;
        let other = place(&f.store, "E1", "team1", Decimal::ONE).await;
        f.store
            .set_update_fault(raced.bet_id, UpdateFault::SettledConcurrently(BetStatus::Won));

        let report = f.matcher.process_event_outcome(&outcome("E1", "team1")).await.unwrap();

        assert_eq!(report.candidates, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.settled, 1);
        let published = f.publisher.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].bet_id, other.bet_id);
    }

    #[tokio::test]
    async fn test_missing_bet_is_skipped() {
        let f = fixture();
        let gone = place(&f.store, "E1", "team1", Decimal::ONE).await;
        let kept = place(&f.store, "E1", "team2", Decimal::ONE).await;
        f.store.set_update_fault(gone.bet_id, UpdateFault::Deleted);

        let report = f.matcher.process_event_outcome(&outcome("E1", "team1")).await.unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(report.settled, 1);
        assert!(f.store.get(gone.bet_id).is_none());
        let published = f.publisher.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].bet_id, kept.bet_id);
        assert_eq!(published[0].settlement_status, SettlementStatus::Lost);
    }

    #[tokio::test(start_paused = true)]
    async fn test_committed_update_that_times_out_is_still_published() {
        let f = fixture();
        let bet = place(&f.store, "E1", "team1", Decimal::new(10000, 2)).await;
        f.store.set_update_fault(
            bet.bet_id,
            UpdateFault::CommitThenStall(Duration::from_secs(10)),
        );

        let report = f.matcher.process_event_outcome(&outcome("E1", "team1")).await.unwrap();

        assert_eq!(report.settled, 1);
        assert_eq!(report.skipped, 0);
        assert_eq!(f.store.get(bet.bet_id).unwrap().status, BetStatus::Won);
        let published = f.publisher.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].payout_amount, Decimal::new(20000, 2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_uncommitted_update_that_times_out_stays_pending() {
        let f = fixture();
        let bet = place(&f.store, "E1", "team1", Decimal::ONE).await;
        f.store.set_update_fault(
            bet.bet_id,
            UpdateFault::StallThenCommit(Duration::from_secs(10)),
        );

        let report = f.matcher.process_event_outcome(&outcome("E1", "team1")).await.unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(report.settled, 0);
        assert!(f.publisher.published().is_empty());
        assert_eq!(f.store.get(bet.bet_id).unwrap().status, BetStatus::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_timeout_counts_as_publish_failure() {
        let f = fixture();
        let slow = place(&f.store, "E1", "team1", Decimal::ONE).await;
        let fast = place(&f.store, "E1", "team2", Decimal::ONE).await;
        f.publisher.stall_for(slow.bet_id, Duration::from_secs(10));

        let report = f.matcher.process_event_outcome(&outcome("E1", "team1")).await.unwrap();

        assert_eq!(report.publish_failed, 1);
        assert_eq!(report.settled, 1);
        let published = f.publisher.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].bet_id, fast.bet_id);
        assert_eq!(f.store.get(slow.bet_id).unwrap().status, BetStatus::Won);
    }

    #[tokio::test]
    async fn test_overflowing_payout_is_skipped() {
        let odds = MarketOdds::new(Decimal::MAX, HashMap::new());
        let f = fixture_with_odds(odds);
        let bet = place(&f.store, "E1", "team1", Decimal::TWO).await;

        let report = f.matcher.process_event_outcome(&outcome("E1", "team1")).await.unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(f.store.update_calls(), 0);
        assert!(f.publisher.published().is_empty());
        assert_eq!(f.store.get(bet.bet_id).unwrap().status, BetStatus::Pending);
    }

    #[tokio::test]
    async fn test_candidate_query_failure_is_fatal() {
        let f = fixture();
        place(&f.store, "E1", "team1", Decimal::ONE).await;
        f.store.fail_pending_queries(true);

        let result = f.matcher.process_event_outcome(&outcome("E1", "team1")).await;

        assert!(matches!(result, Err(MatchError::Store(StoreError::Unavailable(_)))));
        assert!(f.publisher.published().is_empty());
    }

    #[tokio::test]
    async fn test_market_odds_are_looked_up() {
        let odds = MarketOdds::new(
            Decimal::TWO,
            HashMap::from([("match-winner".to_string(), Decimal::new(35, 1))]),
        );
        let f = fixture_with_odds(odds);
        place(&f.store, "E1", "team1", Decimal::new(1000, 2)).await;

        f.matcher.process_event_outcome(&outcome("E1", "team1")).await.unwrap();

        assert_eq!(f.publisher.published()[0].payout_amount, Decimal::new(3500, 2));
    }

    #[tokio::test]
    async fn test_malformed_message_is_dropped() {
        let f = fixture();
        place(&f.store, "E1", "team1", Decimal::ONE).await;

        let report = f
            .matcher
            .handle_message(EventOutcomeMessage {
                event_id: "E1".into(),
                event_name: "Final".into(),
                event_winner_id: String::new(),
            })
            .await;

        assert!(report.is_none());
        assert_eq!(f.store.update_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_outcome_is_redelivered() {
        let f = fixture();
        let bet = place(&f.store, "E1", "team1", Decimal::ONE).await;
        f.store.fail_pending_queries(true);

        let store = f.store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            store.fail_pending_queries(false);
        });

        let report = f
            .matcher
            .handle_message(EventOutcomeMessage {
                event_id: "E1".into(),
                event_name: "Final".into(),
                event_winner_id: "team1".into(),
            })
            .await
            .unwrap();

        assert_eq!(report.settled, 1);
        assert_eq!(f.store.get(bet.bet_id).unwrap().status, BetStatus::Won);
    }

    #[tokio::test(start_paused = true)]
    async fn test_outcome_dropped_after_max_redeliveries() {
        let f = fixture();
        place(&f.store, "E1", "team1", Decimal::ONE).await;
        f.store.fail_pending_queries(true);

        let report = f
            .matcher
            .handle_message(EventOutcomeMessage {
                event_id: "E1".into(),
                event_name: "Final".into(),
                event_winner_id: "team1".into(),
            })
            .await;

        assert!(report.is_none());
        assert!(f.publisher.published().is_empty());
    }

    #[tokio::test]
    async fn test_run_processes_queue_until_closed() {
        let f = fixture();
        let bet = place(&f.store, "E1", "team1", Decimal::ONE).await;
        let (tx, rx) = outcome_channel();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        tx.send(EventOutcomeMessage::default()).await.unwrap();
        tx.send(EventOutcomeMessage {
            event_id: "E1".into(),
            event_name: "Final".into(),
            event_winner_id: "team2".into(),
        })
        .await
        .unwrap();
        drop(tx);

        f.matcher.run(rx, shutdown_rx).await;

        assert_eq!(f.store.get(bet.bet_id).unwrap().status, BetStatus::Lost);
        assert_eq!(f.publisher.published().len(), 1);
    }

    #[tokio::test]
    async fn test_run_stops_when_senders_drop_while_shutdown_is_idle() {
        let f = fixture();
        let (tx, rx) = outcome_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(f.matcher.run(rx, shutdown_rx));

        drop(tx);

        tokio::time::timeout(Duration::from_secs(3), handle)
            .await
            .expect("matcher did not stop after its channel closed")
            .unwrap();
        drop(shutdown_tx);
    }
}
