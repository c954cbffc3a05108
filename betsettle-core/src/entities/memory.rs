//! In-memory bet store and outbox.
//!
//! Used by tests and by embedders that run the settlement pipeline without
//! Postgres. Both stores answer the same queries as
//! [`DatabaseProcessor`](crate::framework::DatabaseProcessor) and keep the
//! same conditional `pending -> terminal` update rule. The memory outbox
//! does not enforce the retry backoff window; a failed row is eligible
//! again on the next poll.

use crate::entities::bets::{
    Bet, CountBets, CreateBet, FindPendingBetsForEvent, GetBetById, ListBets, ListBetsByUser,
    UpdateBetStatus,
};
use crate::entities::outbox::{
    CountStuckOutbox, GetUndeliveredOutbox, InsertOutboxMessage, MarkOutboxDelivered,
    MarkOutboxFailed, OutboxRecord,
};
use crate::entities::{BetStatus, StoreError};
use kanau::processor::Processor;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use time::OffsetDateTime;

/// Injected misbehaviour of status updates for one bet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateFault {
    /// Fail with [`StoreError::Unavailable`].
    Unavailable,
    /// Another writer moves the bet to this status just before the update.
    SettledConcurrently(BetStatus),
    /// The bet row is gone by the time the update runs.
    Deleted,
    /// Apply the update, then hang before answering.
    CommitThenStall(Duration),
    /// Hang before applying the update.
    StallThenCommit(Duration),
}

#[derive(Debug, Default)]
struct BetTable {
    next_id: i64,
    bets: BTreeMap<i64, Bet>,
    fail_pending_queries: bool,
    update_faults: HashMap<i64, UpdateFault>,
    update_calls: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryBetStore {
    inner: Arc<Mutex<BetTable>>,
}

impl MemoryBetStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, BetTable> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a bet with an explicit status, bypassing the `pending` default.
    pub fn insert(&self, mut bet: Bet) -> Bet {
        let mut table = self.table();
        if bet.bet_id <= 0 {
            table.next_id += 1;
            bet.bet_id = table.next_id;
        } else if bet.bet_id > table.next_id {
            table.next_id = bet.bet_id;
        }
        table.bets.insert(bet.bet_id, bet.clone());
        bet
    }

    pub fn get(&self, bet_id: i64) -> Option<Bet> {
        self.table().bets.get(&bet_id).cloned()
    }

    /// Make every pending-bets query fail with [`StoreError::Unavailable`].
    pub fn fail_pending_queries(&self, fail: bool) {
        self.table().fail_pending_queries = fail;
    }

    /// Make status updates for one bet fail with [`StoreError::Unavailable`].
    pub fn fail_updates_for(&self, bet_id: i64) {
        self.set_update_fault(bet_id, UpdateFault::Unavailable);
    }

    pub fn set_update_fault(&self, bet_id: i64, fault: UpdateFault) {
        self.table().update_faults.insert(bet_id, fault);
    }

    fn apply_update(&self, bet_id: i64, status: BetStatus) -> Result<Bet, StoreError> {
        let mut table = self.table();
        let bet = table.bets.get_mut(&bet_id).ok_or(StoreError::NotFound(bet_id))?;
        if !bet.status.can_transition_to(status) {
            return Err(StoreError::InvalidTransition {
                bet_id,
                from: bet.status,
                to: status,
            });
        }
        bet.status = status;
        Ok(bet.clone())
    }

    /// Number of status update attempts seen so far.
    pub fn update_calls(&self) -> usize {
        self.table().update_calls
    }
}

impl Processor<CreateBet> for MemoryBetStore {
    type Output = Bet;
    type Error = StoreError;
    async fn process(&self, cmd: CreateBet) -> Result<Bet, StoreError> {
        let mut table = self.table();
        table.next_id += 1;
        let bet = Bet {
            bet_id: table.next_id,
            user_id: cmd.user_id,
            event_id: cmd.event_id,
            event_market_id: cmd.event_market_id,
            event_winner_id: cmd.event_winner_id,
            bet_amount: cmd.bet_amount,
            status: BetStatus::Pending,
            created_at: OffsetDateTime::now_utc(),
        };
        table.bets.insert(bet.bet_id, bet.clone());
        Ok(bet)
    }
}

impl Processor<GetBetById> for MemoryBetStore {
    type Output = Option<Bet>;
    type Error = StoreError;
    async fn process(&self, query: GetBetById) -> Result<Option<Bet>, StoreError> {
        Ok(self.get(query.bet_id))
    }
}

impl Processor<ListBets> for MemoryBetStore {
    type Output = Vec<Bet>;
    type Error = StoreError;
    async fn process(&self, _query: ListBets) -> Result<Vec<Bet>, StoreError> {
        Ok(self.table().bets.values().cloned().collect())
    }
}

impl Processor<ListBetsByUser> for MemoryBetStore {
    type Output = Vec<Bet>;
    type Error = StoreError;
    async fn process(&self, query: ListBetsByUser) -> Result<Vec<Bet>, StoreError> {
        Ok(self
            .table()
            .bets
            .values()
            .filter(|b| b.user_id == query.user_id)
            .cloned()
            .collect())
    }
}

impl Processor<FindPendingBetsForEvent> for MemoryBetStore {
    type Output = Vec<Bet>;
    type Error = StoreError;
    async fn process(&self, query: FindPendingBetsForEvent) -> Result<Vec<Bet>, StoreError> {
        let table = self.table();
        if table.fail_pending_queries {
            return Err(StoreError::Unavailable("pending bets query failed".into()));
        }
        Ok(table
            .bets
            .values()
            .filter(|b| b.event_id == query.event_id && b.status == BetStatus::Pending)
            .cloned()
            .collect())
    }
}

impl Processor<UpdateBetStatus> for MemoryBetStore {
    type Output = Bet;
    type Error = StoreError;
    async fn process(&self, cmd: UpdateBetStatus) -> Result<Bet, StoreError> {
        let UpdateBetStatus { bet_id, status } = cmd;
        let fault = {
            let mut table = self.table();
            table.update_calls += 1;
            table.update_faults.get(&bet_id).copied()
        };

        match fault {
            None => self.apply_update(bet_id, status),
            Some(UpdateFault::Unavailable) => Err(StoreError::Unavailable(format!(
                "update of bet {bet_id} failed"
            ))),
            Some(UpdateFault::SettledConcurrently(other)) => {
                if let Some(bet) = self.table().bets.get_mut(&bet_id) {
                    bet.status = other;
                }
                self.apply_update(bet_id, status)
            }
            Some(UpdateFault::Deleted) => {
                self.table().bets.remove(&bet_id);
                self.apply_update(bet_id, status)
            }
            Some(UpdateFault::CommitThenStall(stall)) => {
                let bet = self.apply_update(bet_id, status)?;
                tokio::time::sleep(stall).await;
                Ok(bet)
            }
            Some(UpdateFault::StallThenCommit(stall)) => {
                tokio::time::sleep(stall).await;
                self.apply_update(bet_id, status)
            }
        }
    }
}

impl Processor<CountBets> for MemoryBetStore {
    type Output = i64;
    type Error = StoreError;
    async fn process(&self, _query: CountBets) -> Result<i64, StoreError> {
        Ok(self.table().bets.len() as i64)
    }
}

#[derive(Debug, Clone)]
struct OutboxRow {
    record: OutboxRecord,
    delivered: bool,
    last_error: Option<String>,
}

#[derive(Debug, Default)]
struct OutboxTable {
    next_id: i64,
    rows: BTreeMap<i64, OutboxRow>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryOutbox {
    inner: Arc<Mutex<OutboxTable>>,
}

impl MemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, OutboxTable> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_delivered(&self, id: i64) -> bool {
        self.table().rows.get(&id).is_some_and(|r| r.delivered)
    }

    pub fn attempts(&self, id: i64) -> i32 {
        self.table().rows.get(&id).map_or(0, |r| r.record.attempts)
    }

    pub fn last_error(&self, id: i64) -> Option<String> {
        self.table().rows.get(&id).and_then(|r| r.last_error.clone())
    }

    pub fn len(&self) -> usize {
        self.table().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Processor<InsertOutboxMessage> for MemoryOutbox {
    type Output = i64;
    type Error = StoreError;
    async fn process(&self, cmd: InsertOutboxMessage) -> Result<i64, StoreError> {
        let mut table = self.table();
        table.next_id += 1;
        let id = table.next_id;
        let envelope = cmd.envelope;
        table.rows.insert(
            id,
            OutboxRow {
                record: OutboxRecord {
                    id,
                    message_id: envelope.message_id,
                    topic: envelope.topic,
                    message_key: envelope.key,
                    payload: envelope.payload,
                    attempts: 0,
                },
                delivered: false,
                last_error: None,
            },
        );
        Ok(id)
    }
}

impl Processor<GetUndeliveredOutbox> for MemoryOutbox {
    type Output = Vec<OutboxRecord>;
    type Error = StoreError;
    async fn process(&self, query: GetUndeliveredOutbox) -> Result<Vec<OutboxRecord>, StoreError> {
        let table = self.table();
        let mut blocked_keys = HashSet::new();
        let mut ready = Vec::new();
        for row in table.rows.values().filter(|r| !r.delivered) {
            // only the oldest undelivered row of each key is eligible
            if !blocked_keys.insert(row.record.message_key.clone()) {
                continue;
            }
            if row.record.attempts < query.max_attempts {
                ready.push(row.record.clone());
            }
        }
        ready.truncate(usize::try_from(query.limit).unwrap_or(0));
        Ok(ready)
    }
}

impl Processor<MarkOutboxDelivered> for MemoryOutbox {
    type Output = ();
    type Error = StoreError;
    async fn process(&self, cmd: MarkOutboxDelivered) -> Result<(), StoreError> {
        if let Some(row) = self.table().rows.get_mut(&cmd.id) {
            row.delivered = true;
        }
        Ok(())
    }
}

impl Processor<MarkOutboxFailed> for MemoryOutbox {
    type Output = ();
    type Error = StoreError;
    async fn process(&self, cmd: MarkOutboxFailed) -> Result<(), StoreError> {
        if let Some(row) = self.table().rows.get_mut(&cmd.id) {
            row.record.attempts += 1;
            row.last_error = Some(cmd.error);
        }
        Ok(())
    }
}

impl Processor<CountStuckOutbox> for MemoryOutbox {
    type Output = i64;
    type Error = StoreError;
    async fn process(&self, query: CountStuckOutbox) -> Result<i64, StoreError> {
        Ok(self
            .table()
            .rows
            .values()
            .filter(|r| !r.delivered && r.record.attempts >= query.max_attempts)
            .count() as i64)
    }
}
