pub mod bets;
pub mod memory;
pub mod outbox;

use betsettle_sdk::objects::BetStatus as SdkBetStatus;
use kanau::processor::Processor;
use thiserror::Error;

use bets::{Bet, FindPendingBetsForEvent, GetBetById, UpdateBetStatus};
use outbox::{
    CountStuckOutbox, GetUndeliveredOutbox, InsertOutboxMessage, MarkOutboxDelivered,
    MarkOutboxFailed, OutboxRecord,
};

/// Bet status for database operations.
///
/// This is the sqlx::Type version. For API/DTO use, see `betsettle_sdk::objects::BetStatus`.
///
/// `Pending` is the only initial state; the other three are terminal and a
/// bet never leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "bet_status")]
pub enum BetStatus {
    Pending,
    Won,
    Lost,
    Void,
}

impl BetStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, BetStatus::Pending)
    }

    /// Whether a bet in this status may move to `next`.
    pub fn can_transition_to(self, next: BetStatus) -> bool {
        self == BetStatus::Pending && next.is_terminal()
    }
}

impl std::fmt::Display for BetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BetStatus::Pending => write!(f, "pending"),
            BetStatus::Won => write!(f, "won"),
            BetStatus::Lost => write!(f, "lost"),
            BetStatus::Void => write!(f, "void"),
        }
    }
}

impl From<BetStatus> for SdkBetStatus {
    fn from(value: BetStatus) -> Self {
        match value {
            BetStatus::Pending => SdkBetStatus::Pending,
            BetStatus::Won => SdkBetStatus::Won,
            BetStatus::Lost => SdkBetStatus::Lost,
            BetStatus::Void => SdkBetStatus::Void,
        }
    }
}

/// Errors returned by the bet store and the settlement outbox.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The bet id is unknown to the store
    #[error("bet not found: {0}")]
    NotFound(i64),

    /// The bet is no longer in a status that allows the requested move
    #[error("bet {bet_id} cannot move from {from} to {to}")]
    InvalidTransition {
        bet_id: i64,
        from: BetStatus,
        to: BetStatus,
    },

    /// The store could not be reached
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// The slice of the bet store the settlement pipeline depends on.
///
/// Implemented by [`DatabaseProcessor`](crate::framework::DatabaseProcessor)
/// and by [`MemoryBetStore`](memory::MemoryBetStore).
pub trait BetStore:
    Processor<FindPendingBetsForEvent, Output = Vec<Bet>, Error = StoreError>
    + Processor<GetBetById, Output = Option<Bet>, Error = StoreError>
    + Processor<UpdateBetStatus, Output = Bet, Error = StoreError>
    + Send
    + Sync
{
}

impl<T> BetStore for T where
    T: Processor<FindPendingBetsForEvent, Output = Vec<Bet>, Error = StoreError>
        + Processor<GetBetById, Output = Option<Bet>, Error = StoreError>
        + Processor<UpdateBetStatus, Output = Bet, Error = StoreError>
        + Send
        + Sync
{
}

/// The settlement outbox operations used by the durable transport and its relay.
pub trait OutboxStore:
    Processor<InsertOutboxMessage, Output = i64, Error = StoreError>
    + Processor<GetUndeliveredOutbox, Output = Vec<OutboxRecord>, Error = StoreError>
    + Processor<MarkOutboxDelivered, Output = (), Error = StoreError>
    + Processor<MarkOutboxFailed, Output = (), Error = StoreError>
    + Processor<CountStuckOutbox, Output = i64, Error = StoreError>
    + Send
    + Sync
{
}

impl<T> OutboxStore for T where
    T: Processor<InsertOutboxMessage, Output = i64, Error = StoreError>
        + Processor<GetUndeliveredOutbox, Output = Vec<OutboxRecord>, Error = StoreError>
        + Processor<MarkOutboxDelivered, Output = (), Error = StoreError>
        + Processor<MarkOutboxFailed, Output = (), Error = StoreError>
        + Processor<CountStuckOutbox, Output = i64, Error = StoreError>
        + Send
        + Sync
{
}
