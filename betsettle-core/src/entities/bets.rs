use crate::entities::{BetStatus, StoreError};
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use rust_decimal::Decimal;
use time::OffsetDateTime;

/// A wager placed by a user on a predicted winner.
///
/// Two bets are the same bet when their `bet_id` matches.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Bet {
    pub bet_id: i64,
    pub user_id: String,
    pub event_id: String,
    pub event_market_id: String,
    /// The predicted winner.
    pub event_winner_id: String,
    pub bet_amount: Decimal,
    pub status: BetStatus,
    pub created_at: OffsetDateTime,
}

impl PartialEq for Bet {
    fn eq(&self, other: &Self) -> bool {
        self.bet_id == other.bet_id
    }
}

impl Eq for Bet {}

#[derive(Debug, Clone)]
/// Place a new bet. The store assigns `bet_id` and `created_at`; status starts as `pending`.
pub struct CreateBet {
    pub user_id: String,
    pub event_id: String,
    pub event_market_id: String,
    pub event_winner_id: String,
    pub bet_amount: Decimal,
}

impl Processor<CreateBet> for DatabaseProcessor {
    type Output = Bet;
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "SQL:CreateBet")]
    async fn process(&self, cmd: CreateBet) -> Result<Bet, StoreError> {
        let bet = sqlx::query_as::<_, Bet>(
            r#"
            INSERT INTO bets (user_id, event_id, event_market_id, event_winner_id, bet_amount)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING bet_id, user_id, event_id, event_market_id, event_winner_id,
                      bet_amount, status, created_at
            "#,
        )
        .bind(cmd.user_id)
        .bind(cmd.event_id)
        .bind(cmd.event_market_id)
        .bind(cmd.event_winner_id)
        .bind(cmd.bet_amount)
        .fetch_one(&self.pool)
        .await?;
        Ok(bet)
    }
}

#[derive(Debug, Clone)]
pub struct GetBetById {
    pub bet_id: i64,
}

impl Processor<GetBetById> for DatabaseProcessor {
    type Output = Option<Bet>;
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "SQL:GetBetById")]
    async fn process(&self, query: GetBetById) -> Result<Option<Bet>, StoreError> {
        let bet = sqlx::query_as::<_, Bet>(
            r#"
            SELECT bet_id, user_id, event_id, event_market_id, event_winner_id,
                   bet_amount, status, created_at
            FROM bets
            WHERE bet_id = $1
            "#,
        )
        .bind(query.bet_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(bet)
    }
}

#[derive(Debug, Clone)]
pub struct ListBets;

impl Processor<ListBets> for DatabaseProcessor {
    type Output = Vec<Bet>;
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "SQL:ListBets")]
    async fn process(&self, _query: ListBets) -> Result<Vec<Bet>, StoreError> {
        let bets = sqlx::query_as::<_, Bet>(
            r#"
            SELECT bet_id, user_id, event_id, event_market_id, event_winner_id,
                   bet_amount, status, created_at
            FROM bets
            ORDER BY bet_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(bets)
    }
}

#[derive(Debug, Clone)]
pub struct ListBetsByUser {
    pub user_id: String,
}

impl Processor<ListBetsByUser> for DatabaseProcessor {
    type Output = Vec<Bet>;
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "SQL:ListBetsByUser")]
    async fn process(&self, query: ListBetsByUser) -> Result<Vec<Bet>, StoreError> {
        let bets = sqlx::query_as::<_, Bet>(
            r#"
            SELECT bet_id, user_id, event_id, event_market_id, event_winner_id,
                   bet_amount, status, created_at
            FROM bets
            WHERE user_id = $1
            ORDER BY bet_id ASC
            "#,
        )
        .bind(query.user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(bets)
    }
}

#[derive(Debug, Clone)]
/// All bets on an event that still await settlement.
pub struct FindPendingBetsForEvent {
    pub event_id: String,
}

impl Processor<FindPendingBetsForEvent> for DatabaseProcessor {
    type Output = Vec<Bet>;
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "SQL:FindPendingBetsForEvent")]
    async fn process(&self, query: FindPendingBetsForEvent) -> Result<Vec<Bet>, StoreError> {
        let bets = sqlx::query_as::<_, Bet>(
            r#"
            SELECT bet_id, user_id, event_id, event_market_id, event_winner_id,
                   bet_amount, status, created_at
            FROM bets
            WHERE event_id = $1 AND status = 'pending'
            ORDER BY bet_id ASC
            "#,
        )
        .bind(query.event_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(bets)
    }
}

#[derive(Debug, Clone)]
/// Move one pending bet to a terminal status.
///
/// The update only applies while the bet is still `pending`, so a bet that
/// was settled by an earlier or concurrent delivery is reported as
/// [`StoreError::InvalidTransition`] instead of being overwritten.
pub struct UpdateBetStatus {
    pub bet_id: i64,
    pub status: BetStatus,
}

impl Processor<UpdateBetStatus> for DatabaseProcessor {
    type Output = Bet;
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "SQL:UpdateBetStatus")]
    async fn process(&self, cmd: UpdateBetStatus) -> Result<Bet, StoreError> {
        let UpdateBetStatus { bet_id, status } = cmd;
        if !status.is_terminal() {
            return Err(StoreError::InvalidTransition {
                bet_id,
                from: BetStatus::Pending,
                to: status,
            });
        }

        let updated = sqlx::query_as::<_, Bet>(
            r#"
            UPDATE bets
            SET status = $2
            WHERE bet_id = $1 AND status = 'pending'
            RETURNING bet_id, user_id, event_id, event_market_id, event_winner_id,
                      bet_amount, status, created_at
            "#,
        )
        .bind(bet_id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(bet) = updated {
            return Ok(bet);
        }

        let current =
            sqlx::query_scalar::<_, BetStatus>("SELECT status FROM bets WHERE bet_id = $1")
                .bind(bet_id)
                .fetch_optional(&self.pool)
                .await?;

        match current {
            None => Err(StoreError::NotFound(bet_id)),
            Some(from) => Err(StoreError::InvalidTransition {
                bet_id,
                from,
                to: status,
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CountBets;

impl Processor<CountBets> for DatabaseProcessor {
    type Output = i64;
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "SQL:CountBets")]
    async fn process(&self, _query: CountBets) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM bets")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
