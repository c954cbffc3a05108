//! Durable settlement outbox.
//!
//! Settlement envelopes published in broker mode are appended here and
//! relayed to the consumer by [`OutboxRelay`](crate::processors::OutboxRelay).
//! Rows are delivered in id order, one key at a time: a row is only handed
//! out once every earlier row with the same key has been delivered.

use crate::entities::StoreError;
use crate::events::SettlementEnvelope;
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct OutboxRecord {
    pub id: i64,
    pub message_id: Uuid,
    pub topic: String,
    pub message_key: String,
    pub payload: String,
    pub attempts: i32,
}

impl From<OutboxRecord> for SettlementEnvelope {
    fn from(r: OutboxRecord) -> Self {
        Self {
            message_id: r.message_id,
            topic: r.topic,
            key: r.message_key,
            payload: r.payload,
        }
    }
}

#[derive(Debug, Clone)]
/// Append an envelope to the outbox. Returns the outbox row id.
pub struct InsertOutboxMessage {
    pub envelope: SettlementEnvelope,
}

impl Processor<InsertOutboxMessage> for DatabaseProcessor {
    type Output = i64;
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertOutboxMessage")]
    async fn process(&self, cmd: InsertOutboxMessage) -> Result<i64, StoreError> {
        let SettlementEnvelope {
            message_id,
            topic,
            key,
            payload,
        } = cmd.envelope;
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO settlement_outbox (message_id, topic, message_key, payload)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(message_id)
        .bind(topic)
        .bind(key)
        .bind(payload)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }
}

#[derive(Debug, Clone)]
/// Fetch rows that are ready for delivery.
///
/// Skips rows that exhausted `max_attempts`, rows still inside their
/// `2^attempts` second backoff window, and rows queued behind an
/// undelivered row with the same key.
pub struct GetUndeliveredOutbox {
    pub max_attempts: i32,
    pub limit: i64,
}

impl Processor<GetUndeliveredOutbox> for DatabaseProcessor {
    type Output = Vec<OutboxRecord>;
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "SQL:GetUndeliveredOutbox")]
    async fn process(&self, query: GetUndeliveredOutbox) -> Result<Vec<OutboxRecord>, StoreError> {
        let records = sqlx::query_as::<_, OutboxRecord>(
            r#"
            SELECT o.id, o.message_id, o.topic, o.message_key, o.payload, o.attempts
            FROM settlement_outbox o
            WHERE o.delivered_at IS NULL
              AND o.attempts < $1
              AND (
                o.last_tried_at IS NULL
                OR o.last_tried_at + make_interval(secs => power(2, LEAST(o.attempts, 11))) <= NOW()
              )
              AND NOT EXISTS (
                SELECT 1
                FROM settlement_outbox e
                WHERE e.message_key = o.message_key
                  AND e.delivered_at IS NULL
                  AND e.id < o.id
              )
            ORDER BY o.id ASC
            LIMIT $2
            "#,
        )
        .bind(query.max_attempts)
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }
}

#[derive(Debug, Clone)]
pub struct MarkOutboxDelivered {
    pub id: i64,
}

impl Processor<MarkOutboxDelivered> for DatabaseProcessor {
    type Output = ();
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "SQL:MarkOutboxDelivered")]
    async fn process(&self, cmd: MarkOutboxDelivered) -> Result<(), StoreError> {
        sqlx::query("UPDATE settlement_outbox SET delivered_at = NOW() WHERE id = $1")
            .bind(cmd.id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
/// Record a failed delivery attempt.
pub struct MarkOutboxFailed {
    pub id: i64,
    pub error: String,
}

impl Processor<MarkOutboxFailed> for DatabaseProcessor {
    type Output = ();
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "SQL:MarkOutboxFailed")]
    async fn process(&self, cmd: MarkOutboxFailed) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE settlement_outbox
            SET attempts = attempts + 1, last_tried_at = NOW(), last_error = $2
            WHERE id = $1
            "#,
        )
        .bind(cmd.id)
        .bind(cmd.error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
/// Count undelivered rows that ran out of attempts and need reconciliation.
pub struct CountStuckOutbox {
    pub max_attempts: i32,
}

impl Processor<CountStuckOutbox> for DatabaseProcessor {
    type Output = i64;
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "SQL:CountStuckOutbox")]
    async fn process(&self, query: CountStuckOutbox) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM settlement_outbox WHERE delivered_at IS NULL AND attempts >= $1",
        )
        .bind(query.max_attempts)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
