//! Outbox relay tuning.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxConfig {
    /// Delay between two polls of the outbox table.
    pub poll_interval: Duration,
    /// Maximum rows fetched per poll.
    pub batch_size: i64,
    /// Rows that failed this many times are left for reconciliation.
    pub max_attempts: i32,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            batch_size: 50,
            max_attempts: 12,
        }
    }
}
