//! Bet matcher limits.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatcherConfig {
    /// Upper bound for a single store call.
    pub store_timeout: Duration,
    /// Upper bound for a single publish call.
    pub publish_timeout: Duration,
    /// How many times an outcome is retried after a fatal error before it
    /// is dropped.
    pub max_redeliveries: u32,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_millis(5000),
            publish_timeout: Duration::from_millis(5000),
            max_redeliveries: 3,
        }
    }
}
