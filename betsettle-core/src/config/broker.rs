//! Settlement delivery mode.

pub const DEFAULT_SETTLEMENT_TOPIC: &str = "bet-settlements";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    /// Deliver settlements through the durable outbox instead of applying
    /// them in-process.
    pub use_real_broker: bool,
    /// Topic stamped on every settlement envelope.
    pub settlement_topic: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            use_real_broker: false,
            settlement_topic: DEFAULT_SETTLEMENT_TOPIC.to_string(),
        }
    }
}
