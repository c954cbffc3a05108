//! Configuration types for the settlement pipeline.
//!
//! These types represent the validated runtime configuration passed to the
//! pipeline's constructors. The actual config loading/parsing is handled by
//! the server crate.

mod broker;
mod matcher;
mod odds;
mod outbox;

pub use broker::{BrokerConfig, DEFAULT_SETTLEMENT_TOPIC};
pub use matcher::MatcherConfig;
pub use odds::OddsConfig;
pub use outbox::OutboxConfig;

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default)]
pub struct SettlementConfig {
    pub broker: BrokerConfig,
    pub matcher: MatcherConfig,
    pub outbox: OutboxConfig,
    pub odds: OddsConfig,
}
