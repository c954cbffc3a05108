//! TOML file configuration structures.
//!
//! These structs directly map to the `betsettle-config.toml` file format.
//! Every section is optional and falls back to the defaults below.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub server: ServerConfig,
    pub broker: BrokerConfig,
    pub matcher: MatcherConfig,
    pub outbox: OutboxConfig,
    pub odds: OddsConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080))
}

/// Settlement delivery section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// `false` applies settlements in-process, `true` routes them through the outbox.
    pub use_real_broker: bool,
    pub settlement_topic: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            use_real_broker: false,
            settlement_topic: betsettle_core::config::DEFAULT_SETTLEMENT_TOPIC.to_string(),
        }
    }
}

/// Bet matcher section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    pub store_timeout_ms: u64,
    pub publish_timeout_ms: u64,
    pub max_redeliveries: u32,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            store_timeout_ms: 5000,
            publish_timeout_ms: 5000,
            max_redeliveries: 3,
        }
    }
}

/// Outbox relay section. Only used when `broker.use_real_broker` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutboxConfig {
    pub poll_interval_ms: u64,
    pub batch_size: i64,
    pub max_attempts: i32,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            batch_size: 50,
            max_attempts: 12,
        }
    }
}

/// Odds section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OddsConfig {
    /// Multiplier for every market without an override.
    pub default: Decimal,
    /// Per-market overrides, keyed by market id.
    pub markets: HashMap<String, Decimal>,
}

impl Default for OddsConfig {
    fn default() -> Self {
        Self {
            default: betsettle_core::odds::DEFAULT_WINNING_ODDS,
            markets: HashMap::new(),
        }
    }
}
