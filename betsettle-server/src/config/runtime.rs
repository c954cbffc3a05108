//! Runtime configuration types.
//!
//! The pipeline config types are defined in `betsettle_core::config`.
//! This module re-exports them next to the server-only settings.

use std::net::SocketAddr;

pub use betsettle_core::config::{
    BrokerConfig, MatcherConfig, OddsConfig, OutboxConfig, SettlementConfig,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub listen: SocketAddr,
}
