//! Odds configuration.

use crate::odds::{DEFAULT_WINNING_ODDS, MarketOdds};
use rust_decimal::Decimal;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OddsConfig {
    pub default_odds: Decimal,
    /// Market id to odds.
    pub overrides: HashMap<String, Decimal>,
}

impl Default for OddsConfig {
    fn default() -> Self {
        Self {
            default_odds: DEFAULT_WINNING_ODDS,
            overrides: HashMap::new(),
        }
    }
}

impl From<OddsConfig> for MarketOdds {
    fn from(config: OddsConfig) -> Self {
        MarketOdds::new(config.default_odds, config.overrides)
    }
}
