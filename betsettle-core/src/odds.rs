//! Odds lookup.
//!
//! The matcher asks an [`OddsProvider`] for the multiplier of a market and
//! never hard-codes one. [`MarketOdds`] is the configured implementation: a
//! flat default with optional per-market overrides.

use rust_decimal::Decimal;
use std::collections::HashMap;

/// Multiplier applied to a winning stake when no override is configured.
pub const DEFAULT_WINNING_ODDS: Decimal = Decimal::TWO;

pub trait OddsProvider: Send + Sync {
    /// Multiplier applied to a winning stake on `market_id`.
    fn odds_for(&self, market_id: &str) -> Decimal;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketOdds {
    default_odds: Decimal,
    overrides: HashMap<String, Decimal>,
}

impl MarketOdds {
    pub fn new(default_odds: Decimal, overrides: HashMap<String, Decimal>) -> Self {
        Self {
            default_odds,
            overrides,
        }
    }

    /// The same odds for every market.
    pub fn flat(odds: Decimal) -> Self {
        Self::new(odds, HashMap::new())
    }
}

impl Default for MarketOdds {
    fn default() -> Self {
        Self::flat(DEFAULT_WINNING_ODDS)
    }
}

impl OddsProvider for MarketOdds {
    fn odds_for(&self, market_id: &str) -> Decimal {
        self.overrides
            .get(market_id)
            .copied()
            .unwrap_or(self.default_odds)
    }
}
