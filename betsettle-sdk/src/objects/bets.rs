//! Bet request and response bodies for the HTTP surface.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{AMOUNT_SCALE, ValidationError, require_non_blank};

/// Bet status for API responses.
///
/// This is the API/DTO version without sqlx::Type.
/// For database operations, use the version in `betsettle-core::entities`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BetStatus {
    Pending,
    Won,
    Lost,
    Void,
}

/// Request payload for placing a new bet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBetRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub event_id: String,
    #[serde(default)]
    pub event_market_id: String,
    #[serde(default)]
    pub event_winner_id: String,
    #[serde(default)]
    pub bet_amount: Option<Decimal>,
}

impl CreateBetRequest {
    /// Validate the request and return the stake.
    pub fn validate(&self) -> Result<Decimal, ValidationError> {
        require_non_blank("userId", &self.user_id)?;
        require_non_blank("eventId", &self.event_id)?;
        require_non_blank("eventMarketId", &self.event_market_id)?;
        require_non_blank("eventWinnerId", &self.event_winner_id)?;
        let amount = self
            .bet_amount
            .ok_or(ValidationError::MissingField("betAmount"))?;
        if amount <= Decimal::ZERO {
            return Err(ValidationError::NotPositive("betAmount"));
        }
        if amount.normalize().scale() > AMOUNT_SCALE {
            return Err(ValidationError::TooPrecise {
                field: "betAmount",
                max_digits: AMOUNT_SCALE,
            });
        }
        Ok(amount)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetResponse {
    pub bet_id: i64,
    pub user_id: String,
    pub event_id: String,
    pub event_market_id: String,
    pub event_winner_id: String,
    pub bet_amount: Decimal,
    pub status: BetStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
