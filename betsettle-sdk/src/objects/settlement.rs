//! Settlement message contract published on the settlement channel.
//!
//! The JSON shape is identical whether the message travels through the
//! durable broker or is applied in-process:
//!
//! ```json
//! {
//!   "betId": 1,
//!   "userId": "user123",
//!   "settlementStatus": "WON",
//!   "payoutAmount": "200.00",
//!   "settlementTime": "2026-10-17T12:00:00Z",
//!   "eventId": "event001"
//! }
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Settlement status as it appears on the wire.
///
/// Any value other than `WON`, `LOST` or `VOID` decodes to `Unknown` so that
/// consumers can flag it instead of failing to decode the whole message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SettlementStatus {
    Won,
    Lost,
    Void,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for SettlementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettlementStatus::Won => write!(f, "WON"),
            SettlementStatus::Lost => write!(f, "LOST"),
            SettlementStatus::Void => write!(f, "VOID"),
            SettlementStatus::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetSettlementMessage {
    pub bet_id: i64,
    pub user_id: String,
    pub settlement_status: SettlementStatus,
    /// Decimal string with two fractional digits.
    pub payout_amount: String,
    /// Falls back to the decoding time when absent.
    #[serde(
        with = "time::serde::rfc3339",
        default = "time::OffsetDateTime::now_utc"
    )]
    pub settlement_time: OffsetDateTime,
    pub event_id: String,
}

impl BetSettlementMessage {
    /// Parse the payout amount back into a decimal.
    pub fn payout(&self) -> Result<Decimal, rust_decimal::Error> {
        self.payout_amount.parse()
    }
}
