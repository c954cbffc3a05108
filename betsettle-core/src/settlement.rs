//! Settlement model.
//!
//! A [`BetSettlement`] is the value produced by matching one bet against one
//! outcome. It is built once, handed to the publisher and never mutated.

use crate::entities::BetStatus;
use crate::entities::bets::Bet;
use crate::events::EventOutcome;
use betsettle_sdk::objects::{
    BetSettlementMessage, SettlementStatus as SdkSettlementStatus, format_amount,
};
use rust_decimal::{Decimal, RoundingStrategy};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettlementStatus {
    Won,
    Lost,
    Void,
}

impl From<SettlementStatus> for BetStatus {
    fn from(value: SettlementStatus) -> Self {
        match value {
            SettlementStatus::Won => BetStatus::Won,
            SettlementStatus::Lost => BetStatus::Lost,
            SettlementStatus::Void => BetStatus::Void,
        }
    }
}

impl From<SettlementStatus> for SdkSettlementStatus {
    fn from(value: SettlementStatus) -> Self {
        match value {
            SettlementStatus::Won => SdkSettlementStatus::Won,
            SettlementStatus::Lost => SdkSettlementStatus::Lost,
            SettlementStatus::Void => SdkSettlementStatus::Void,
        }
    }
}

impl std::fmt::Display for SettlementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&SdkSettlementStatus::from(*self), f)
    }
}

/// Stake times odds, rounded to cents with midpoints away from zero.
///
/// `None` when the product does not fit in a `Decimal`.
pub fn payout_for(stake: Decimal, odds: Decimal) -> Option<Decimal> {
    stake
        .checked_mul(odds)
        .map(|payout| payout.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

/// Result of settling one bet.
///
/// `payout_amount` is positive only for `Won`, zero for `Lost`, and the
/// stake for `Void`. Two settlements are equal when their `bet_id` matches.
#[derive(Debug, Clone)]
pub struct BetSettlement {
    pub bet_id: i64,
    pub user_id: String,
    pub settlement_status: SettlementStatus,
    pub payout_amount: Decimal,
    pub settlement_time: OffsetDateTime,
    pub event_id: String,
}

impl PartialEq for BetSettlement {
    fn eq(&self, other: &Self) -> bool {
        self.bet_id == other.bet_id
    }
}

impl Eq for BetSettlement {}

impl BetSettlement {
    /// Settle `bet` against `outcome`.
    ///
    /// The predicted winner must equal the outcome's winner exactly; no case
    /// or whitespace normalization is applied. Returns `None` when a winning
    /// payout overflows.
    pub fn decide(
        bet: &Bet,
        outcome: &EventOutcome,
        odds: Decimal,
        now: OffsetDateTime,
    ) -> Option<Self> {
        let won = bet.event_winner_id == outcome.event_winner_id();
        let (settlement_status, payout_amount) = if won {
            (SettlementStatus::Won, payout_for(bet.bet_amount, odds)?)
        } else {
            (SettlementStatus::Lost, Decimal::ZERO)
        };
        Some(Self {
            bet_id: bet.bet_id,
            user_id: bet.user_id.clone(),
            settlement_status,
            payout_amount,
            settlement_time: now,
            event_id: bet.event_id.clone(),
        })
    }

    /// Void `bet`, refunding the stake. Reserved for cancellation flows.
    pub fn void(bet: &Bet, now: OffsetDateTime) -> Self {
        Self {
            bet_id: bet.bet_id,
            user_id: bet.user_id.clone(),
            settlement_status: SettlementStatus::Void,
            payout_amount: bet.bet_amount,
            settlement_time: now,
            event_id: bet.event_id.clone(),
        }
    }

    /// The bet status this settlement moves the bet to.
    pub fn target_status(&self) -> BetStatus {
        self.settlement_status.into()
    }

    pub fn to_message(&self) -> BetSettlementMessage {
        BetSettlementMessage {
            bet_id: self.bet_id,
            user_id: self.user_id.clone(),
            settlement_status: self.settlement_status.into(),
            payout_amount: format_amount(self.payout_amount),
            settlement_time: self.settlement_time.to_offset(time::UtcOffset::UTC),
            event_id: self.event_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bet(winner: &str, amount: Decimal) -> Bet {
        Bet {
            bet_id: 1,
            user_id: "user1".into(),
            event_id: "E1".into(),
            event_market_id: "match-winner".into(),
            event_winner_id: winner.into(),
            bet_amount: amount,
            status: BetStatus::Pending,
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn outcome(winner: &str) -> EventOutcome {
        EventOutcome::new("E1", "Final", winner).unwrap()
    }

    #[test]
    fn test_matching_winner_pays_stake_times_odds() {
        let now = OffsetDateTime::now_utc();
        let s = BetSettlement::decide(
            &bet("team1", Decimal::new(10000, 2)),
            &outcome("team1"),
            Decimal::TWO,
            now,
        )
        .unwrap();
        assert_eq!(s.settlement_status, SettlementStatus::Won);
        assert_eq!(s.payout_amount, Decimal::new(20000, 2));
        assert_eq!(s.settlement_time, now);
        assert_eq!(s.target_status(), BetStatus::Won);
    }

    #[test]
    fn test_other_winner_loses_with_zero_payout() {
        let s = BetSettlement::decide(
            &bet("team1", Decimal::new(10000, 2)),
            &outcome("team2"),
            Decimal::TWO,
            OffsetDateTime::now_utc(),
        )
        .unwrap();
        assert_eq!(s.settlement_status, SettlementStatus::Lost);
        assert_eq!(s.payout_amount, Decimal::ZERO);
        assert_eq!(s.to_message().payout_amount, "0.00");
    }

    #[test]
    fn test_winner_match_is_exact() {
        let s = BetSettlement::decide(
            &bet("Team1", Decimal::ONE),
            &outcome("team1"),
            Decimal::TWO,
            OffsetDateTime::now_utc(),
        )
        .unwrap();
        assert_eq!(s.settlement_status, SettlementStatus::Lost);
    }

    #[test]
    fn test_void_refunds_stake() {
        let s = BetSettlement::void(
            &bet("team1", Decimal::new(7500, 2)),
            OffsetDateTime::now_utc(),
        );
        assert_eq!(s.settlement_status, SettlementStatus::Void);
        assert_eq!(s.payout_amount, Decimal::new(7500, 2));
    }

    #[test]
    fn test_payout_rounds_half_away_from_zero() {
        assert_eq!(
            payout_for(Decimal::new(1001, 2), Decimal::new(185, 2)),
            Some(Decimal::new(1852, 2))
        );
        assert_eq!(
            payout_for(Decimal::new(1, 2), Decimal::new(15, 1)),
            Some(Decimal::new(2, 2))
        );
    }

    #[test]
    fn test_overflowing_payout_is_rejected() {
        assert_eq!(payout_for(Decimal::MAX, Decimal::TWO), None);
        let s = BetSettlement::decide(
            &bet("team1", Decimal::MAX),
            &outcome("team1"),
            Decimal::TWO,
            OffsetDateTime::now_utc(),
        );
        assert!(s.is_none());

        // a losing bet never multiplies
        let s = BetSettlement::decide(
            &bet("team1", Decimal::MAX),
            &outcome("team2"),
            Decimal::TWO,
            OffsetDateTime::now_utc(),
        );
        assert_eq!(s.unwrap().payout_amount, Decimal::ZERO);
    }

    #[test]
    fn test_message_formats_two_fraction_digits() {
        let s = BetSettlement::decide(
            &bet("team1", Decimal::new(100, 0)),
            &outcome("team1"),
            Decimal::TWO,
            OffsetDateTime::now_utc(),
        )
        .unwrap();
        let msg = s.to_message();
        assert_eq!(msg.bet_id, 1);
        assert_eq!(msg.payout_amount, "200.00");
        assert_eq!(msg.settlement_status, SdkSettlementStatus::Won);
        assert_eq!(msg.event_id, "E1");
    }
}
