pub mod bets;
pub mod outcome;
pub mod settlement;

pub use bets::{BetResponse, BetStatus, CreateBetRequest};
pub use outcome::EventOutcomeMessage;
pub use settlement::{BetSettlementMessage, SettlementStatus};

use rust_decimal::{Decimal, RoundingStrategy};

/// Rejection of a malformed inbound request or message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("{0} must be positive")]
    NotPositive(&'static str),
    #[error("{field} must have at most {max_digits} fractional digits")]
    TooPrecise {
        field: &'static str,
        max_digits: u32,
    },
}

/// Fractional digits kept for money amounts.
pub const AMOUNT_SCALE: u32 = 2;

/// Reject empty or whitespace-only identifiers.
pub fn require_non_blank(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(())
}

/// Format a currency amount with exactly two fractional digits.
///
/// Midpoints round away from zero, so `0.005` becomes `"0.01"`.
pub fn format_amount(amount: Decimal) -> String {
    let mut rounded =
        amount.round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(AMOUNT_SCALE);
    rounded.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_amount_pads_and_rounds() {
        assert_eq!(format_amount(Decimal::new(200, 0)), "200.00");
        assert_eq!(format_amount(Decimal::ZERO), "0.00");
        assert_eq!(format_amount(Decimal::new(15, 1)), "1.50");
        assert_eq!(format_amount(Decimal::new(12345, 3)), "12.35");
        assert_eq!(format_amount(Decimal::new(5, 3)), "0.01");
    }

    #[test]
    fn test_require_non_blank() {
        assert!(require_non_blank("eventId", "E1").is_ok());
        assert_eq!(
            require_non_blank("eventId", "   "),
            Err(ValidationError::MissingField("eventId"))
        );
    }
}
