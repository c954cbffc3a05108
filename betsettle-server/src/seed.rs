//! Sample data for local runs.

use betsettle_core::entities::StoreError;
use betsettle_core::entities::bets::{CountBets, CreateBet};
use betsettle_core::framework::DatabaseProcessor;
use kanau::processor::Processor;
use rust_decimal::Decimal;

/// `(user, event, market, predicted winner, stake in cents)`
const SAMPLE_BETS: [(&str, &str, &str, &str, i64); 5] = [
    ("user123", "event001", "match-winner", "team1", 10000),
    ("user456", "event001", "match-winner", "team2", 5000),
    ("user789", "event001", "over-under", "team1", 7500),
    ("user123", "event002", "match-winner", "teamA", 20000),
    ("user456", "event002", "match-winner", "teamB", 15000),
];

pub fn sample_bets() -> Vec<CreateBet> {
    SAMPLE_BETS
        .iter()
        .map(|&(user, event, market, winner, cents)| CreateBet {
            user_id: user.to_string(),
            event_id: event.to_string(),
            event_market_id: market.to_string(),
            event_winner_id: winner.to_string(),
            bet_amount: Decimal::new(cents, 2),
        })
        .collect()
}

/// Insert the sample bets when the bet table is empty.
///
/// Returns the number of bets inserted.
pub async fn seed_sample_bets(processor: &DatabaseProcessor) -> Result<usize, StoreError> {
    let existing = processor.process(CountBets).await?;
    if existing > 0 {
        tracing::info!(existing, "Bets already present, skipping sample data");
        return Ok(0);
    }

    let bets = sample_bets();
    let count = bets.len();
    for cmd in bets {
        let bet = processor.process(cmd).await?;
        tracing::info!(
            bet_id = bet.bet_id,
            user_id = %bet.user_id,
            event_id = %bet.event_id,
            event_winner_id = %bet.event_winner_id,
            bet_amount = %bet.bet_amount,
            "Sample bet created"
        );
    }
    tracing::info!(count, "Sample data loaded");
    Ok(count)
}
