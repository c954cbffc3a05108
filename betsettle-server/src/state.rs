//! Application state shared across all request handlers.

use betsettle_core::events::OutcomeSender;
use betsettle_core::framework::DatabaseProcessor;
use sqlx::PgPool;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: PgPool,
    /// Intake side of the outcome channel consumed by the bet matcher.
    pub outcome_tx: OutcomeSender,
}

impl AppState {
    pub fn new(db: PgPool, outcome_tx: OutcomeSender) -> Self {
        Self { db, outcome_tx }
    }

    pub fn processor(&self) -> DatabaseProcessor {
        DatabaseProcessor::new(self.db.clone())
    }
}
