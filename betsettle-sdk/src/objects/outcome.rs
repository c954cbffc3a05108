//! Event outcome message carried on the outcome channel.

use serde::{Deserialize, Serialize};

use super::{ValidationError, require_non_blank};

/// Authoritative result of a sports event, as published on the outcome channel.
///
/// Missing fields deserialize as empty strings so that an incomplete message
/// surfaces as a [`ValidationError`] rather than a decoding failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventOutcomeMessage {
    #[serde(default)]
    pub event_id: String,
    #[serde(default)]
    pub event_name: String,
    #[serde(default)]
    pub event_winner_id: String,
}

impl EventOutcomeMessage {
    /// Check the fields the settlement pipeline cannot work without.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_blank("eventId", &self.event_id)?;
        require_non_blank("eventWinnerId", &self.event_winner_id)?;
        Ok(())
    }
}
