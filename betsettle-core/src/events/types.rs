//! Event type definitions for the settlement pipeline.

use betsettle_sdk::objects::{EventOutcomeMessage, ValidationError, require_non_blank};
use uuid::Uuid;

/// The authoritative result of a sports event.
///
/// Two outcomes are the same outcome when their `event_id` matches.
/// Construct through [`EventOutcome::new`] or `TryFrom<EventOutcomeMessage>`,
/// both of which reject a blank event id or winner.
#[derive(Debug, Clone)]
pub struct EventOutcome {
    event_id: String,
    event_name: String,
    event_winner_id: String,
}

impl EventOutcome {
    pub fn new(
        event_id: impl Into<String>,
        event_name: impl Into<String>,
        event_winner_id: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let outcome = Self {
            event_id: event_id.into(),
            event_name: event_name.into(),
            event_winner_id: event_winner_id.into(),
        };
        require_non_blank("eventId", &outcome.event_id)?;
        require_non_blank("eventWinnerId", &outcome.event_winner_id)?;
        Ok(outcome)
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    pub fn event_winner_id(&self) -> &str {
        &self.event_winner_id
    }
}

impl PartialEq for EventOutcome {
    fn eq(&self, other: &Self) -> bool {
        self.event_id == other.event_id
    }
}

impl Eq for EventOutcome {}

impl TryFrom<EventOutcomeMessage> for EventOutcome {
    type Error = ValidationError;

    fn try_from(msg: EventOutcomeMessage) -> Result<Self, Self::Error> {
        msg.validate()?;
        Ok(Self {
            event_id: msg.event_id,
            event_name: msg.event_name,
            event_winner_id: msg.event_winner_id,
        })
    }
}

/// A serialized settlement on its way through a broker transport.
///
/// `key` is the bet id; transports keep envelopes with the same key in
/// publish order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementEnvelope {
    pub message_id: Uuid,
    pub topic: String,
    pub key: String,
    /// JSON encoded `BetSettlementMessage`.
    pub payload: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_requires_event_and_winner() {
        assert!(EventOutcome::new("E1", "Final", "team1").is_ok());
        assert!(EventOutcome::new("E1", "", "team1").is_ok());
        assert_eq!(
            EventOutcome::new("", "Final", "team1"),
            Err(ValidationError::MissingField("eventId"))
        );
        assert_eq!(
            EventOutcome::new("E1", "Final", " "),
            Err(ValidationError::MissingField("eventWinnerId"))
        );
    }

    #[test]
    fn test_outcome_equality_by_event_id() {
        let a = EventOutcome::new("E1", "Final", "team1").unwrap();
        let b = EventOutcome::new("E1", "Replay", "team2").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_outcome_from_message() {
        let msg = EventOutcomeMessage {
            event_id: "E1".into(),
            event_name: "Final".into(),
            event_winner_id: "team1".into(),
        };
        let outcome = EventOutcome::try_from(msg).unwrap();
        assert_eq!(outcome.event_winner_id(), "team1");
    }
}
