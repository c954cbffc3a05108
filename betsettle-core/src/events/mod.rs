//! Event types and channels connecting the settlement pipeline.
//!
//! # Event Flow
//!
//! 1. HTTP intake emits `EventOutcomeMessage` -> `BetMatcher`
//! 2. `BetMatcher` hands each `BetSettlement` to the configured `SettlementPublisher`
//! 3. Broker mode: the transport carries a `SettlementEnvelope` -> `SettlementConsumer`
//!
//! Outcomes carry identifiers only. The matcher re-reads bet state from the
//! store for every delivery, so a redelivered outcome is harmless.

pub mod channels;
pub mod types;

pub use channels::{
    DEFAULT_CHANNEL_BUFFER, OutcomeReceiver, OutcomeSender, SettlementEnvelopeReceiver,
    SettlementEnvelopeSender, outcome_channel, settlement_envelope_channel,
};

pub use types::{EventOutcome, SettlementEnvelope};
