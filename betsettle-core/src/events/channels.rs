//! Event channel factories and handles.

use super::types::SettlementEnvelope;
use betsettle_sdk::objects::EventOutcomeMessage;
use tokio::sync::mpsc;

/// Default buffer size for event channels.
///
/// This provides enough buffer to handle bursts while keeping memory bounded.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Sender handle for inbound outcome messages.
///
/// Messages are queued unvalidated; the matcher validates on dequeue.
pub type OutcomeSender = mpsc::Sender<EventOutcomeMessage>;
/// Receiver handle for inbound outcome messages.
pub type OutcomeReceiver = mpsc::Receiver<EventOutcomeMessage>;

/// Sender handle for settlement envelopes.
pub type SettlementEnvelopeSender = mpsc::Sender<SettlementEnvelope>;
/// Receiver handle for settlement envelopes.
pub type SettlementEnvelopeReceiver = mpsc::Receiver<SettlementEnvelope>;

/// Create a new outcome channel.
///
/// Multiple senders can be cloned from the returned sender. There is a
/// single consumer, the `BetMatcher`.
pub fn outcome_channel() -> (OutcomeSender, OutcomeReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}

/// Create a new settlement envelope channel.
///
/// Backs the in-process `ChannelTransport`. Envelopes are received in send
/// order, which keeps per-key ordering for a single publisher.
pub fn settlement_envelope_channel() -> (SettlementEnvelopeSender, SettlementEnvelopeReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}
