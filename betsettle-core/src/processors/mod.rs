//! Processors of the settlement pipeline.
//!
//! - `BetMatcher`: Receives `EventOutcomeMessage`, settles pending bets, hands
//!   each `BetSettlement` to the configured `SettlementPublisher`
//! - `SettlementConsumer`: Applies settlements to the ledger
//! - `OutboxRelay`: Delivers durable outbox rows to the `SettlementConsumer`

pub mod bet_matcher;
pub mod outbox_relay;
pub mod settlement_consumer;
pub mod settlement_dispatcher;

pub use bet_matcher::{BetMatcher, MatchError, SettlementReport};
pub use outbox_relay::{OutboxRelay, OutboxTransport, RelayReport};
pub use settlement_consumer::{
    Applied, LedgerError, SettlementConsumer, SettlementLedger, TracingLedger,
};
pub use settlement_dispatcher::{
    BrokerSettlementPublisher, ChannelTransport, LocalSettlementPublisher, PublishError,
    SettlementPublisher, SettlementTransport, TransportError, build_publisher,
};
