//! Relay engine — forwards local messages to email and routes the
//! operator's replies back, correlated by `MSGID:<id>` tokens.

pub mod commands;
pub mod controller;
pub mod ledger;
pub mod outbound;
pub mod pending;
pub mod reply;

#[cfg(test)]
pub(crate) mod testing;

pub use commands::{Command, Flow};
pub use controller::{BridgeController, BridgePhase};
pub use ledger::Ledger;
pub use outbound::OutboundRelay;
pub use pending::{PendingRegistry, PendingRelay, RelayStatus, correlation_token};
