//! The broker: a duplex WebSocket relay multiplexing N client sessions and
//! exactly one extension session (spec.md §4.1).
//!
//! Ordering note (spec.md §9, open question): this implementation makes no
//! guarantee about the relative order in which a `response`/`urlChanged`
//! event and the reply to the command that caused it arrive at a client.
//! The event fan-out path ([`core::BrokerCommand::ExtensionEvent`]) and the
//! pending-request completion path ([`core::BrokerCommand::ExtensionResponse`])
//! are independent branches of the same actor loop; whichever the
//! page-bridge happens to emit first on the wire wins.

pub mod core;
pub mod error;
pub mod pending;
pub mod server;
mod tuning_inject;

pub use core::{BrokerActor, BrokerCommand};
pub use error::BrokerError;
