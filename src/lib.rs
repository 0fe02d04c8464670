//! Relay Bridge — message log to mailbox relay with reply routing.

pub mod channels;
pub mod config;
pub mod error;
pub mod relay;
pub mod schedule;
pub mod store;
