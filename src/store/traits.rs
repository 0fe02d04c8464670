//! `MessageSource` trait — incremental reads from the local message log.

use async_trait::async_trait;

use crate::error::DatabaseError;

/// An inbound message from the local log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Log row id; unique and strictly increasing in arrival order.
    pub id: i64,
    /// Sender handle (phone number or account address).
    pub sender: String,
    pub text: String,
}

impl Message {
    pub fn new(id: i64, sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id,
            sender: sender.into(),
            text: text.into(),
        }
    }
}

/// Read-only view of the append-only message log.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// All inbound messages with `id > cursor`, in ascending id order.
    async fn read_since(&self, cursor: i64) -> Result<Vec<Message>, DatabaseError>;
}
