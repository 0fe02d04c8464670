//! Pending registry — relays forwarded by email and still awaiting a reply.

use serde::{Deserialize, Serialize};

/// Prefix of every correlation token.
pub const TOKEN_PREFIX: &str = "MSGID:";

/// Build the correlation token for a source message id.
pub fn correlation_token(message_id: i64) -> String {
    format!("{TOKEN_PREFIX}{message_id}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayStatus {
    AwaitingReply,
    Resolved,
}

/// One in-flight relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRelay {
    pub token: String,
    /// Source message id the relay was built from.
    pub message_id: i64,
    /// Handle the eventual reply goes back to.
    pub sender: String,
    pub status: RelayStatus,
}

impl PendingRelay {
    pub fn new(message_id: i64, sender: impl Into<String>) -> Self {
        Self {
            token: correlation_token(message_id),
            message_id,
            sender: sender.into(),
            status: RelayStatus::AwaitingReply,
        }
    }
}

/// Insertion-ordered map from token to relay.
///
/// Owned by the controller; there is exactly one writer.
#[derive(Debug, Clone, Default)]
pub struct PendingRegistry {
    entries: Vec<PendingRelay>,
}

impl PendingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a persisted list, dropping anything already resolved.
    pub fn restore(entries: Vec<PendingRelay>) -> Self {
        let mut registry = Self::new();
        for entry in entries {
            if entry.status == RelayStatus::AwaitingReply {
                registry.insert(entry);
            }
        }
        registry
    }

    /// Register a relay. Re-registering a token replaces the old entry in place.
    pub fn insert(&mut self, relay: PendingRelay) {
        match self.entries.iter_mut().find(|e| e.token == relay.token) {
            Some(existing) => *existing = relay,
            None => self.entries.push(relay),
        }
    }

    pub fn get(&self, token: &str) -> Option<&PendingRelay> {
        self.entries.iter().find(|e| e.token == token)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.get(token).is_some()
    }

    /// Mark a relay resolved and retire it.
    pub fn resolve(&mut self, token: &str) -> Option<PendingRelay> {
        let idx = self.entries.iter().position(|e| e.token == token)?;
        let mut relay = self.entries.remove(idx);
        relay.status = RelayStatus::Resolved;
        Some(relay)
    }

    /// Snapshot of relays awaiting a reply, in insertion order.
    pub fn awaiting(&self) -> Vec<PendingRelay> {
        self.entries
            .iter()
            .filter(|e| e.status == RelayStatus::AwaitingReply)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_vec(&self) -> Vec<PendingRelay> {
        self.entries.clone()
    }
}
