//! Ledger — the cursor and pending registry, persisted together.
//!
//! Every mutation is saved immediately. A failed save is logged and the
//! in-memory values stay authoritative.

use tracing::{error, info};

use crate::relay::pending::{PendingRegistry, PendingRelay};
use crate::store::{BridgeState, StateStore};

pub struct Ledger {
    store: StateStore,
    cursor: i64,
    pending: PendingRegistry,
}

impl Ledger {
    /// Restore from the state file (fresh if missing).
    pub fn load(store: StateStore) -> Self {
        let state = store.load();
        let pending = PendingRegistry::restore(state.pending);
        if !pending.is_empty() {
            info!(count = pending.len(), "Restored pending relays");
        }
        Self {
            store,
            cursor: state.last_rowid,
            pending,
        }
    }

    /// Id of the last forwarded message.
    pub fn cursor(&self) -> i64 {
        self.cursor
    }

    pub fn pending(&self) -> &PendingRegistry {
        &self.pending
    }

    /// Record a successful forward: register the relay, advance the cursor,
    /// persist. All three happen before the next message is attempted.
    pub fn record_forward(&mut self, relay: PendingRelay) {
        self.cursor = self.cursor.max(relay.message_id);
        self.pending.insert(relay);
        self.save();
    }

    /// Retire a relay whose reply has been consumed.
    pub fn resolve(&mut self, token: &str) -> Option<PendingRelay> {
        let relay = self.pending.resolve(token)?;
        self.save();
        Some(relay)
    }

    /// Best-effort persist of the current state.
    pub fn save(&self) -> bool {
        let state = BridgeState {
            last_rowid: self.cursor,
            pending: self.pending.to_vec(),
        };
        match self.store.save(&state) {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to save state: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_forward_persists_cursor_and_pending() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        let mut ledger = Ledger::load(store.clone());
        assert_eq!(ledger.cursor(), 0);

        ledger.record_forward(PendingRelay::new(5, "+1555"));

        let on_disk = store.load();
        assert_eq!(on_disk.last_rowid, 5);
        assert_eq!(on_disk.pending, vec![PendingRelay::new(5, "+1555")]);
    }

    #[test]
    fn cursor_never_moves_backwards() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = Ledger::load(StateStore::new(dir.path().join("state.json")));
        ledger.record_forward(PendingRelay::new(9, "a"));
        ledger.record_forward(PendingRelay::new(4, "b"));
        assert_eq!(ledger.cursor(), 9);
    }

    #[test]
    fn resolve_persists_removal() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        let mut ledger = Ledger::load(store.clone());
        ledger.record_forward(PendingRelay::new(1, "+1555"));

        assert!(ledger.resolve("MSGID:1").is_some());
        assert!(store.load().pending.is_empty());
        assert_eq!(store.load().last_rowid, 1);
    }

    #[test]
    fn reload_restores_pending() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        let mut ledger = Ledger::load(store.clone());
        ledger.record_forward(PendingRelay::new(3, "+1555"));
        drop(ledger);

        let ledger = Ledger::load(store);
        assert_eq!(ledger.cursor(), 3);
        assert!(ledger.pending().contains("MSGID:3"));
    }

    #[test]
    fn save_failure_keeps_memory_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("gone").join("state.json"));
        let mut ledger = Ledger::load(store);

        ledger.record_forward(PendingRelay::new(2, "+1555"));
        assert_eq!(ledger.cursor(), 2);
        assert_eq!(ledger.pending().len(), 1);
        assert!(!ledger.save());
    }
}
