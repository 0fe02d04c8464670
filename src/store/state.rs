//! Durable bridge state — the message cursor plus in-flight relays.
//!
//! Stored as a small JSON record. Older records carrying only `last_rowid`
//! still load; their pending list is simply empty.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StateError;
use crate::relay::pending::PendingRelay;

/// The persisted record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeState {
    /// Id of the last message successfully forwarded.
    #[serde(default)]
    pub last_rowid: i64,
    /// Relays still awaiting a reply, in insertion order.
    #[serde(default)]
    pub pending: Vec<PendingRelay>,
}

/// File-backed store for [`BridgeState`].
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the record. A missing file yields a fresh state; an unreadable or
    /// malformed one is logged and also treated as fresh.
    pub fn load(&self) -> BridgeState {
        match self.try_load() {
            Ok(Some(state)) => {
                debug!(
                    last_rowid = state.last_rowid,
                    pending = state.pending.len(),
                    "Loaded state"
                );
                state
            }
            Ok(None) => {
                debug!(path = %self.path.display(), "State file not found, starting fresh");
                BridgeState::default()
            }
            Err(e) => {
                warn!("Ignoring state file: {e}");
                BridgeState::default()
            }
        }
    }

    fn try_load(&self) -> Result<Option<BridgeState>, StateError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(self.io_error(source)),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StateError::Json {
                path: self.path.display().to_string(),
                source,
            })
    }

    /// Write the record, replacing the previous one atomically.
    pub fn save(&self, state: &BridgeState) -> Result<(), StateError> {
        let json = serde_json::to_string(state).map_err(|source| StateError::Json {
            path: self.path.display().to_string(),
            source,
        })?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| self.io_error(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;

        debug!(last_rowid = state.last_rowid, "Saved state");
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> StateError {
        StateError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}
