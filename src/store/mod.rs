//! Persistence layer — the local message log (read-only) and the bridge's
//! own cursor/state record.

pub mod libsql_backend;
pub mod state;
pub mod traits;

pub use libsql_backend::ChatDbSource;
pub use state::{BridgeState, StateStore};
pub use traits::{Message, MessageSource};
