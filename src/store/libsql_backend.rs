//! libSQL reader for the local chat database.
//!
//! The log is owned and written by another application; it is opened
//! read-only and only ever queried by row id.

use std::path::Path;

use async_trait::async_trait;
use libsql::{Database as LibSqlDatabase, OpenFlags, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::store::traits::{Message, MessageSource};

/// Placeholder body for messages with no text column (attachments only).
pub const NO_TEXT_PLACEHOLDER: &str = "(no text content)";

const NEW_MESSAGES_QUERY: &str = "SELECT m.ROWID, h.id, m.text
     FROM message m
     JOIN handle h ON m.handle_id = h.ROWID
     WHERE m.ROWID > ?1 AND m.is_from_me = 0
     ORDER BY m.ROWID ASC";

/// Message source backed by the Messages `chat.db`.
pub struct ChatDbSource {
    db: LibSqlDatabase,
}

impl ChatDbSource {
    /// Open an existing chat database read-only.
    pub async fn open(path: &Path) -> Result<Self, DatabaseError> {
        if !path.exists() {
            return Err(DatabaseError::Open(format!(
                "chat database not found at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .flags(OpenFlags::SQLITE_OPEN_READ_ONLY)
            .build()
            .await
            .map_err(|e| DatabaseError::Open(format!("Failed to open libSQL database: {e}")))?;

        info!(path = %path.display(), "Chat database opened");
        Ok(Self { db })
    }
}

#[async_trait]
impl MessageSource for ChatDbSource {
    async fn read_since(&self, cursor: i64) -> Result<Vec<Message>, DatabaseError> {
        // A fresh connection per read sees everything the writer has committed.
        let conn = self
            .db
            .connect()
            .map_err(|e| DatabaseError::Open(format!("Failed to create connection: {e}")))?;

        let mut rows = conn
            .query(NEW_MESSAGES_QUERY, params![cursor])
            .await
            .map_err(|e| DatabaseError::Query(format!("read_since: {e}")))?;

        let mut messages = Vec::new();
        loop {
            let row = match rows.next().await {
                Ok(Some(row)) => row,
                Ok(None) => break,
                Err(e) => return Err(DatabaseError::Query(format!("read_since: {e}"))),
            };
            match row_to_message(&row) {
                Ok(msg) => messages.push(msg),
                Err(e) => tracing::warn!("Skipping message row: {e}"),
            }
        }

        debug!(cursor, count = messages.len(), "Read new messages");
        Ok(messages)
    }
}

fn row_to_message(row: &libsql::Row) -> Result<Message, libsql::Error> {
    let text: Option<String> = row.get(2).ok();
    Ok(Message {
        id: row.get(0)?,
        sender: row.get(1)?,
        text: text
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| NO_TEXT_PLACEHOLDER.to_string()),
    })
}
