//! Chat session storage - byte-level API for chat session persistence.

use anyhow::Result;
use redb::Database;
use std::sync::Arc;

use crate::table::ByteTable;

const CHAT_SESSIONS_TABLE: &str = "chat_sessions";

/// Low-level chat session storage keyed by session ID.
///
/// Values are opaque; `streamchat-core` stores JSON-encoded sessions here.
#[derive(Debug, Clone)]
pub struct ChatSessionStorage {
    table: ByteTable,
}

impl ChatSessionStorage {
    pub fn new(db: Arc<Database>) -> Result<Self> {
        Ok(Self {
            table: ByteTable::open(db, CHAT_SESSIONS_TABLE)?,
        })
    }

    /// Store raw session data
    pub fn put_raw(&self, id: &str, data: &[u8]) -> Result<()> {
        self.table.put(id, data)
    }

    /// List all raw session data
    pub fn list_raw(&self) -> Result<Vec<(String, Vec<u8>)>> {
        self.table.entries()
    }

    /// Replace the whole session set atomically.
    pub fn replace_all(&self, sessions: &[(String, Vec<u8>)]) -> Result<()> {
        let removed = self.table.replace_all(sessions)?;
        if removed > 0 {
            tracing::debug!(removed, kept = sessions.len(), "Pruned deleted chat sessions");
        }
        Ok(())
    }
}
