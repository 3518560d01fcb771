//! StreamChat Storage - low-level persistence layer
//!
//! Uses redb as the embedded database and exposes byte-level or JSON-value
//! APIs, so this crate does not depend on the domain models in
//! `streamchat-core`.
//!
//! # Tables
//!
//! - `chat_sessions` - JSON-encoded chat sessions keyed by session ID
//! - `preferences` - active session, selected model, cached model list

pub mod chat_session;
pub mod preferences;
pub mod table;
pub mod time_utils;

use anyhow::{Context, Result};
use redb::Database;
use std::path::Path;
use std::sync::Arc;

pub use chat_session::ChatSessionStorage;
pub use preferences::{PreferenceStorage, Stamped};
pub use table::ByteTable;

/// Central storage manager that initializes all tables.
#[derive(Debug, Clone)]
pub struct Storage {
    pub chat_sessions: ChatSessionStorage,
    pub preferences: PreferenceStorage,
}

impl Storage {
    /// Open (or create) the database at `path` and initialize all tables.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let db = Arc::new(
            Database::create(path)
                .with_context(|| format!("Failed to open database at {}", path.display()))?,
        );

        let chat_sessions = ChatSessionStorage::new(db.clone())?;
        let preferences = PreferenceStorage::new(db.clone())?;

        Ok(Self {
            chat_sessions,
            preferences,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_storage_reopens_existing_database() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("streamchat.db");

        {
            let storage = Storage::new(&path).unwrap();
            storage.chat_sessions.put_raw("s1", b"{}").unwrap();
            storage.preferences.set("active_session", &"s1").unwrap();
        }

        let storage = Storage::new(&path).unwrap();
        let rows = storage.chat_sessions.list_raw().unwrap();
        assert_eq!(rows, vec![("s1".to_string(), b"{}".to_vec())]);
        let active: Option<String> = storage.preferences.get("active_session").unwrap();
        assert_eq!(active.as_deref(), Some("s1"));
    }
}
