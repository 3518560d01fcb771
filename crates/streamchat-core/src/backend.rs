//! Pluggable persistence for the session store.
//!
//! The store owns every session in memory and hands the whole set to a
//! [`SessionBackend`] after each committed mutation. [`RedbSessionBackend`]
//! keeps them in the embedded database; [`MemoryBackend`] keeps them in
//! process for tests and throwaway runs.

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use streamchat_storage::Storage;
use tracing::warn;

use crate::models::ChatSession;

const ACTIVE_SESSION_KEY: &str = "active_session";

/// Everything the store needs to resume.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    pub sessions: Vec<ChatSession>,
    pub active_session_id: Option<String>,
}

/// Load/save seam for [`crate::SessionStore`].
pub trait SessionBackend: Send + Sync {
    fn load(&self) -> Result<StoreSnapshot>;

    fn save(&self, sessions: &[ChatSession], active_session_id: Option<&str>) -> Result<()>;
}

/// Sessions as JSON rows in the `chat_sessions` table, active id in `preferences`.
#[derive(Debug, Clone)]
pub struct RedbSessionBackend {
    storage: Storage,
}

impl RedbSessionBackend {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }
}

impl SessionBackend for RedbSessionBackend {
    fn load(&self) -> Result<StoreSnapshot> {
        let mut sessions = Vec::new();
        for (id, bytes) in self.storage.chat_sessions.list_raw()? {
            match serde_json::from_slice::<ChatSession>(&bytes) {
                Ok(session) => sessions.push(session),
                Err(error) => warn!(session_id = %id, %error, "Skipping unreadable chat session"),
            }
        }

        let active_session_id = self
            .storage
            .preferences
            .get::<String>(ACTIVE_SESSION_KEY)?;

        Ok(StoreSnapshot {
            sessions,
            active_session_id,
        })
    }

    fn save(&self, sessions: &[ChatSession], active_session_id: Option<&str>) -> Result<()> {
        let mut rows = Vec::with_capacity(sessions.len());
        for session in sessions {
            let json = serde_json::to_vec(session)
                .with_context(|| format!("Failed to encode chat session {}", session.id))?;
            rows.push((session.id.clone(), json));
        }
        self.storage.chat_sessions.replace_all(&rows)?;

        match active_session_id {
            Some(id) => self.storage.preferences.set(ACTIVE_SESSION_KEY, &id)?,
            None => {
                self.storage.preferences.remove(ACTIVE_SESSION_KEY)?;
            }
        }
        Ok(())
    }
}

/// In-process backend. Clones share the same snapshot.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    snapshot: Arc<Mutex<StoreSnapshot>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from previously saved sessions.
    pub fn with_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            snapshot: Arc::new(Mutex::new(snapshot)),
        }
    }

    /// The most recently saved state.
    pub fn snapshot(&self) -> StoreSnapshot {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, StoreSnapshot> {
        self.snapshot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionBackend for MemoryBackend {
    fn load(&self) -> Result<StoreSnapshot> {
        Ok(self.snapshot())
    }

    fn save(&self, sessions: &[ChatSession], active_session_id: Option<&str>) -> Result<()> {
        let mut snapshot = self.lock();
        snapshot.sessions = sessions.to_vec();
        snapshot.active_session_id = active_session_id.map(str::to_string);
        Ok(())
    }
}
