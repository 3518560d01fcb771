//! In-memory session store with write-through persistence.
//!
//! The store always holds at least one session and exactly one active
//! session. Each session has at most one assistant reply in progress (the
//! draft); drafts live only in memory and are frozen into a message, or
//! dropped, when the turn ends.

use streamchat_ai::HistoryMessage;
use streamchat_storage::time_utils;
use tracing::{debug, info, warn};

use crate::backend::SessionBackend;
use crate::error::{Result, SessionError};
use crate::models::{ChatMessage, ChatSession};

pub struct SessionStore {
    backend: Box<dyn SessionBackend>,
    sessions: Vec<ChatSession>,
    active_id: String,
    greeting: String,
    last_tick: i64,
}

/// In-memory state to put back when a save fails.
struct Checkpoint {
    sessions: Vec<ChatSession>,
    active_id: String,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("sessions", &self.sessions.len())
            .field("active_id", &self.active_id)
            .finish()
    }
}

impl SessionStore {
    /// Load sessions from `backend`.
    ///
    /// Starts a fresh session when nothing was saved, and falls back to the
    /// most recently updated session when the saved active id is gone.
    pub fn open(
        backend: impl SessionBackend + 'static,
        greeting: impl Into<String>,
    ) -> Result<Self> {
        let snapshot = backend.load()?;
        let last_tick = snapshot
            .sessions
            .iter()
            .map(|session| session.updated_at)
            .max()
            .unwrap_or(0);

        let mut store = Self {
            backend: Box::new(backend),
            sessions: snapshot.sessions,
            active_id: String::new(),
            greeting: greeting.into(),
            last_tick,
        };

        let saved_active = snapshot
            .active_session_id
            .filter(|id| store.position(id).is_some());
        match saved_active.or_else(|| store.most_recent_id()) {
            Some(id) => store.active_id = id,
            None => {
                store.create_session()?;
            }
        }

        info!(
            sessions = store.sessions.len(),
            active = %store.active_id,
            "Session store opened"
        );
        Ok(store)
    }

    pub fn greeting(&self) -> &str {
        &self.greeting
    }

    /// Create a session seeded with the greeting and make it active.
    pub fn create_session(&mut self) -> Result<&ChatSession> {
        let checkpoint = self.checkpoint();
        self.push_new_session();
        self.commit(checkpoint)?;
        self.active_session()
    }

    /// Append a frozen message. Derives the title from the first user message.
    pub fn append_message(&mut self, session_id: &str, message: ChatMessage) -> Result<()> {
        let now = self.tick();
        if self.session_mut(session_id)?.turn_in_progress() {
            return Err(SessionError::TurnInProgress(session_id.to_string()));
        }
        let checkpoint = self.checkpoint();
        self.session_mut(session_id)?.push_message(message, now);
        self.commit(checkpoint)
    }

    /// Remove a session. Deleting the active one activates the most recently
    /// updated remaining session, or a fresh one when none remain.
    pub fn delete_session(&mut self, session_id: &str) -> Result<()> {
        let index = self
            .position(session_id)
            .ok_or_else(|| SessionError::UnknownSession(session_id.to_string()))?;
        let checkpoint = self.checkpoint();
        self.sessions.remove(index);
        if self.active_id == session_id {
            match self.most_recent_id() {
                Some(id) => self.active_id = id,
                None => self.push_new_session(),
            }
        }
        self.commit(checkpoint)?;
        debug!(session_id, "Deleted chat session");
        Ok(())
    }

    /// Sessions ordered by `updated_at`, most recent first.
    pub fn list_sessions(&self) -> Vec<&ChatSession> {
        let mut sessions: Vec<&ChatSession> = self.sessions.iter().collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        sessions
    }

    pub fn get(&self, session_id: &str) -> Option<&ChatSession> {
        self.sessions.iter().find(|session| session.id == session_id)
    }

    pub fn active_id(&self) -> &str {
        &self.active_id
    }

    pub fn active_session(&self) -> Result<&ChatSession> {
        self.get(&self.active_id)
            .ok_or_else(|| SessionError::UnknownSession(self.active_id.clone()))
    }

    pub fn switch_session(&mut self, session_id: &str) -> Result<()> {
        if self.position(session_id).is_none() {
            return Err(SessionError::UnknownSession(session_id.to_string()));
        }
        if self.active_id == session_id {
            return Ok(());
        }
        let checkpoint = self.checkpoint();
        self.active_id = session_id.to_string();
        self.commit(checkpoint)
    }

    /// Record the model used for the session's requests.
    pub fn set_session_model(&mut self, session_id: &str, model: Option<String>) -> Result<()> {
        if self.session_mut(session_id)?.model == model {
            return Ok(());
        }
        let checkpoint = self.checkpoint();
        self.session_mut(session_id)?.model = model;
        self.commit(checkpoint)
    }

    /// History sent with the next request: frozen messages minus status lines.
    pub fn history(&self, session_id: &str) -> Result<Vec<HistoryMessage>> {
        self.get(session_id)
            .map(ChatSession::history)
            .ok_or_else(|| SessionError::UnknownSession(session_id.to_string()))
    }

    pub fn is_turn_in_progress(&self, session_id: &str) -> bool {
        self.get(session_id)
            .is_some_and(ChatSession::turn_in_progress)
    }

    /// Open an empty assistant draft.
    pub fn begin_turn(&mut self, session_id: &str) -> Result<()> {
        let session = self.session_mut(session_id)?;
        if session.turn_in_progress() {
            return Err(SessionError::TurnInProgress(session_id.to_string()));
        }
        session.draft = Some(String::new());
        Ok(())
    }

    /// Replace the draft text. Not persisted.
    pub fn update_draft(&mut self, session_id: &str, text: &str) -> Result<()> {
        let session = self.session_mut(session_id)?;
        match session.draft.as_mut() {
            Some(draft) => {
                draft.clear();
                draft.push_str(text);
                Ok(())
            }
            None => Err(SessionError::NoTurnInProgress(session_id.to_string())),
        }
    }

    /// Freeze the draft as an assistant message with `content`.
    ///
    /// The draft is closed even when saving fails; the reply is then lost.
    pub fn finish_turn(&mut self, session_id: &str, content: impl Into<String>) -> Result<()> {
        let now = self.tick();
        self.take_draft(session_id)?;
        let checkpoint = self.checkpoint();
        self.session_mut(session_id)?
            .push_message(ChatMessage::assistant(content), now);
        self.commit(checkpoint)
    }

    /// Drop the draft, optionally leaving a status line in its place.
    pub fn abandon_turn(&mut self, session_id: &str, status: Option<String>) -> Result<()> {
        let now = self.tick();
        self.take_draft(session_id)?;
        let Some(status) = status else {
            return Ok(());
        };
        let checkpoint = self.checkpoint();
        self.session_mut(session_id)?
            .push_message(ChatMessage::status(status), now);
        self.commit(checkpoint)
    }

    fn take_draft(&mut self, session_id: &str) -> Result<String> {
        self.session_mut(session_id)?
            .draft
            .take()
            .ok_or_else(|| SessionError::NoTurnInProgress(session_id.to_string()))
    }

    /// Add a greeted session and make it active, without saving.
    fn push_new_session(&mut self) {
        let now = self.tick();
        let mut session = ChatSession::new(now);
        if !self.greeting.trim().is_empty() {
            session.push_message(ChatMessage::assistant(self.greeting.clone()), now);
        }
        debug!(session_id = %session.id, "Creating chat session");
        self.active_id = session.id.clone();
        self.sessions.push(session);
    }

    fn position(&self, session_id: &str) -> Option<usize> {
        self.sessions
            .iter()
            .position(|session| session.id == session_id)
    }

    fn session_mut(&mut self, session_id: &str) -> Result<&mut ChatSession> {
        self.sessions
            .iter_mut()
            .find(|session| session.id == session_id)
            .ok_or_else(|| SessionError::UnknownSession(session_id.to_string()))
    }

    fn most_recent_id(&self) -> Option<String> {
        self.sessions
            .iter()
            .max_by_key(|session| session.updated_at)
            .map(|session| session.id.clone())
    }

    /// Wall-clock milliseconds, strictly increasing across calls.
    fn tick(&mut self) -> i64 {
        let now = time_utils::now_ms().max(self.last_tick + 1);
        self.last_tick = now;
        now
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            sessions: self.sessions.clone(),
            active_id: self.active_id.clone(),
        }
    }

    /// Save the current state, or restore `checkpoint` when the save fails.
    fn commit(&mut self, checkpoint: Checkpoint) -> Result<()> {
        if let Err(error) = self.backend.save(&self.sessions, Some(&self.active_id)) {
            warn!(%error, "Failed to save sessions, restoring previous state");
            self.sessions = checkpoint.sessions;
            self.active_id = checkpoint.active_id;
            return Err(error.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryBackend, StoreSnapshot};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use streamchat_ai::Role;

    const GREETING: &str = "Hello! How can I help?";

    fn open_store() -> (SessionStore, MemoryBackend) {
        let backend = MemoryBackend::new();
        let store = SessionStore::open(backend.clone(), GREETING).unwrap();
        (store, backend)
    }

    #[test]
    fn test_open_empty_backend_creates_greeted_session() {
        let (store, backend) = open_store();

        let sessions = store.list_sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, store.active_id());
        assert_eq!(sessions[0].messages.len(), 1);
        assert_eq!(sessions[0].messages[0].content, GREETING);
        assert_eq!(sessions[0].display_title(), "New chat");

        assert_eq!(backend.snapshot().sessions.len(), 1);
    }

    #[test]
    fn test_create_and_three_appends() {
        let (mut store, _) = open_store();
        let id = store.create_session().unwrap().id.clone();

        store
            .append_message(&id, ChatMessage::user("What is ownership in Rust?"))
            .unwrap();
        store
            .append_message(&id, ChatMessage::assistant("It is a set of rules."))
            .unwrap();
        store
            .append_message(&id, ChatMessage::user("thanks"))
            .unwrap();

        let sessions = store.list_sessions();
        assert_eq!(sessions[0].id, id);
        assert_eq!(sessions[0].messages.len(), 4);
        assert_eq!(sessions[0].title, "What is ownership in…");
    }

    #[test]
    fn test_list_sessions_orders_by_update() {
        let (mut store, _) = open_store();
        let first = store.active_id().to_string();
        let second = store.create_session().unwrap().id.clone();
        assert_eq!(store.list_sessions()[0].id, second);

        store
            .append_message(&first, ChatMessage::user("bump"))
            .unwrap();
        let order: Vec<&str> = store
            .list_sessions()
            .iter()
            .map(|session| session.id.as_str())
            .collect();
        assert_eq!(order, vec![first.as_str(), second.as_str()]);
    }

    #[test]
    fn test_delete_only_session_leaves_a_fresh_one() {
        let (mut store, backend) = open_store();
        let only = store.active_id().to_string();

        store.delete_session(&only).unwrap();

        let sessions = store.list_sessions();
        assert_eq!(sessions.len(), 1);
        assert_ne!(sessions[0].id, only);
        assert_eq!(store.active_id(), sessions[0].id);
        assert_eq!(sessions[0].messages.len(), 1);
        assert_eq!(backend.snapshot().sessions.len(), 1);
    }

    #[test]
    fn test_delete_active_activates_most_recent() {
        let (mut store, _) = open_store();
        let older = store.active_id().to_string();
        let newer = store.create_session().unwrap().id.clone();
        let active = store.create_session().unwrap().id.clone();

        store.delete_session(&active).unwrap();
        assert_eq!(store.active_id(), newer);

        store.delete_session(&older).unwrap();
        assert_eq!(store.active_id(), newer);
        assert_eq!(store.list_sessions().len(), 1);
    }

    #[test]
    fn test_unknown_session_errors() {
        let (mut store, _) = open_store();
        assert!(matches!(
            store.append_message("missing", ChatMessage::user("hi")),
            Err(SessionError::UnknownSession(id)) if id == "missing"
        ));
        assert!(matches!(
            store.delete_session("missing"),
            Err(SessionError::UnknownSession(_))
        ));
        assert!(matches!(
            store.switch_session("missing"),
            Err(SessionError::UnknownSession(_))
        ));
    }

    #[test]
    fn test_turn_lifecycle() {
        let (mut store, backend) = open_store();
        let id = store.active_id().to_string();

        store.append_message(&id, ChatMessage::user("hi")).unwrap();
        store.begin_turn(&id).unwrap();
        assert!(store.is_turn_in_progress(&id));
        assert!(matches!(
            store.begin_turn(&id),
            Err(SessionError::TurnInProgress(_))
        ));
        assert!(matches!(
            store.append_message(&id, ChatMessage::user("again")),
            Err(SessionError::TurnInProgress(_))
        ));

        store.update_draft(&id, "Hel").unwrap();
        store.update_draft(&id, "Hello").unwrap();
        assert_eq!(store.get(&id).unwrap().draft.as_deref(), Some("Hello"));
        assert_eq!(backend.snapshot().sessions[0].messages.len(), 2);

        store.finish_turn(&id, "Hello").unwrap();
        assert!(!store.is_turn_in_progress(&id));
        let saved = backend.snapshot();
        assert_eq!(saved.sessions[0].messages.len(), 3);
        assert_eq!(saved.sessions[0].messages[2].content, "Hello");

        assert!(matches!(
            store.update_draft(&id, "late"),
            Err(SessionError::NoTurnInProgress(_))
        ));
        assert!(matches!(
            store.finish_turn(&id, "late"),
            Err(SessionError::NoTurnInProgress(_))
        ));
    }

    #[test]
    fn test_abandon_turn_with_status_is_kept_out_of_history() {
        let (mut store, _) = open_store();
        let id = store.active_id().to_string();
        store.append_message(&id, ChatMessage::user("hi")).unwrap();

        store.begin_turn(&id).unwrap();
        store
            .abandon_turn(&id, Some("Error: HTTP 503".to_string()))
            .unwrap();

        let session = store.get(&id).unwrap();
        assert_eq!(session.messages.len(), 3);
        assert!(session.messages[2].is_status);

        let history = store.history(&id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::Assistant);
        assert_eq!(history[1].role, Role::User);
    }

    #[test]
    fn test_reopen_restores_active_session() {
        let (mut store, backend) = open_store();
        let first = store.active_id().to_string();
        store.create_session().unwrap();
        store.switch_session(&first).unwrap();
        store.set_session_model(&first, Some("qwen".to_string())).unwrap();
        drop(store);

        let reopened = SessionStore::open(backend.clone(), GREETING).unwrap();
        assert_eq!(reopened.active_id(), first);
        assert_eq!(reopened.list_sessions().len(), 2);
        assert_eq!(reopened.get(&first).unwrap().model.as_deref(), Some("qwen"));
    }

    #[test]
    fn test_stale_active_id_falls_back_to_most_recent() {
        let mut older = ChatSession::new(100);
        older.updated_at = 100;
        let mut newer = ChatSession::new(200);
        newer.updated_at = 200;
        let backend = MemoryBackend::with_snapshot(StoreSnapshot {
            sessions: vec![older, newer.clone()],
            active_session_id: Some("deleted".to_string()),
        });

        let store = SessionStore::open(backend, GREETING).unwrap();
        assert_eq!(store.active_id(), newer.id);
    }

    /// Memory backend whose saves can be made to fail.
    #[derive(Clone, Default)]
    struct FlakyBackend {
        inner: MemoryBackend,
        failing: Arc<AtomicBool>,
    }

    impl SessionBackend for FlakyBackend {
        fn load(&self) -> anyhow::Result<StoreSnapshot> {
            self.inner.load()
        }

        fn save(
            &self,
            sessions: &[ChatSession],
            active_session_id: Option<&str>,
        ) -> anyhow::Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                anyhow::bail!("disk full");
            }
            self.inner.save(sessions, active_session_id)
        }
    }

    #[test]
    fn test_failed_save_leaves_memory_unchanged() {
        let backend = FlakyBackend::default();
        let mut store = SessionStore::open(backend.clone(), GREETING).unwrap();
        let first = store.active_id().to_string();
        let second = store.create_session().unwrap().id.clone();
        store.append_message(&second, ChatMessage::user("hi")).unwrap();
        let before: Vec<ChatSession> = store.list_sessions().into_iter().cloned().collect();

        backend.failing.store(true, Ordering::SeqCst);

        assert!(matches!(store.create_session(), Err(SessionError::Storage(_))));
        assert!(store.append_message(&second, ChatMessage::user("lost")).is_err());
        assert!(store.delete_session(&second).is_err());
        assert!(store.switch_session(&first).is_err());
        assert!(store.set_session_model(&second, Some("qwen".to_string())).is_err());

        let after: Vec<ChatSession> = store.list_sessions().into_iter().cloned().collect();
        assert_eq!(after, before);
        assert_eq!(store.active_id(), second);

        backend.failing.store(false, Ordering::SeqCst);
        store.append_message(&second, ChatMessage::user("saved")).unwrap();
        let saved = backend.inner.snapshot();
        assert_eq!(saved.sessions.len(), 2);
        assert_eq!(saved.active_session_id.as_deref(), Some(second.as_str()));
    }

    #[test]
    fn test_failed_save_closes_turn_without_reply() {
        let backend = FlakyBackend::default();
        let mut store = SessionStore::open(backend.clone(), GREETING).unwrap();
        let id = store.active_id().to_string();
        store.append_message(&id, ChatMessage::user("hi")).unwrap();
        store.begin_turn(&id).unwrap();
        store.update_draft(&id, "Hello").unwrap();

        backend.failing.store(true, Ordering::SeqCst);
        assert!(store.finish_turn(&id, "Hello").is_err());

        let session = store.get(&id).unwrap();
        assert!(!session.turn_in_progress());
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[1].content, "hi");
    }
}
