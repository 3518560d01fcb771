//! Domain models persisted by the session store.

pub mod chat_session;

pub use chat_session::{
    ChatMessage, ChatRole, ChatSession, ChatSessionSummary, TITLE_MAX_CHARS, derive_title,
};
