//! Chat session models for conversation persistence.

use serde::{Deserialize, Serialize};
use streamchat_ai::{HistoryMessage, Role};

/// Maximum number of characters of the first user message used as a title.
pub const TITLE_MAX_CHARS: usize = 20;
const TITLE_ELLIPSIS: char = '…';

/// Role of a chat message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// Single chat message in a session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub timestamp: i64,
    /// One-line notices (failed requests) shown in the transcript but never
    /// sent back to the API as history.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_status: bool,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }

    /// Assistant-side status line; newlines are flattened.
    pub fn status(content: impl AsRef<str>) -> Self {
        let line = content
            .as_ref()
            .lines()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            is_status: true,
            ..Self::new(ChatRole::Assistant, line)
        }
    }

    fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            is_status: false,
        }
    }

    pub fn to_history(&self) -> HistoryMessage {
        let role = match self.role {
            ChatRole::User => Role::User,
            ChatRole::Assistant => Role::Assistant,
        };
        HistoryMessage {
            role,
            content: self.content.clone(),
        }
    }
}

/// Chat session representing a persisted conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatSession {
    pub id: String,
    /// Empty until derived from the first user message.
    #[serde(default)]
    pub title: String,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    /// Model used for the most recent request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// The assistant reply being streamed; never persisted.
    #[serde(skip)]
    pub draft: Option<String>,
}

impl ChatSession {
    pub fn new(now: i64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: String::new(),
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
            model: None,
            draft: None,
        }
    }

    pub fn is_untitled(&self) -> bool {
        self.title.trim().is_empty()
    }

    /// Title for display, with a placeholder while untitled.
    pub fn display_title(&self) -> &str {
        if self.is_untitled() {
            "New chat"
        } else {
            &self.title
        }
    }

    pub fn turn_in_progress(&self) -> bool {
        self.draft.is_some()
    }

    /// Frozen, non-status messages in API history form.
    pub fn history(&self) -> Vec<HistoryMessage> {
        self.messages
            .iter()
            .filter(|message| !message.is_status)
            .map(ChatMessage::to_history)
            .collect()
    }

    /// Append a frozen message, deriving the title from the first user message.
    pub(crate) fn push_message(&mut self, message: ChatMessage, now: i64) {
        if self.is_untitled() && message.role == ChatRole::User {
            self.title = derive_title(&message.content);
        }
        self.messages.push(message);
        self.updated_at = now;
    }
}

/// First [`TITLE_MAX_CHARS`] characters of `content` on one line, followed
/// by an ellipsis when it was longer.
pub fn derive_title(content: &str) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= TITLE_MAX_CHARS {
        return flat;
    }
    let mut title: String = flat.chars().take(TITLE_MAX_CHARS).collect();
    title.push(TITLE_ELLIPSIS);
    title
}

/// Lightweight view used for listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSessionSummary {
    pub id: String,
    pub title: String,
    pub message_count: usize,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<&ChatSession> for ChatSessionSummary {
    fn from(session: &ChatSession) -> Self {
        Self {
            id: session.id.clone(),
            title: session.display_title().to_string(),
            message_count: session.messages.len(),
            created_at: session.created_at,
            updated_at: session.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_title_truncates_with_ellipsis() {
        assert_eq!(derive_title("hello"), "hello");
        assert_eq!(derive_title("exactly twenty chars"), "exactly twenty chars");
        assert_eq!(
            derive_title("Please explain borrow checking"),
            "Please explain borro…"
        );
        assert_eq!(derive_title("  multi\nline   input "), "multi line input");
        assert_eq!(
            derive_title("你好你好你好你好你好你好你好你好你好你好你好"),
            "你好你好你好你好你好你好你好你好你好你好…"
        );
    }

    #[test]
    fn test_first_user_message_sets_title_once() {
        let mut session = ChatSession::new(1);
        session.push_message(ChatMessage::assistant("Welcome"), 2);
        assert!(session.is_untitled());

        session.push_message(ChatMessage::user("first question"), 3);
        session.push_message(ChatMessage::user("second question"), 4);
        assert_eq!(session.title, "first question");
        assert_eq!(session.updated_at, 4);
    }

    #[test]
    fn test_history_skips_status_messages() {
        let mut session = ChatSession::new(1);
        session.push_message(ChatMessage::user("hi"), 2);
        session.push_message(ChatMessage::status("Network error:\n connection refused"), 3);
        session.push_message(ChatMessage::assistant("hello"), 4);

        let history = session.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], HistoryMessage::user("hi"));
        assert_eq!(history[1], HistoryMessage::assistant("hello"));
        assert_eq!(
            session.messages[1].content,
            "Network error: connection refused"
        );
    }

    #[test]
    fn test_draft_is_not_serialized() {
        let mut session = ChatSession::new(1);
        session.draft = Some("partial".to_string());
        let json = serde_json::to_string(&session).unwrap();
        assert!(!json.contains("partial"));

        let restored: ChatSession = serde_json::from_str(&json).unwrap();
        assert!(!restored.turn_in_progress());
    }
}
