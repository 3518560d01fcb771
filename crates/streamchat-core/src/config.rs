//! Chat behaviour settings shared by every front end.

use serde::{Deserialize, Serialize};

pub const DEFAULT_GREETING: &str = "Hello! I'm your AI assistant. How can I help you today?";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    /// Assistant message seeded into every new session. Empty disables it.
    pub greeting: String,
    /// Sent with each request when set.
    pub system_prompt: Option<String>,
    /// Used when no model was selected or the models endpoint is unused.
    pub default_model: Option<String>,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            greeting: DEFAULT_GREETING.to_string(),
            system_prompt: None,
            default_model: None,
        }
    }
}
