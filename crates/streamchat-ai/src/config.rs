use serde::{Deserialize, Serialize};

/// Where the chat API lives and how requests identify themselves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub chat_path: String,
    pub models_path: String,
    pub stop_path: String,
    /// Value of the `X-Request-Source` header; empty disables it.
    pub request_source: String,
    pub connect_timeout_secs: u64,
    /// Applies to the model list and stop calls, not to streamed replies.
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            chat_path: "/api/chat".to_string(),
            models_path: "/api/models".to_string(),
            stop_path: "/api/stop".to_string(),
            request_source: "streamchat".to_string(),
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
