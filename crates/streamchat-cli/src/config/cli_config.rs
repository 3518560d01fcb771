//! CLI configuration file support
//!
//! Loads configuration from ~/.config/streamchat/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use streamchat_ai::{ClientConfig, RetryPolicy};
use streamchat_core::ChatSettings;
use tracing::warn;

use crate::cli::Cli;

/// CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Endpoint and HTTP client settings
    #[serde(default)]
    pub api: ClientConfig,
    /// Retry policy for requests that fail before streaming
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Greeting, system prompt and default model
    #[serde(default)]
    pub chat: ChatSettings,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database path
    pub db_path: Option<String>,
}

impl CliConfig {
    /// Load configuration from default path
    pub fn load() -> Self {
        Self::load_from_path(Self::default_path())
    }

    /// Load configuration from a specific path. Missing or malformed files
    /// yield defaults.
    pub fn load_from_path(path: Option<PathBuf>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content).unwrap_or_else(|error| {
                warn!(path = %path.display(), %error, "Ignoring malformed config file");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Get the default configuration file path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("streamchat").join("config.toml"))
    }

    /// Apply command-line flags and `STREAMCHAT_*` variables on top of the file.
    pub fn apply_overrides(&mut self, cli: &Cli) {
        if let Some(url) = &cli.api_url {
            self.api.base_url = url.clone();
        }
        if let Some(model) = &cli.model {
            self.chat.default_model = Some(model.clone());
        }
        if let Some(prompt) = &cli.system_prompt {
            self.chat.system_prompt = Some(prompt.clone());
        }
        if let Some(path) = &cli.db_path {
            self.storage.db_path = Some(path.clone());
        }
    }
}
