//! Builds the chat session from configuration.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use streamchat_ai::HttpChatClient;
use streamchat_core::{
    ModelCatalog, RedbSessionBackend, SessionStore, StreamingChatSession, paths,
};
use streamchat_storage::Storage;

use crate::config::CliConfig;

fn database_path(config: &CliConfig) -> Result<PathBuf> {
    match &config.storage.db_path {
        Some(path) => Ok(PathBuf::from(path)),
        None => paths::ensure_database_path(),
    }
}

/// Open storage, the HTTP client and the session store.
pub fn prepare_chat(config: &CliConfig) -> Result<StreamingChatSession> {
    let db_path = database_path(config)?;
    let storage = Storage::new(&db_path)?;

    let client = HttpChatClient::new(config.api.clone())
        .context("Failed to build HTTP client")?
        .with_retry_policy(config.retry.clone());
    let transport = Arc::new(client);

    let store = SessionStore::open(
        RedbSessionBackend::new(storage.clone()),
        config.chat.greeting.clone(),
    )?;
    let catalog = ModelCatalog::new(transport.clone()).with_storage(storage.preferences.clone());

    tracing::debug!(db = %db_path.display(), api = %config.api.base_url, "Chat prepared");
    Ok(StreamingChatSession::new(store, transport, config.chat.clone()).with_catalog(catalog))
}
