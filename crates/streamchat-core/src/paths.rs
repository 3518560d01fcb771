use anyhow::{Context, Result};
use std::path::PathBuf;

const STREAMCHAT_DIR: &str = ".streamchat";
const DB_FILE: &str = "streamchat.db";
const LOGS_DIR: &str = "logs";

/// Environment variable to override the data directory.
pub const STREAMCHAT_DIR_ENV: &str = "STREAMCHAT_DIR";

/// Resolve the data directory.
/// Priority: STREAMCHAT_DIR env var > ~/.streamchat/
pub fn resolve_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(STREAMCHAT_DIR_ENV)
        && !dir.trim().is_empty()
    {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(STREAMCHAT_DIR))
        .ok_or_else(|| anyhow::anyhow!("Failed to determine home directory"))
}

/// Ensure the data directory exists and return its path.
pub fn ensure_data_dir() -> Result<PathBuf> {
    let dir = resolve_data_dir()?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    Ok(dir)
}

/// Database path: ~/.streamchat/streamchat.db
pub fn database_path() -> Result<PathBuf> {
    Ok(resolve_data_dir()?.join(DB_FILE))
}

/// Database path with its parent directory created.
pub fn ensure_database_path() -> Result<PathBuf> {
    Ok(ensure_data_dir()?.join(DB_FILE))
}

/// Logs directory, created on demand: ~/.streamchat/logs/
pub fn logs_dir() -> Result<PathBuf> {
    let dir = resolve_data_dir()?.join(LOGS_DIR);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    Ok(dir)
}
