use anyhow::{Result, bail};
use chrono::{DateTime, Local, TimeZone};
use streamchat_core::SessionStore;

pub fn format_timestamp(timestamp: Option<i64>) -> String {
    let Some(ts) = timestamp else {
        return "-".to_string();
    };

    let datetime: DateTime<Local> = match Local.timestamp_millis_opt(ts).single() {
        Some(dt) => dt,
        None => return "-".to_string(),
    };

    datetime.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}

/// Full session id from an id or a unique prefix of one.
pub fn resolve_session_id(store: &SessionStore, id: &str) -> Result<String> {
    let id = id.trim();
    if let Some(session) = store.get(id) {
        return Ok(session.id.clone());
    }
    if id.is_empty() {
        bail!("Session not found: {id}");
    }

    let mut matches = store
        .list_sessions()
        .into_iter()
        .filter(|session| session.id.starts_with(id))
        .collect::<Vec<_>>();

    match matches.len() {
        0 => bail!("Session not found: {id}"),
        1 => Ok(matches.remove(0).id.clone()),
        _ => bail!("Session id is ambiguous: {id}"),
    }
}
