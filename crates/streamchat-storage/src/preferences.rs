//! Preference storage - small JSON values such as the active session, the
//! selected model and the cached model list.

use anyhow::{Context, Result};
use redb::Database;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::sync::Arc;

use crate::table::ByteTable;
use crate::time_utils::now_ms;

const PREFERENCES_TABLE: &str = "preferences";

/// A value stored together with the time it was written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stamped<T> {
    pub value: T,
    pub stored_at: i64,
}

impl<T> Stamped<T> {
    /// Age relative to `now` in milliseconds; never negative.
    pub fn age_ms(&self, now: i64) -> i64 {
        now.saturating_sub(self.stored_at).max(0)
    }
}

#[derive(Debug, Clone)]
pub struct PreferenceStorage {
    table: ByteTable,
}

impl PreferenceStorage {
    pub fn new(db: Arc<Database>) -> Result<Self> {
        Ok(Self {
            table: ByteTable::open(db, PREFERENCES_TABLE)?,
        })
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(bytes) = self.table.get(key)? else {
            return Ok(None);
        };
        let value = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to decode preference '{key}'"))?;
        Ok(Some(value))
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.table.put(key, &bytes)
    }

    pub fn remove(&self, key: &str) -> Result<bool> {
        self.table.remove(key)
    }

    /// Read a value written with [`PreferenceStorage::set_stamped`].
    pub fn get_stamped<T: DeserializeOwned>(&self, key: &str) -> Result<Option<Stamped<T>>> {
        self.get(key)
    }

    /// Write a value tagged with the current time.
    pub fn set_stamped<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(&Stamped {
            value,
            stored_at: now_ms(),
        })?;
        self.table.put(key, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn setup() -> (PreferenceStorage, tempfile::TempDir) {
        let temp_dir = tempdir().unwrap();
        let db = Arc::new(Database::create(temp_dir.path().join("test.db")).unwrap());
        (PreferenceStorage::new(db).unwrap(), temp_dir)
    }

    #[test]
    fn test_set_and_get() {
        let (prefs, _dir) = setup();
        prefs.set("selected_model", &"deepseek-chat".to_string()).unwrap();

        let model: Option<String> = prefs.get("selected_model").unwrap();
        assert_eq!(model.as_deref(), Some("deepseek-chat"));

        assert!(prefs.remove("selected_model").unwrap());
        let model: Option<String> = prefs.get("selected_model").unwrap();
        assert!(model.is_none());
    }

    #[test]
    fn test_stamped_value_records_time() {
        let (prefs, _dir) = setup();
        let before = now_ms();
        prefs.set_stamped("models", &vec!["a", "b"]).unwrap();

        let stamped: Stamped<Vec<String>> = prefs.get_stamped("models").unwrap().unwrap();
        assert_eq!(stamped.value, vec!["a".to_string(), "b".to_string()]);
        assert!(stamped.stored_at >= before);
        assert_eq!(stamped.age_ms(stamped.stored_at - 10), 0);
    }

    #[test]
    fn test_decode_failure_is_reported() {
        let (prefs, _dir) = setup();
        prefs.set("count", &"not a number").unwrap();

        let result: Result<Option<u32>> = prefs.get("count");
        assert!(result.is_err());
    }
}
