//! Byte-level access to a single redb table keyed by string.

use anyhow::Result;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::collections::HashSet;
use std::sync::Arc;

type RawDefinition = TableDefinition<'static, &'static str, &'static [u8]>;

/// One string-keyed table holding opaque byte values.
///
/// Typed wrappers (`ChatSessionStorage`, `PreferenceStorage`) own one of these
/// and layer their own serialization on top.
#[derive(Debug, Clone)]
pub struct ByteTable {
    db: Arc<Database>,
    name: &'static str,
}

impl ByteTable {
    /// Bind to `name`, creating the table if the database does not have it yet.
    pub fn open(db: Arc<Database>, name: &'static str) -> Result<Self> {
        let table = Self { db, name };
        let write_txn = table.db.begin_write()?;
        write_txn.open_table(table.definition())?;
        write_txn.commit()?;

        Ok(table)
    }

    fn definition(&self) -> RawDefinition {
        TableDefinition::new(self.name)
    }

    pub fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(self.definition())?;
            table.insert(key, data)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(self.definition())?;
        Ok(table.get(key)?.map(|value| value.value().to_vec()))
    }

    /// All entries in key order.
    pub fn entries(&self) -> Result<Vec<(String, Vec<u8>)>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(self.definition())?;

        let mut items = Vec::new();
        for item in table.iter()? {
            let (key, value) = item?;
            items.push((key.value().to_string(), value.value().to_vec()));
        }
        Ok(items)
    }

    /// Remove `key`; returns whether it existed.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut table = write_txn.open_table(self.definition())?;
            table.remove(key)?.is_some()
        };
        write_txn.commit()?;
        Ok(existed)
    }

    /// Make the table contain exactly `entries`, in one write transaction.
    ///
    /// Keys not present in `entries` are removed. Returns the number of
    /// removed keys.
    pub fn replace_all(&self, entries: &[(String, Vec<u8>)]) -> Result<usize> {
        let keep: HashSet<&str> = entries.iter().map(|(key, _)| key.as_str()).collect();

        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(self.definition())?;

            let mut stale = Vec::new();
            for item in table.iter()? {
                let (key, _) = item?;
                if !keep.contains(key.value()) {
                    stale.push(key.value().to_string());
                }
            }
            for key in &stale {
                table.remove(key.as_str())?;
            }
            for (key, data) in entries {
                table.insert(key.as_str(), data.as_slice())?;
            }
            stale.len()
        };
        write_txn.commit()?;
        Ok(removed)
    }
}
