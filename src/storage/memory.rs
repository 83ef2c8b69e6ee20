//! In-memory key-value backend

use super::{KeyValueStore, StorageBatch, StorageOp};
use crate::error::{ChatError, Result};
use std::collections::BTreeMap;

/// Ephemeral storage backed by a `BTreeMap`
///
/// Batches are applied to a copy of the map and swapped in on success, so a
/// failed batch leaves the previous contents untouched. Write failures can
/// be injected with [`MemoryStore::fail_writes`] to exercise error paths.
///
/// # Examples
///
/// ```
/// use aio_chat::storage::{KeyValueStore, MemoryStore};
///
/// let mut store = MemoryStore::new();
/// store.set("chats", "[]").unwrap();
/// assert_eq!(store.get("chats").unwrap().as_deref(), Some("[]"));
/// ```
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
    fail_writes: bool,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `entries`
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            fail_writes: false,
        }
    }

    /// Make every subsequent `apply` fail (or succeed again)
    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no keys
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn apply(&mut self, batch: StorageBatch) -> Result<()> {
        if self.fail_writes {
            return Err(ChatError::Storage("write rejected by memory store".to_string()).into());
        }

        let mut next = self.entries.clone();
        for op in batch {
            match op {
                StorageOp::Set { key, value } => {
                    next.insert(key, value);
                }
                StorageOp::Remove { key } => {
                    next.remove(&key);
                }
            }
        }
        self.entries = next;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.keys().cloned().collect())
    }
}
