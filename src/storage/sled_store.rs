//! `sled` key-value backend

use super::{KeyValueStore, StorageBatch, StorageOp};
use crate::error::{ChatError, Result};
use sled::Db;
use std::path::Path;

/// Durable storage using an embedded `sled` database
///
/// Keys and values are stored as UTF-8 bytes. Batches map onto
/// `sled::Batch`, which sled applies atomically, and each batch is flushed
/// before returning.
pub struct SledStore {
    db: Db,
}

impl SledStore {
    /// Open or create a database at `path`
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Storage` if the database cannot be opened
    ///
    /// # Examples
    ///
    /// ```
    /// use aio_chat::storage::{KeyValueStore, SledStore};
    ///
    /// # fn main() -> aio_chat::error::Result<()> {
    /// let dir = tempfile::tempdir()?;
    /// let mut store = SledStore::open(dir.path().join("conversations.sled"))?;
    /// store.set("chats", "[]")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path)
            .map_err(|e| ChatError::Storage(format!("Failed to open database: {}", e)))?;
        Ok(Self { db })
    }
}

impl KeyValueStore for SledStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .db
            .get(key.as_bytes())
            .map_err(|e| ChatError::Storage(format!("Get failed: {}", e)))?;

        match value {
            Some(bytes) => {
                let text = String::from_utf8(bytes.to_vec()).map_err(|e| {
                    ChatError::Storage(format!("Value for {} is not UTF-8: {}", key, e))
                })?;
                Ok(Some(text))
            }
            None => Ok(None),
        }
    }

    fn apply(&mut self, batch: StorageBatch) -> Result<()> {
        let mut sled_batch = sled::Batch::default();
        for op in batch {
            match op {
                StorageOp::Set { key, value } => sled_batch.insert(key.as_bytes(), value.as_bytes()),
                StorageOp::Remove { key } => sled_batch.remove(key.as_bytes()),
            }
        }

        self.db
            .apply_batch(sled_batch)
            .map_err(|e| ChatError::Storage(format!("Batch failed: {}", e)))?;

        self.db
            .flush()
            .map_err(|e| ChatError::Storage(format!("Flush failed: {}", e)))?;

        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for result in self.db.iter().keys() {
            let key =
                result.map_err(|e| ChatError::Storage(format!("Iteration failed: {}", e)))?;
            keys.push(String::from_utf8_lossy(&key).into_owned());
        }
        Ok(keys)
    }
}
