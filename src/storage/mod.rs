//! Durable key-value storage for conversations and message logs
//!
//! The conversation store mirrors its state into a flat string-keyed store:
//! one key holding the conversation list and one key per message log. This
//! module defines that contract ([`KeyValueStore`]) and its backends:
//!
//! - [`MemoryStore`]: ephemeral, used by tests and `backend: memory`
//! - [`SledStore`]: embedded `sled` database (default)
//! - [`SqliteStore`]: single-table SQLite database
//!
//! Every write goes through a [`StorageBatch`] so that a multi-key mutation
//! either lands completely or not at all.

use crate::config::{StorageBackend, StorageConfig};
use crate::error::{ChatError, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

pub mod memory;
pub mod sled_store;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sled_store::SledStore;
pub use sqlite::SqliteStore;

/// Key holding the JSON array of conversation records
pub const CONVERSATIONS_KEY: &str = "chats";

/// Prefix of the per-conversation message log keys
pub const MESSAGES_KEY_PREFIX: &str = "chat-messages-";

/// Build the storage key of a conversation's message log
///
/// # Examples
///
/// ```
/// use aio_chat::storage::messages_key;
///
/// assert_eq!(messages_key("01HZX"), "chat-messages-01HZX");
/// ```
pub fn messages_key(conversation_id: &str) -> String {
    format!("{}{}", MESSAGES_KEY_PREFIX, conversation_id)
}

/// A single write operation inside a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOp {
    /// Insert or overwrite a key
    Set {
        /// Key to write
        key: String,
        /// Serialized value
        value: String,
    },
    /// Remove a key (no-op when absent)
    Remove {
        /// Key to remove
        key: String,
    },
}

/// Ordered group of writes applied atomically by a backend
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageBatch {
    ops: Vec<StorageOp>,
}

impl StorageBatch {
    /// Create an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a write of `value` under `key`
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.ops.push(StorageOp::Set {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Queue the removal of `key`
    pub fn remove(mut self, key: impl Into<String>) -> Self {
        self.ops.push(StorageOp::Remove { key: key.into() });
        self
    }

    /// Operations in application order
    pub fn ops(&self) -> &[StorageOp] {
        &self.ops
    }

    /// Whether the batch contains no operations
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

impl IntoIterator for StorageBatch {
    type Item = StorageOp;
    type IntoIter = std::vec::IntoIter<StorageOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}

/// String-keyed durable storage
///
/// Backends must apply a [`StorageBatch`] atomically: after an error, no
/// operation of the batch may be visible.
pub trait KeyValueStore: Send {
    /// Read the value stored under `key`
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Apply all operations of `batch` atomically
    fn apply(&mut self, batch: StorageBatch) -> Result<()>;

    /// List all keys currently stored, in ascending order
    fn keys(&self) -> Result<Vec<String>>;

    /// Write a single key
    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.apply(StorageBatch::new().set(key, value))
    }

    /// Remove a single key
    fn remove(&mut self, key: &str) -> Result<()> {
        self.apply(StorageBatch::new().remove(key))
    }

    /// Whether `key` currently holds a value
    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn apply(&mut self, batch: StorageBatch) -> Result<()> {
        (**self).apply(batch)
    }

    fn keys(&self) -> Result<Vec<String>> {
        (**self).keys()
    }
}

/// Resolve the directory holding the on-disk databases
///
/// Precedence: `AIO_CHAT_DATA_DIR` (already folded into the config by
/// [`crate::config::Config::load`]), then `storage.data_dir`, then the
/// platform data directory.
pub fn resolve_data_dir(config: &StorageConfig) -> Result<PathBuf> {
    if let Some(dir) = &config.data_dir {
        return Ok(dir.clone());
    }

    let proj_dirs = ProjectDirs::from("com", "aio", "aio-chat")
        .ok_or_else(|| ChatError::Storage("Could not determine data directory".into()))?;
    Ok(proj_dirs.data_dir().to_path_buf())
}

/// Open the backend selected by the storage configuration
pub fn open_storage(config: &StorageConfig) -> Result<Box<dyn KeyValueStore>> {
    match config.backend {
        StorageBackend::Memory => {
            tracing::debug!("Using in-memory storage; conversations will not persist");
            Ok(Box::new(MemoryStore::new()))
        }
        StorageBackend::Sled => {
            let path = resolve_data_dir(config)?.join("conversations.sled");
            tracing::debug!("Opening sled storage at {}", path.display());
            Ok(Box::new(SledStore::open(path)?))
        }
        StorageBackend::Sqlite => {
            let path = resolve_data_dir(config)?.join("conversations.db");
            tracing::debug!("Opening sqlite storage at {}", path.display());
            Ok(Box::new(SqliteStore::open(path)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_key_format() {
        assert_eq!(messages_key("abc"), "chat-messages-abc");
        assert!(messages_key("abc").starts_with(MESSAGES_KEY_PREFIX));
    }

    #[test]
    fn test_batch_preserves_order() {
        let batch = StorageBatch::new().set("a", "1").remove("b").set("c", "3");
        assert_eq!(batch.ops().len(), 3);
        assert_eq!(
            batch.ops()[1],
            StorageOp::Remove {
                key: "b".to_string()
            }
        );
        assert!(!batch.is_empty());
        assert!(StorageBatch::new().is_empty());
    }

    #[test]
    fn test_resolve_data_dir_prefers_configured_dir() {
        let config = StorageConfig {
            backend: StorageBackend::Sled,
            data_dir: Some(PathBuf::from("/tmp/aio-chat-test")),
        };
        assert_eq!(
            resolve_data_dir(&config).unwrap(),
            PathBuf::from("/tmp/aio-chat-test")
        );
    }

    #[test]
    fn test_open_storage_memory_backend() {
        let config = StorageConfig {
            backend: StorageBackend::Memory,
            data_dir: None,
        };
        let mut store = open_storage(&config).expect("open memory storage");
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_open_storage_sqlite_backend_in_temp_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = StorageConfig {
            backend: StorageBackend::Sqlite,
            data_dir: Some(dir.path().to_path_buf()),
        };
        let mut store = open_storage(&config).expect("open sqlite storage");
        store.set("k", "v").unwrap();
        assert!(dir.path().join("conversations.db").exists());
    }
}
