//! SQLite key-value backend

use super::{KeyValueStore, StorageBatch, StorageOp};
use crate::error::{ChatError, Result};
use anyhow::Context;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;

/// Durable storage using a single `kv` table in a SQLite file
///
/// A connection is opened per call. Batches run inside one transaction.
pub struct SqliteStore {
    db_path: PathBuf,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `db_path`
    ///
    /// The parent directory is created when missing.
    pub fn open<P: Into<PathBuf>>(db_path: P) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create parent directory for database")
                .map_err(|e| ChatError::Storage(format!("{:#}", e)))?;
        }

        let store = Self { db_path };
        store.init()?;
        Ok(store)
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)
            .context("Failed to open database")
            .map_err(|e| ChatError::Storage(format!("{:#}", e)))?;
        Ok(conn)
    }

    fn init(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to create tables")
        .map_err(|e| ChatError::Storage(format!("{:#}", e)))?;
        Ok(())
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.connect()?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
            .context("Failed to query key")
            .map_err(|e| ChatError::Storage(format!("{:#}", e)))?;
        Ok(value)
    }

    fn apply(&mut self, batch: StorageBatch) -> Result<()> {
        let mut conn = self.connect()?;
        let tx = conn
            .transaction()
            .context("Failed to start transaction")
            .map_err(|e| ChatError::Storage(format!("{:#}", e)))?;

        for op in batch {
            match op {
                StorageOp::Set { key, value } => {
                    tx.execute(
                        "INSERT INTO kv (key, value) VALUES (?, ?)
                         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                        params![key, value],
                    )
                    .context("Failed to write key")
                    .map_err(|e| ChatError::Storage(format!("{:#}", e)))?;
                }
                StorageOp::Remove { key } => {
                    tx.execute("DELETE FROM kv WHERE key = ?", params![key])
                        .context("Failed to delete key")
                        .map_err(|e| ChatError::Storage(format!("{:#}", e)))?;
                }
            }
        }

        tx.commit()
            .context("Failed to commit transaction")
            .map_err(|e| ChatError::Storage(format!("{:#}", e)))?;

        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let conn = self.connect()?;
        let mut stmt = conn
            .prepare("SELECT key FROM kv ORDER BY key ASC")
            .context("Failed to prepare statement")
            .map_err(|e| ChatError::Storage(format!("{:#}", e)))?;

        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .context("Failed to query keys")
            .map_err(|e| ChatError::Storage(format!("{:#}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to read key row")
            .map_err(|e| ChatError::Storage(format!("{:#}", e)))?;

        Ok(keys)
    }
}
