use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use aio_chat::storage::{SledStore, SqliteStore};

#[allow(dead_code)]
pub fn create_temp_sqlite() -> (SqliteStore, TempDir) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let store = SqliteStore::open(tmp.path().join("conversations.db"))
        .expect("failed to create sqlite store");
    (store, tmp)
}

#[allow(dead_code)]
pub fn reopen_sqlite(tmp: &TempDir) -> SqliteStore {
    SqliteStore::open(tmp.path().join("conversations.db")).expect("failed to reopen sqlite store")
}

#[allow(dead_code)]
pub fn create_temp_sled() -> (SledStore, TempDir) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let store =
        SledStore::open(tmp.path().join("conversations.sled")).expect("failed to open sled store");
    (store, tmp)
}

#[allow(dead_code)]
pub fn reopen_sled(tmp: &TempDir) -> SledStore {
    SledStore::open(tmp.path().join("conversations.sled")).expect("failed to reopen sled store")
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}
