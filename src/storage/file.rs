// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Filesystem-backed storage adapter for server and CLI hosts.
//!
//! All keys live in one JSON object at the configured path. Every write
//! replaces the document through a temp file and a rename, so a crash never
//! leaves a half-written store behind.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;

use super::StoreAdapter;

/// Default file name inside the data directory.
pub const STORE_FILE_NAME: &str = "multichain-connect.json";

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles.
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Store at `<data_dir>/multichain-connect.json`.
    pub fn in_dir(data_dir: impl AsRef<Path>) -> Self {
        Self::new(data_dir.as_ref().join(STORE_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> io::Result<BTreeMap<String, String>> {
        match fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e),
        }
    }

    async fn persist(&self, values: &BTreeMap<String, String>) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let bytes = serde_json::to_vec_pretty(values)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, bytes).await?;
        fs::rename(&temp_path, &self.path).await
    }
}

#[async_trait]
impl StoreAdapter for FileStore {
    fn platform(&self) -> &'static str {
        "file"
    }

    async fn get(&self, key: &str) -> io::Result<Option<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> io::Result<()> {
        let _guard = self.lock.lock().await;
        let mut values = self.load().await?;
        values.insert(key.to_string(), value.to_string());
        self.persist(&values).await
    }

    async fn delete(&self, key: &str) -> io::Result<()> {
        let _guard = self.lock.lock().await;
        let mut values = self.load().await?;
        if values.remove(key).is_some() {
            self.persist(&values).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::in_dir(dir.path());

        store.set("multichain-transport", "mwp").await.unwrap();
        store.set("anonId", "abc").await.unwrap();
        drop(store);

        let reopened = FileStore::in_dir(dir.path());
        assert_eq!(
            reopened.get("multichain-transport").await.unwrap().as_deref(),
            Some("mwp")
        );
        assert_eq!(reopened.get("anonId").await.unwrap().as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("nested/store.json"));

        assert_eq!(store.get("anything").await.unwrap(), None);
        store.delete("anything").await.unwrap();
        assert!(!store.path().exists());

        store.set("k", "v").await.unwrap();
        assert!(store.path().exists());
        assert!(!store.path().with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn delete_removes_only_that_key() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::in_dir(dir.path());
        store.set("a", "1").await.unwrap();
        store.set("b", "2").await.unwrap();

        store.delete("a").await.unwrap();

        assert_eq!(store.get("a").await.unwrap(), None);
        assert_eq!(store.get("b").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::in_dir(dir.path());
        std::fs::write(store.path(), b"{not json").unwrap();

        let err = store.get("a").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
