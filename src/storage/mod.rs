// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage
//!
//! The SDK persists a handful of small string values through a host-provided
//! key-value collaborator ([`StoreAdapter`]). [`Store`] wraps the adapter with
//! the typed keys the core uses and tags every failure with the adapter's
//! platform and the key involved.
//!
//! ## Keys
//!
//! | Key | Value |
//! |-----|-------|
//! | `multichain-transport` | Last successfully used transport kind |
//! | `cache_wallet_getSession` | Serialized JSON-RPC response of the latest session call |
//! | `anonId` | Anonymous analytics id (uuid v4, created lazily) |
//! | `DEBUG` | Debug namespace filter |
//! | `extensionId` | Browser extension id, when one was detected |
//! | `mwp-session` | Relay session record (id, channel, keys, expiry) |
//!
//! ## Adapters
//!
//! - [`MemoryStore`]: process-local map, used by tests and ephemeral hosts
//! - [`FileStore`]: single JSON document on disk, written atomically

pub mod file;
pub mod memory;

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use crate::error::StorageError;
use crate::transport::TransportKind;

pub use file::FileStore;
pub use memory::MemoryStore;

pub const TRANSPORT_KEY: &str = "multichain-transport";
pub const SESSION_CACHE_KEY: &str = "cache_wallet_getSession";
pub const ANON_ID_KEY: &str = "anonId";
pub const DEBUG_KEY: &str = "DEBUG";
pub const EXTENSION_ID_KEY: &str = "extensionId";
pub const RELAY_SESSION_KEY: &str = "mwp-session";

/// Minimal async key-value contract implemented per host platform.
#[async_trait]
pub trait StoreAdapter: Send + Sync {
    /// Short platform label used in error messages (`memory`, `file`, ...).
    fn platform(&self) -> &'static str;

    async fn get(&self, key: &str) -> io::Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> io::Result<()>;

    async fn delete(&self, key: &str) -> io::Result<()>;
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Typed access to the SDK's persisted values.
#[derive(Clone)]
pub struct Store {
    adapter: Arc<dyn StoreAdapter>,
}

impl Store {
    pub fn new(adapter: Arc<dyn StoreAdapter>) -> Self {
        Self { adapter }
    }

    /// In-memory store, handy for tests and short-lived hosts.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn platform(&self) -> &'static str {
        self.adapter.platform()
    }

    /// Read a raw value.
    pub async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.adapter.get(key).await.map_err(|e| StorageError::Get {
            platform: self.platform().to_string(),
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    /// Write a raw value.
    pub async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.adapter
            .set(key, value)
            .await
            .map_err(|e| StorageError::Set {
                platform: self.platform().to_string(),
                key: key.to_string(),
                message: e.to_string(),
            })
    }

    /// Remove a value. Removing a missing key is not an error.
    pub async fn delete(&self, key: &str) -> StorageResult<()> {
        self.adapter.delete(key).await.map_err(|e| StorageError::Delete {
            platform: self.platform().to_string(),
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    /// Read and deserialize a JSON value. A value that no longer parses is
    /// reported as a read failure.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        let Some(raw) = self.get(key).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StorageError::Get {
                platform: self.platform().to_string(),
                key: key.to_string(),
                message: e.to_string(),
            })
    }

    /// Serialize and write a JSON value.
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T) -> StorageResult<()> {
        let raw = serde_json::to_string(value).map_err(|e| StorageError::Set {
            platform: self.platform().to_string(),
            key: key.to_string(),
            message: e.to_string(),
        })?;
        self.set(key, &raw).await
    }

    // =========================================================================
    // Transport tag
    // =========================================================================

    /// Last successfully used transport kind. Unknown tags read as `None`.
    pub async fn get_transport(&self) -> StorageResult<Option<TransportKind>> {
        Ok(self
            .get(TRANSPORT_KEY)
            .await?
            .and_then(|tag| TransportKind::from_tag(&tag)))
    }

    pub async fn set_transport(&self, kind: TransportKind) -> StorageResult<()> {
        self.set(TRANSPORT_KEY, kind.as_tag()).await
    }

    pub async fn remove_transport(&self) -> StorageResult<()> {
        self.delete(TRANSPORT_KEY).await
    }

    // =========================================================================
    // Session cache
    // =========================================================================

    pub async fn get_cached_session(&self) -> StorageResult<Option<String>> {
        self.get(SESSION_CACHE_KEY).await
    }

    pub async fn set_cached_session(&self, response: &str) -> StorageResult<()> {
        self.set(SESSION_CACHE_KEY, response).await
    }

    pub async fn remove_cached_session(&self) -> StorageResult<()> {
        self.delete(SESSION_CACHE_KEY).await
    }

    // =========================================================================
    // Misc
    // =========================================================================

    /// Anonymous analytics id, generated and persisted on first use.
    pub async fn get_anon_id(&self) -> StorageResult<String> {
        if let Some(id) = self.get(ANON_ID_KEY).await? {
            return Ok(id);
        }
        let id = Uuid::new_v4().to_string();
        self.set(ANON_ID_KEY, &id).await?;
        Ok(id)
    }

    pub async fn get_debug(&self) -> StorageResult<Option<String>> {
        self.get(DEBUG_KEY).await
    }

    pub async fn set_debug(&self, namespaces: &str) -> StorageResult<()> {
        self.set(DEBUG_KEY, namespaces).await
    }

    pub async fn get_extension_id(&self) -> StorageResult<Option<String>> {
        self.get(EXTENSION_ID_KEY).await
    }

    pub async fn set_extension_id(&self, id: &str) -> StorageResult<()> {
        self.set(EXTENSION_ID_KEY, id).await
    }

    pub async fn remove_extension_id(&self) -> StorageResult<()> {
        self.delete(EXTENSION_ID_KEY).await
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("platform", &self.platform())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenStore;

    #[async_trait]
    impl StoreAdapter for BrokenStore {
        fn platform(&self) -> &'static str {
            "broken"
        }

        async fn get(&self, _key: &str) -> io::Result<Option<String>> {
            Err(io::Error::other("disk on fire"))
        }

        async fn set(&self, _key: &str, _value: &str) -> io::Result<()> {
            Err(io::Error::other("disk on fire"))
        }

        async fn delete(&self, _key: &str) -> io::Result<()> {
            Err(io::Error::other("disk on fire"))
        }
    }

    #[tokio::test]
    async fn transport_tag_round_trip() {
        let store = Store::in_memory();
        assert_eq!(store.get_transport().await.unwrap(), None);

        store.set_transport(TransportKind::Relay).await.unwrap();
        assert_eq!(
            store.get_transport().await.unwrap(),
            Some(TransportKind::Relay)
        );
        assert_eq!(store.get(TRANSPORT_KEY).await.unwrap().as_deref(), Some("mwp"));

        store.remove_transport().await.unwrap();
        assert_eq!(store.get_transport().await.unwrap(), None);
    }

    #[tokio::test]
    async fn unknown_transport_tag_reads_as_none() {
        let store = Store::in_memory();
        store.set(TRANSPORT_KEY, "carrier-pigeon").await.unwrap();
        assert_eq!(store.get_transport().await.unwrap(), None);
    }

    #[tokio::test]
    async fn anon_id_is_created_once() {
        let store = Store::in_memory();
        let first = store.get_anon_id().await.unwrap();
        let second = store.get_anon_id().await.unwrap();
        assert_eq!(first, second);
        assert!(Uuid::parse_str(&first).is_ok());
    }

    #[tokio::test]
    async fn failures_carry_platform_and_key() {
        let store = Store::new(Arc::new(BrokenStore));

        let err = store.get_transport().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "[broken] failed to read `multichain-transport`: disk on fire"
        );

        let err = store.remove_cached_session().await.unwrap_err();
        assert!(matches!(err, StorageError::Delete { ref key, .. } if key == SESSION_CACHE_KEY));
    }

    #[tokio::test]
    async fn json_values_round_trip() {
        let store = Store::in_memory();
        store
            .set_json("thing", &serde_json::json!({ "a": 1 }))
            .await
            .unwrap();
        let value: Option<serde_json::Value> = store.get_json("thing").await.unwrap();
        assert_eq!(value, Some(serde_json::json!({ "a": 1 })));

        store.set("broken", "{not json").await.unwrap();
        assert!(store.get_json::<serde_json::Value>("broken").await.is_err());
    }
}
