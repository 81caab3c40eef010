// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Process-local storage adapter.

use std::collections::HashMap;
use std::io;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::StoreAdapter;

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StoreAdapter for MemoryStore {
    fn platform(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> io::Result<()> {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> io::Result<()> {
        self.values.write().await.remove(key);
        Ok(())
    }
}
