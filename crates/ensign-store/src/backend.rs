// SPDX-FileCopyrightText: 2026 Ensign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key-value backend trait and the in-memory implementation.
//!
//! The secure store is backend-agnostic: anything offering per-key expiry,
//! atomic get/set, and prefix scan qualifies. The in-memory backend expires
//! entries lazily on access and backs tests; production uses SQLite.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use ensign_core::EnsignError;
use ensign_core::types::now_ms;

/// Minimal contract the secure store needs from a persistence backend.
#[async_trait]
pub trait KeyValueBackend: Send + Sync {
    /// Stores `value` under `key`, replacing any previous entry and its TTL.
    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), EnsignError>;

    /// Returns the value for `key`, or None if absent or expired.
    async fn fetch(&self, key: &str) -> Result<Option<String>, EnsignError>;

    /// Removes `key`. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<(), EnsignError>;

    /// Returns all live keys starting with `prefix`.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, EnsignError>;
}

/// In-memory backend with lazy expiry.
#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, StoredEntry>>,
}

struct StoredEntry {
    value: String,
    expires_at_ms: i64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueBackend for MemoryBackend {
    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), EnsignError> {
        let expires_at_ms = now_ms() + ttl.as_millis() as i64;
        self.entries.write().await.insert(
            key.to_string(),
            StoredEntry {
                value,
                expires_at_ms,
            },
        );
        Ok(())
    }

    async fn fetch(&self, key: &str) -> Result<Option<String>, EnsignError> {
        let now = now_ms();
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at_ms > now => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn remove(&self, key: &str) -> Result<(), EnsignError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, EnsignError> {
        let now = now_ms();
        let entries = self.entries.read().await;
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(k, v)| k.starts_with(prefix) && v.expires_at_ms > now)
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}
