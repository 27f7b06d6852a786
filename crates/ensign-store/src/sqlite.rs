// SPDX-FileCopyrightText: 2026 Ensign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite key-value backend.
//!
//! A single `kv_entries` table with per-row expiry. All access goes through
//! tokio-rusqlite's background connection thread; expired rows are treated
//! as absent and purged on read.

use std::time::Duration;

use async_trait::async_trait;
use rusqlite::params;
use tokio_rusqlite::Connection;
use tracing::debug;

use ensign_core::EnsignError;
use ensign_core::types::now_ms;

use crate::backend::KeyValueBackend;

/// SQLite-backed key-value store with per-key expiry.
pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    /// Opens (or creates) the database at `path` and ensures the schema.
    pub async fn open(path: &str) -> Result<Self, EnsignError> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory().await
        } else {
            Connection::open(path).await
        }
        .map_err(|e| map_tr_err(e.into()))?;

        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 CREATE TABLE IF NOT EXISTS kv_entries (
                     key TEXT PRIMARY KEY NOT NULL,
                     value TEXT NOT NULL,
                     expires_at_ms INTEGER NOT NULL
                 );
                 CREATE INDEX IF NOT EXISTS idx_kv_expires ON kv_entries(expires_at_ms);",
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        debug!(path, "opened kv store");
        Ok(Self { conn })
    }

    /// Deletes every expired row. Called opportunistically; reads do not
    /// depend on it.
    pub async fn purge_expired(&self) -> Result<usize, EnsignError> {
        let now = now_ms();
        self.conn
            .call(move |conn| {
                let n = conn.execute(
                    "DELETE FROM kv_entries WHERE expires_at_ms <= ?1",
                    params![now],
                )?;
                Ok(n)
            })
            .await
            .map_err(map_tr_err)
    }
}

#[async_trait]
impl KeyValueBackend for SqliteBackend {
    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), EnsignError> {
        let key = key.to_string();
        let expires_at_ms = now_ms() + ttl.as_millis() as i64;
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO kv_entries (key, value, expires_at_ms)
                     VALUES (?1, ?2, ?3)",
                    params![key, value, expires_at_ms],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn fetch(&self, key: &str) -> Result<Option<String>, EnsignError> {
        let key = key.to_string();
        let now = now_ms();
        self.conn
            .call(move |conn| {
                let result = conn.query_row(
                    "SELECT value, expires_at_ms FROM kv_entries WHERE key = ?1",
                    params![key.clone()],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
                );
                match result {
                    Ok((value, expires_at_ms)) if expires_at_ms > now => Ok(Some(value)),
                    Ok(_) => {
                        conn.execute("DELETE FROM kv_entries WHERE key = ?1", params![key])?;
                        Ok(None)
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(map_tr_err)
    }

    async fn remove(&self, key: &str) -> Result<(), EnsignError> {
        let key = key.to_string();
        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM kv_entries WHERE key = ?1", params![key])?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, EnsignError> {
        let prefix = prefix.to_string();
        let now = now_ms();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT key FROM kv_entries
                     WHERE substr(key, 1, length(?1)) = ?1 AND expires_at_ms > ?2
                     ORDER BY key",
                )?;
                let rows = stmt.query_map(params![prefix, now], |row| row.get::<_, String>(0))?;
                let mut keys = Vec::new();
                for row in rows {
                    keys.push(row?);
                }
                Ok(keys)
            })
            .await
            .map_err(map_tr_err)
    }
}

/// Maps tokio-rusqlite errors into the store error variant.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error) -> EnsignError {
    EnsignError::Store {
        source: Box::new(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup() -> (SqliteBackend, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let backend = SqliteBackend::open(path.to_str().unwrap()).await.unwrap();
        (backend, dir)
    }

    #[tokio::test]
    async fn put_fetch_remove_roundtrip() {
        let (backend, _dir) = setup().await;
        backend
            .put("k1", "v1".into(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(backend.fetch("k1").await.unwrap(), Some("v1".into()));

        backend.remove("k1").await.unwrap();
        assert_eq!(backend.fetch("k1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_row_treated_as_absent() {
        let (backend, _dir) = setup().await;
        backend
            .put("k1", "v1".into(), Duration::from_millis(0))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(backend.fetch("k1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn replace_refreshes_ttl() {
        let (backend, _dir) = setup().await;
        backend
            .put("k1", "v1".into(), Duration::from_millis(0))
            .await
            .unwrap();
        backend
            .put("k1", "v2".into(), Duration::from_secs(60))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(backend.fetch("k1").await.unwrap(), Some("v2".into()));
    }

    #[tokio::test]
    async fn scan_prefix_matches_literally_not_like_patterns() {
        let (backend, _dir) = setup().await;
        // Underscores in keys must not behave as wildcards.
        backend
            .put("flow:user_1:c1", "a".into(), Duration::from_secs(60))
            .await
            .unwrap();
        backend
            .put("flow:userX1:c1", "b".into(), Duration::from_secs(60))
            .await
            .unwrap();

        let keys = backend.scan_prefix("flow:user_1:").await.unwrap();
        assert_eq!(keys, vec!["flow:user_1:c1".to_string()]);
    }

    #[tokio::test]
    async fn purge_expired_removes_only_dead_rows() {
        let (backend, _dir) = setup().await;
        backend
            .put("dead", "x".into(), Duration::from_millis(0))
            .await
            .unwrap();
        backend
            .put("live", "y".into(), Duration::from_secs(60))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let purged = backend.purge_expired().await.unwrap();
        assert_eq!(purged, 1);
        assert_eq!(backend.fetch("live").await.unwrap(), Some("y".into()));
    }

    #[tokio::test]
    async fn in_memory_path_works() {
        let backend = SqliteBackend::open(":memory:").await.unwrap();
        backend
            .put("k", "v".into(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(backend.fetch("k").await.unwrap(), Some("v".into()));
    }
}
