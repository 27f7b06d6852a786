// SPDX-FileCopyrightText: 2026 Ensign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tamper-evident, TTL'd key-value persistence for the Ensign agent.
//!
//! [`SecureStateStore`] wraps any [`KeyValueBackend`] and enforces the
//! envelope contract on every read: recompute the keyed MAC over the embedded
//! data and timestamp, reject unknown versions, reject future timestamps, and
//! reject entries older than the configured maximum even when the backend TTL
//! has not fired. Any violation fails closed -- the entry is discarded and
//! reported as absent, with a security incident logged.
//!
//! When no signing secret is configured the store runs in insecure mode:
//! verification is skipped, a loud warning is raised at construction, and
//! every read is marked unverified so callers can tell a skipped check from a
//! passed one.

pub mod backend;
pub mod envelope;
pub mod sqlite;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use ensign_core::EnsignError;
use ensign_core::types::now_ms;

pub use backend::{KeyValueBackend, MemoryBackend};
pub use envelope::{ENVELOPE_VERSION, Envelope};
pub use sqlite::SqliteBackend;

/// Allowance for clock skew before a timestamp counts as "from the future".
const FUTURE_SKEW_MS: i64 = 5_000;

/// A value read back from the store, with its verification provenance.
///
/// `verified` is true only when a keyed MAC check actually passed. In
/// insecure mode it is false even for well-formed entries.
#[derive(Debug, Clone)]
pub struct SecureRead<T> {
    pub value: T,
    pub verified: bool,
}

/// Tamper-evident store over a pluggable key-value backend.
pub struct SecureStateStore {
    backend: Arc<dyn KeyValueBackend>,
    secret: Option<Vec<u8>>,
    max_entry_age: Duration,
}

impl SecureStateStore {
    /// Creates a store. `secret: None` enables insecure mode with a loud
    /// warning; callers that care must check [`SecureRead::verified`].
    pub fn new(
        backend: Arc<dyn KeyValueBackend>,
        secret: Option<String>,
        max_entry_age: Duration,
    ) -> Self {
        if secret.is_none() {
            warn!(
                "state store running WITHOUT a signing secret; stored state is \
                 not tamper-evident and reads will be marked unverified"
            );
        }
        Self {
            backend,
            secret: secret.map(String::into_bytes),
            max_entry_age,
        }
    }

    /// True when reads are MAC-verified.
    pub fn is_signing_enabled(&self) -> bool {
        self.secret.is_some()
    }

    /// Serializes, envelopes, signs, and stores `value` under `key`.
    pub async fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), EnsignError> {
        let data = serde_json::to_value(value).map_err(|e| EnsignError::Store {
            source: Box::new(e),
        })?;
        let timestamp = now_ms();
        let signature = match &self.secret {
            Some(secret) => Some(envelope::sign(
                secret,
                &envelope::canonical_payload(&data),
                timestamp,
            )?),
            None => None,
        };

        let env = Envelope {
            version: ENVELOPE_VERSION,
            timestamp,
            data,
            signature,
        };
        let serialized = serde_json::to_string(&env).map_err(|e| EnsignError::Store {
            source: Box::new(e),
        })?;
        self.backend.put(key, serialized, ttl).await
    }

    /// Loads and verifies the entry under `key`.
    ///
    /// Returns `Ok(None)` when the key is absent, expired, or fails any
    /// integrity check (the failing entry is deleted).
    pub async fn get<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<SecureRead<T>>, EnsignError> {
        let Some(raw) = self.backend.fetch(key).await? else {
            return Ok(None);
        };

        let env: Envelope = match serde_json::from_str(&raw) {
            Ok(env) => env,
            Err(e) => {
                self.discard(key, &format!("undecodable envelope: {e}")).await;
                return Ok(None);
            }
        };

        if env.version != ENVELOPE_VERSION {
            self.discard(key, &format!("unknown envelope version {}", env.version))
                .await;
            return Ok(None);
        }

        let now = now_ms();
        if env.timestamp > now + FUTURE_SKEW_MS {
            self.discard(key, "future timestamp").await;
            return Ok(None);
        }
        if now - env.timestamp > self.max_entry_age.as_millis() as i64 {
            self.discard(key, "entry older than maximum age").await;
            return Ok(None);
        }

        let verified = match &self.secret {
            Some(secret) => {
                let payload = envelope::canonical_payload(&env.data);
                let ok = env
                    .signature
                    .as_deref()
                    .is_some_and(|sig| envelope::verify(secret, &payload, env.timestamp, sig));
                if !ok {
                    self.discard(key, "signature mismatch").await;
                    return Ok(None);
                }
                true
            }
            None => false,
        };

        match serde_json::from_value(env.data) {
            Ok(value) => Ok(Some(SecureRead { value, verified })),
            Err(e) => {
                self.discard(key, &format!("payload shape mismatch: {e}")).await;
                Ok(None)
            }
        }
    }

    /// Removes the entry under `key`.
    pub async fn delete(&self, key: &str) -> Result<(), EnsignError> {
        self.backend.remove(key).await
    }

    /// Lists live keys under a prefix. Values are not verified by a scan.
    pub async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, EnsignError> {
        self.backend.scan_prefix(prefix).await
    }

    /// Fail closed: log the incident, count it, drop the entry.
    async fn discard(&self, key: &str, reason: &str) {
        warn!(key, reason, "state integrity check failed; discarding entry");
        metrics::counter!("ensign_store_integrity_failures").increment(1);
        if let Err(e) = self.backend.remove(key).await {
            debug!(key, error = %e, "failed to remove rejected entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers_core::types::U256;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Payload {
        name: String,
        amount: U256,
    }

    fn store_with_secret() -> (SecureStateStore, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        let store = SecureStateStore::new(
            backend.clone(),
            Some("unit-test-secret".into()),
            Duration::from_secs(1800),
        );
        (store, backend)
    }

    #[tokio::test]
    async fn set_get_roundtrip_verified() {
        let (store, _) = store_with_secret();
        let payload = Payload {
            name: "alice.eth".into(),
            amount: U256::from(1_000_000_000_000_000_000u64),
        };
        store
            .set("k", &payload, Duration::from_secs(60))
            .await
            .unwrap();

        let read: SecureRead<Payload> = store.get("k").await.unwrap().unwrap();
        assert!(read.verified);
        assert_eq!(read.value, payload);
    }

    #[tokio::test]
    async fn u256_max_round_trips_exactly() {
        let (store, _) = store_with_secret();
        let payload = Payload {
            name: "max".into(),
            amount: U256::MAX,
        };
        store
            .set("k", &payload, Duration::from_secs(60))
            .await
            .unwrap();

        let read: SecureRead<Payload> = store.get("k").await.unwrap().unwrap();
        assert_eq!(read.value.amount, U256::MAX);
    }

    #[tokio::test]
    async fn tampered_data_fails_closed_and_deletes() {
        let (store, backend) = store_with_secret();
        let payload = Payload {
            name: "alice.eth".into(),
            amount: U256::from(100u8),
        };
        store
            .set("k", &payload, Duration::from_secs(60))
            .await
            .unwrap();

        // Flip the stored amount without re-signing.
        let raw = backend.fetch("k").await.unwrap().unwrap();
        let tampered = raw.replace("alice.eth", "mallory.eth");
        assert_ne!(raw, tampered);
        backend
            .put("k", tampered, Duration::from_secs(60))
            .await
            .unwrap();

        let read: Option<SecureRead<Payload>> = store.get("k").await.unwrap();
        assert!(read.is_none());
        // Entry discarded, not merely skipped.
        assert_eq!(backend.fetch("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn future_timestamp_fails_closed() {
        let (store, backend) = store_with_secret();
        let data = serde_json::json!({"name": "x", "amount": "0x1"});
        let future_ts = now_ms() + 60_000;
        let sig = envelope::sign(
            b"unit-test-secret",
            &envelope::canonical_payload(&data),
            future_ts,
        )
        .unwrap();
        let env = Envelope {
            version: ENVELOPE_VERSION,
            timestamp: future_ts,
            data,
            signature: Some(sig),
        };
        backend
            .put("k", serde_json::to_string(&env).unwrap(), Duration::from_secs(60))
            .await
            .unwrap();

        let read: Option<SecureRead<Payload>> = store.get("k").await.unwrap();
        assert!(read.is_none());
    }

    #[tokio::test]
    async fn stale_entry_rejected_even_if_backend_ttl_live() {
        let backend = Arc::new(MemoryBackend::new());
        let store = SecureStateStore::new(
            backend.clone(),
            Some("unit-test-secret".into()),
            Duration::from_millis(10),
        );
        let payload = Payload {
            name: "stale".into(),
            amount: U256::one(),
        };
        // Backend TTL far longer than the store's max entry age.
        store
            .set("k", &payload, Duration::from_secs(3600))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(25)).await;

        let read: Option<SecureRead<Payload>> = store.get("k").await.unwrap();
        assert!(read.is_none());
    }

    #[tokio::test]
    async fn unknown_version_rejected() {
        let (store, backend) = store_with_secret();
        let data = serde_json::json!({"name": "x", "amount": "0x1"});
        let ts = now_ms();
        let sig = envelope::sign(
            b"unit-test-secret",
            &envelope::canonical_payload(&data),
            ts,
        )
        .unwrap();
        let env = Envelope {
            version: 99,
            timestamp: ts,
            data,
            signature: Some(sig),
        };
        backend
            .put("k", serde_json::to_string(&env).unwrap(), Duration::from_secs(60))
            .await
            .unwrap();

        let read: Option<SecureRead<Payload>> = store.get("k").await.unwrap();
        assert!(read.is_none());
    }

    #[tokio::test]
    async fn insecure_mode_reads_are_marked_unverified() {
        let backend = Arc::new(MemoryBackend::new());
        let store = SecureStateStore::new(backend, None, Duration::from_secs(1800));
        assert!(!store.is_signing_enabled());

        let payload = Payload {
            name: "alice.eth".into(),
            amount: U256::from(5u8),
        };
        store
            .set("k", &payload, Duration::from_secs(60))
            .await
            .unwrap();

        let read: SecureRead<Payload> = store.get("k").await.unwrap().unwrap();
        assert!(!read.verified);
        assert_eq!(read.value, payload);
    }

    #[tokio::test]
    async fn missing_signature_with_secret_configured_fails_closed() {
        let (store, backend) = store_with_secret();
        let env = Envelope {
            version: ENVELOPE_VERSION,
            timestamp: now_ms(),
            data: serde_json::json!({"name": "x", "amount": "0x1"}),
            signature: None,
        };
        backend
            .put("k", serde_json::to_string(&env).unwrap(), Duration::from_secs(60))
            .await
            .unwrap();

        let read: Option<SecureRead<Payload>> = store.get("k").await.unwrap();
        assert!(read.is_none());
    }

    #[tokio::test]
    async fn delete_then_get_returns_none() {
        let (store, _) = store_with_secret();
        let payload = Payload {
            name: "x".into(),
            amount: U256::one(),
        };
        store
            .set("k", &payload, Duration::from_secs(60))
            .await
            .unwrap();
        store.delete("k").await.unwrap();
        let read: Option<SecureRead<Payload>> = store.get("k").await.unwrap();
        assert!(read.is_none());
    }
}
