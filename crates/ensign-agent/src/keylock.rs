// SPDX-FileCopyrightText: 2026 Ensign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-key serialization for `(user, conversation)` work.
//!
//! The state store's read-modify-write pattern is not atomic, so every entry
//! point (inbound message, signature resume, form resume) must hold the key's
//! lock for its whole critical section. A resume can then never race a fresh
//! inbound message for the same key; cross-key work stays fully concurrent.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use ensign_core::types::{ConversationId, UserId};

/// A map of lazily created per-key async mutexes.
#[derive(Default)]
pub struct KeyedLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock for a `(user, conversation)` key, waiting if another
    /// task holds it.
    pub async fn acquire(
        &self,
        user: &UserId,
        conversation: &ConversationId,
    ) -> OwnedMutexGuard<()> {
        let key = format!("{}:{}", user.0, conversation.0);
        let lock = self
            .locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_is_serialized() {
        let locks = Arc::new(KeyedLocks::new());
        let user = UserId("u1".into());
        let conv = ConversationId("c1".into());
        let in_critical = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let user = user.clone();
            let conv = conv.clone();
            let in_critical = in_critical.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire(&user, &conv).await;
                let now = in_critical.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                in_critical.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_keys_run_concurrently() {
        let locks = Arc::new(KeyedLocks::new());
        let user = UserId("u1".into());

        let guard_a = locks
            .acquire(&user, &ConversationId("c1".into()))
            .await;
        // Acquiring a different conversation's lock must not block.
        let acquired = tokio::time::timeout(
            Duration::from_millis(100),
            locks.acquire(&user, &ConversationId("c2".into())),
        )
        .await;
        assert!(acquired.is_ok());
        drop(guard_a);
    }
}
