//! In-memory lock store for testing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::Result;
use crate::store::LockStore;

#[derive(Debug, Clone)]
struct LockEntry {
    token: String,
    expires_at: Instant,
}

/// In-memory lock store implementation for testing.
///
/// Provides the same acquire/release semantics as the Redis
/// implementation, including TTL expiry. Uses the tokio clock so tests
/// can drive expiry with `tokio::time::pause`/`advance`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLockStore {
    entries: Arc<Mutex<HashMap<String, LockEntry>>>,
}

impl InMemoryLockStore {
    /// Creates a new empty in-memory lock store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of unexpired locks currently held.
    pub fn active_lock_count(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }
}

#[async_trait]
impl LockStore for InMemoryLockStore {
    async fn try_acquire(&self, key: &str, token: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();

        if let Some(entry) = entries.get(key)
            && entry.expires_at > now
        {
            return Ok(false);
        }

        entries.insert(
            key.to_string(),
            LockEntry {
                token: token.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn release_if_owner(&self, key: &str, token: &str) -> Result<bool> {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();

        match entries.get(key) {
            Some(entry) if entry.expires_at <= now => {
                // Expired entries behave as absent, matching Redis.
                entries.remove(key);
                Ok(false)
            }
            Some(entry) if entry.token == token => {
                entries.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acquire_and_release() {
        let store = InMemoryLockStore::new();
        assert!(
            store
                .try_acquire("k", "t1", Duration::from_secs(10))
                .await
                .unwrap()
        );
        assert!(
            !store
                .try_acquire("k", "t2", Duration::from_secs(10))
                .await
                .unwrap()
        );
        assert!(store.release_if_owner("k", "t1").await.unwrap());
        assert!(
            store
                .try_acquire("k", "t2", Duration::from_secs(10))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_release_requires_matching_token() {
        let store = InMemoryLockStore::new();
        store
            .try_acquire("k", "owner", Duration::from_secs(10))
            .await
            .unwrap();
        assert!(!store.release_if_owner("k", "intruder").await.unwrap());
        assert_eq!(store.active_lock_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_lock_is_reacquirable() {
        let store = InMemoryLockStore::new();
        store
            .try_acquire("k", "t1", Duration::from_millis(100))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_millis(150)).await;

        assert!(
            store
                .try_acquire("k", "t2", Duration::from_secs(10))
                .await
                .unwrap()
        );
        // The stale holder can no longer delete the reassigned key.
        assert!(!store.release_if_owner("k", "t1").await.unwrap());
    }
}
