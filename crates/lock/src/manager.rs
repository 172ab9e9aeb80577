//! Lock manager: acquisition with bounded backoff, scoped execution.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

use crate::error::{LockError, Result};
use crate::store::LockStore;

/// Lock acquisition and hold parameters.
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// How long a held lock lives in the store before the TTL reaps it.
    pub ttl: Duration,

    /// Maximum cumulative wait in [`LockManager::acquire`] before giving
    /// up with [`LockError::Timeout`].
    pub acquire_timeout: Duration,

    /// First retry delay on contention.
    pub retry_base: Duration,

    /// Upper bound on the exponential retry delay.
    pub retry_cap: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(10),
            acquire_timeout: Duration::from_secs(15),
            retry_base: Duration::from_millis(100),
            retry_cap: Duration::from_millis(500),
        }
    }
}

/// Proof of lock ownership.
///
/// Holds the opaque token the store associated with the key; release
/// succeeds only while the stored token still matches.
#[derive(Debug, Clone)]
pub struct LockToken {
    key: String,
    token: String,
}

impl LockToken {
    /// The locked key.
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Acquires and releases named locks against a [`LockStore`].
///
/// Acquisition retries with bounded exponential backoff until the
/// cumulative wait exceeds the configured timeout. Contending waiters
/// are NOT served FIFO — whichever retry lands first wins.
#[derive(Debug, Clone)]
pub struct LockManager<L> {
    store: L,
    config: LockConfig,
}

impl<L: LockStore> LockManager<L> {
    /// Creates a lock manager with default configuration.
    pub fn new(store: L) -> Self {
        Self::with_config(store, LockConfig::default())
    }

    /// Creates a lock manager with explicit configuration.
    pub fn with_config(store: L, config: LockConfig) -> Self {
        Self { store, config }
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Acquires `key`, waiting up to the configured timeout.
    pub async fn acquire(&self, key: &str) -> Result<LockToken> {
        let token = Uuid::new_v4().to_string();
        let start = Instant::now();
        let mut delay = self.config.retry_base;

        loop {
            if self.store.try_acquire(key, &token, self.config.ttl).await? {
                return Ok(LockToken {
                    key: key.to_string(),
                    token,
                });
            }

            if start.elapsed() + delay > self.config.acquire_timeout {
                let waited_ms = start.elapsed().as_millis() as u64;
                tracing::warn!(key, waited_ms, "lock acquisition timed out");
                return Err(LockError::Timeout { waited_ms });
            }

            metrics::counter!("lock_acquire_retries_total").increment(1);
            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(self.config.retry_cap);
        }
    }

    /// Releases a held lock.
    ///
    /// Returns false if the lock was already gone or reassigned — a safe
    /// no-op, so release is idempotent.
    pub async fn release(&self, token: &LockToken) -> Result<bool> {
        self.store.release_if_owner(&token.key, &token.token).await
    }

    /// Runs `f` while holding `key`, releasing on every exit path.
    ///
    /// The closure's output is returned untouched, so fallible work nests
    /// as `with_lock(...).await?` for the lock layer and `?` again for
    /// the inner result. A failed release is logged and left to the TTL.
    pub async fn with_lock<F, Fut, T>(&self, key: &str, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = T> + Send,
        T: Send,
    {
        let token = self.acquire(key).await?;
        let result = f().await;
        if let Err(e) = self.release(&token).await {
            tracing::warn!(key, error = %e, "lock release failed; TTL will reap it");
        }
        Ok(result)
    }
}
