//! Lock store trait.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// Backing store for distributed locks.
///
/// An implementation must provide two atomic primitives:
/// set-if-absent-with-expiry and compare-and-delete keyed by token.
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Atomically sets `key` to `token` with expiry `ttl` if the key is
    /// absent (or its previous value has expired).
    ///
    /// Returns true if the key was set, false if another holder owns it.
    async fn try_acquire(&self, key: &str, token: &str, ttl: Duration) -> Result<bool>;

    /// Atomically deletes `key` if and only if it still holds `token`.
    ///
    /// Returns true if the key was deleted. A stale holder whose TTL
    /// lapsed — and whose key may since belong to someone else — gets
    /// false and must not retry.
    async fn release_if_owner(&self, key: &str, token: &str) -> Result<bool>;
}
