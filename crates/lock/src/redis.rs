//! Redis-backed lock store.
//!
//! Acquisition is a single `SET key token NX PX ttl`. Release is a Lua
//! compare-and-delete so only the holder whose token still matches can
//! delete the key — a stale holder whose TTL lapsed cannot release a
//! lock that has since been reassigned.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Script;

use crate::error::{LockError, Result};
use crate::store::LockStore;

const RELEASE_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

/// Redis-backed lock store implementation.
#[derive(Clone)]
pub struct RedisLockStore {
    conn: ConnectionManager,
    release: Arc<Script>,
}

impl RedisLockStore {
    /// Connects to Redis at `url` (e.g. `redis://localhost:6379`).
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| LockError::Store(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| LockError::Store(e.to_string()))?;
        Ok(Self::new(conn))
    }

    /// Creates a lock store over an existing connection manager.
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            release: Arc::new(Script::new(RELEASE_SCRIPT)),
        }
    }
}

#[async_trait]
impl LockStore for RedisLockStore {
    async fn try_acquire(&self, key: &str, token: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(token)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await
            .map_err(|e| LockError::Store(e.to_string()))?;
        Ok(reply.is_some())
    }

    async fn release_if_owner(&self, key: &str, token: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let deleted: i64 = self
            .release
            .key(key)
            .arg(token)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| LockError::Store(e.to_string()))?;
        Ok(deleted == 1)
    }
}
