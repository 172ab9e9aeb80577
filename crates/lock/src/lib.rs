//! Distributed mutual-exclusion locks for the marketplace core.
//!
//! A [`LockManager`] serializes cross-process access to a product's
//! stock counter through a shared key-value store offering atomic
//! set-if-absent-with-TTL and compare-and-delete. Locks are advisory and
//! TTL-bounded: legitimate work can outlive the TTL, so callers must
//! never treat lock ownership alone as sufficient — every stock mutation
//! also carries its own conditional write in the store layer.

pub mod error;
pub mod keys;
pub mod manager;
pub mod memory;
pub mod redis;
pub mod store;

pub use error::{LockError, Result};
pub use manager::{LockConfig, LockManager, LockToken};
pub use memory::InMemoryLockStore;
pub use redis::RedisLockStore;
pub use store::LockStore;
