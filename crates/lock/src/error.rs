//! Lock error types.

use thiserror::Error;

/// Errors that can occur when acquiring or releasing locks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    /// Acquisition retried until the cumulative wait exceeded the
    /// configured timeout. Transient — callers should treat this as
    /// retryable, never as implicit success.
    #[error("timed out acquiring lock after {waited_ms}ms")]
    Timeout { waited_ms: u64 },

    /// The underlying lock store failed.
    #[error("lock store error: {0}")]
    Store(String),
}

/// Result type for lock operations.
pub type Result<T> = std::result::Result<T, LockError>;
