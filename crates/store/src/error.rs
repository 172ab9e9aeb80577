//! Store error types.

use thiserror::Error;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A unique constraint rejected the write.
    ///
    /// Callers use the constraint name to detect create races (e.g. two
    /// requests both creating a user's cart) and adopt the winning row.
    #[error("unique constraint violated: {constraint}")]
    Conflict { constraint: String },

    /// A stored row failed to decode into its entity.
    #[error("corrupt row: {0}")]
    Decode(String),
}

impl From<domain::InvalidStatus> for StoreError {
    fn from(e: domain::InvalidStatus) -> Self {
        StoreError::Decode(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
