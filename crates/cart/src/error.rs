//! Cart error types.

use common::ProductId;
use lock::LockError;
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The product does not exist.
    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    /// Not enough availability to hold the requested quantity. Safe to
    /// retry after refreshing the cart.
    #[error(
        "insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: i64,
    },

    /// Lock layer error (timeout is transient and retryable).
    #[error("lock error: {0}")]
    Lock(#[from] LockError),

    /// Store layer error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for cart operations.
pub type Result<T> = std::result::Result<T, CartError>;
