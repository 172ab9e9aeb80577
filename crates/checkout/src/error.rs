//! Checkout error types.

use common::{OrderId, OrderItemId, ProductId};
use domain::DomainError;
use lock::LockError;
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during order orchestration.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The user's cart has no items.
    #[error("cart is empty")]
    EmptyCart,

    /// The address does not exist or belongs to another user.
    #[error("address not found")]
    AddressNotFound,

    /// The order does not exist or is not visible to the caller.
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order item does not exist.
    #[error("order item not found: {0}")]
    OrderItemNotFound(OrderItemId),

    /// A cart line references a product that no longer exists.
    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    /// A cart line's soft hold lapsed before checkout. The caller must
    /// refresh the cart and retry.
    #[error("reservation expired for product {0}")]
    ReservationExpired(ProductId),

    /// Not enough stock to fulfil a line. Safe to retry after a cart
    /// refresh.
    #[error(
        "insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: i64,
    },

    /// The caller does not own the sub-order or item it is acting on.
    #[error("not authorized to act on this order")]
    Unauthorized,

    /// Entity-level rule violation (illegal status transition, bad
    /// quantity).
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),

    /// Lock layer error (timeout is transient and retryable).
    #[error("lock error: {0}")]
    Lock(#[from] LockError),

    /// Store layer error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for checkout operations.
pub type Result<T> = std::result::Result<T, CheckoutError>;
