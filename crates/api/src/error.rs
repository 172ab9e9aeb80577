//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cart::CartError;
use checkout::CheckoutError;
use domain::DomainError;
use lock::LockError;

/// API-level error type that maps to HTTP responses.
///
/// Every failure carries a stable machine-readable kind. Messages never
/// include lock keys or other internals; store and lock-store failures
/// collapse to a generic internal error after being logged.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found (or not visible to the caller).
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Caller is not allowed to act on the resource.
    Forbidden,
    /// Cart layer error.
    Cart(CartError),
    /// Checkout layer error.
    Checkout(CheckoutError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                "UNAUTHORIZED",
                "not authorized to act on this resource".to_string(),
            ),
            ApiError::Cart(err) => cart_error_to_response(err),
            ApiError::Checkout(err) => checkout_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "internal server error".to_string(),
                )
            }
        };

        let body = serde_json::json!({ "error": message, "kind": kind });
        (status, axum::Json(body)).into_response()
    }
}

fn cart_error_to_response(err: CartError) -> (StatusCode, &'static str, String) {
    match &err {
        CartError::ProductNotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string()),
        CartError::InsufficientStock { .. } => {
            (StatusCode::CONFLICT, "INSUFFICIENT_STOCK", err.to_string())
        }
        CartError::Lock(LockError::Timeout { .. }) => lock_timeout_response(),
        CartError::Lock(_) | CartError::Store(_) => internal_response(&err),
    }
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, &'static str, String) {
    match &err {
        CheckoutError::EmptyCart => (StatusCode::BAD_REQUEST, "EMPTY_CART", err.to_string()),
        CheckoutError::AddressNotFound
        | CheckoutError::OrderNotFound(_)
        | CheckoutError::OrderItemNotFound(_)
        | CheckoutError::ProductNotFound(_) => {
            (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string())
        }
        CheckoutError::ReservationExpired(_) => {
            (StatusCode::CONFLICT, "RESERVATION_EXPIRED", err.to_string())
        }
        CheckoutError::InsufficientStock { .. } => {
            (StatusCode::CONFLICT, "INSUFFICIENT_STOCK", err.to_string())
        }
        CheckoutError::Unauthorized => (StatusCode::FORBIDDEN, "UNAUTHORIZED", err.to_string()),
        CheckoutError::Domain(DomainError::InvalidTransition { .. }) => {
            (StatusCode::CONFLICT, "INVALID_TRANSITION", err.to_string())
        }
        CheckoutError::Domain(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", err.to_string()),
        CheckoutError::Lock(LockError::Timeout { .. }) => lock_timeout_response(),
        CheckoutError::Lock(_) | CheckoutError::Store(_) => internal_response(&err),
    }
}

/// Lock contention is transient; tell the client to retry.
fn lock_timeout_response() -> (StatusCode, &'static str, String) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        "LOCK_TIMEOUT",
        "the product is busy, retry shortly".to_string(),
    )
}

fn internal_response(err: &dyn std::fmt::Display) -> (StatusCode, &'static str, String) {
    tracing::error!(error = %err, "internal server error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL",
        "internal server error".to_string(),
    )
}

impl From<CartError> for ApiError {
    fn from(err: CartError) -> Self {
        ApiError::Cart(err)
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<store::StoreError> for ApiError {
    fn from(err: store::StoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
