//! Order orchestration for the marketplace core.
//!
//! [`CheckoutService`] converts a cart into a parent order plus
//! per-seller sub-orders inside one unit of work, deducting stock per
//! item under the product's distributed lock. Any single failure aborts
//! the entire checkout — no partial, cross-seller orders are ever
//! persisted. Cancellation reverses stock through the same primitives,
//! and payment callbacks drive the status machine without ever touching
//! stock.

pub mod error;
pub mod payment;
pub mod service;

pub use error::{CheckoutError, Result};
pub use service::{CheckoutService, OrderDetails, SubOrderDetails};
