//! Cart reservation ledger for the marketplace core.
//!
//! A cart item is a soft, time-bounded hold: it counts against a
//! product's availability without touching the authoritative stock
//! counter. [`CartService`] keeps the advisory invariant — active holds
//! for a product never exceed its stock — by doing every
//! check-then-write under the product's distributed lock, and heals
//! expired or unfulfillable holds on every read.

pub mod config;
pub mod error;
pub mod service;

pub use config::CartConfig;
pub use error::{CartError, Result};
pub use service::{CartLine, CartOwner, CartService, CartView};
