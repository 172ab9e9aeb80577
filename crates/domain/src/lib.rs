//! Domain layer for the marketplace core.
//!
//! This crate provides the persistent entities (products, carts, orders,
//! addresses) and the order status state machine. It contains no I/O;
//! storage lives in the `store` crate and orchestration in `cart` and
//! `checkout`.

pub mod address;
pub mod cart;
pub mod error;
pub mod order;
pub mod product;
pub mod status;

pub use address::Address;
pub use cart::{Cart, CartItem};
pub use error::DomainError;
pub use order::{Order, OrderItem};
pub use product::Product;
pub use status::{InvalidStatus, OrderStatus, PaymentStatus};
