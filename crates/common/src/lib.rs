//! Shared value types for the marketplace core.
//!
//! Provides the typed identifiers used across every crate in the
//! workspace, plus [`Money`], the integer-cents amount type.

pub mod ids;
pub mod money;

pub use ids::{
    AddressId, CartId, OrderId, OrderItemId, ProductId, SellerId, SessionId, UserId,
};
pub use money::Money;
