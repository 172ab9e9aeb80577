//! Cart and cart item entities.

use chrono::{DateTime, Utc};
use common::{CartId, ProductId, SessionId, UserId};
use serde::{Deserialize, Serialize};

/// A shopping cart owned by an authenticated user or an anonymous
/// session.
///
/// Authenticated carts never expire. Anonymous carts carry an absolute
/// expiry; multiple anonymous carts per session are tolerated and the
/// most recently created one wins on resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    /// Unique cart identifier.
    pub id: CartId,

    /// Owning user, if authenticated.
    pub user_id: Option<UserId>,

    /// Owning session, if anonymous.
    pub session_id: Option<SessionId>,

    /// Absolute expiry for anonymous carts; `None` for user carts.
    pub expires_at: Option<DateTime<Utc>>,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Cart {
    /// Creates a cart for an authenticated user. User carts never expire.
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            id: CartId::new(),
            user_id: Some(user_id),
            session_id: None,
            expires_at: None,
            created_at: Utc::now(),
        }
    }

    /// Creates an anonymous session cart with an absolute expiry.
    pub fn for_session(session_id: SessionId, expires_at: DateTime<Utc>) -> Self {
        Self {
            id: CartId::new(),
            user_id: None,
            session_id: Some(session_id),
            expires_at: Some(expires_at),
            created_at: Utc::now(),
        }
    }

    /// Returns true if this cart has no authenticated owner.
    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_none()
    }

    /// Returns true if the cart's absolute expiry has passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// A line in a cart: a soft, time-bounded hold on product stock.
///
/// Unique per `(cart_id, product_id)`. The reservation is advisory — it
/// never decrements the product's stock counter; it only participates in
/// availability sums until it expires or converts into an order item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// The cart holding this item.
    pub cart_id: CartId,

    /// The reserved product.
    pub product_id: ProductId,

    /// Held quantity, always positive (zero quantity deletes the row).
    pub quantity: u32,

    /// When the soft hold lapses; `None` means the hold never lapses.
    pub reservation_expires_at: Option<DateTime<Utc>>,
}

impl CartItem {
    /// Creates a new cart item with a reservation deadline.
    pub fn new(
        cart_id: CartId,
        product_id: ProductId,
        quantity: u32,
        reservation_expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            cart_id,
            product_id,
            quantity,
            reservation_expires_at,
        }
    }

    /// Returns true if the hold still counts against availability.
    pub fn is_reservation_active(&self, now: DateTime<Utc>) -> bool {
        match self.reservation_expires_at {
            None => true,
            Some(at) => at > now,
        }
    }
}
