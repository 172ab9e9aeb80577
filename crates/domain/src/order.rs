//! Order and order item entities.

use chrono::{DateTime, Utc};
use common::{AddressId, Money, OrderId, OrderItemId, ProductId, SellerId, UserId};
use serde::{Deserialize, Serialize};

use crate::status::{OrderStatus, PaymentStatus};

/// An order row — either the parent of a multi-seller checkout or a
/// per-seller sub-order under such a parent.
///
/// A parent order has `is_parent == true`, no `seller_id`, and one
/// sub-order per distinct seller in the original cart. Sub-orders carry
/// `parent_order_id` and `seller_id` and are the unit sellers act upon.
/// Status and payment status on sub-orders mirror parent transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Unique order identifier.
    pub id: OrderId,

    /// The buying customer.
    pub user_id: UserId,

    /// Shipping address chosen at checkout.
    pub address_id: AddressId,

    /// Parent order, set only on sub-orders.
    pub parent_order_id: Option<OrderId>,

    /// Owning seller, set only on sub-orders.
    pub seller_id: Option<SellerId>,

    /// Sum of line totals (per-seller sum on sub-orders, overall on the
    /// parent).
    pub total_amount: Money,

    /// Fulfillment status.
    pub status: OrderStatus,

    /// Payment status, driven by the payment collaborator.
    pub payment_status: PaymentStatus,

    /// True for the parent row of a multi-seller checkout.
    pub is_parent: bool,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Creates a new parent order in `Pending`/`Pending`.
    pub fn parent(user_id: UserId, address_id: AddressId, total_amount: Money) -> Self {
        Self {
            id: OrderId::new(),
            user_id,
            address_id,
            parent_order_id: None,
            seller_id: None,
            total_amount,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            is_parent: true,
            created_at: Utc::now(),
        }
    }

    /// Creates a per-seller sub-order under `parent`.
    pub fn sub_order(parent: &Order, seller_id: SellerId, total_amount: Money) -> Self {
        Self {
            id: OrderId::new(),
            user_id: parent.user_id,
            address_id: parent.address_id,
            parent_order_id: Some(parent.id),
            seller_id: Some(seller_id),
            total_amount,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            is_parent: false,
            created_at: parent.created_at,
        }
    }
}

/// A purchased line item belonging to a sub-order.
///
/// The unit price is frozen at purchase time and never re-read from the
/// catalog. Item status mirrors its sub-order's status transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Unique item identifier.
    pub id: OrderItemId,

    /// The owning sub-order.
    pub order_id: OrderId,

    /// The purchased product.
    pub product_id: ProductId,

    /// The seller fulfilling this line.
    pub seller_id: SellerId,

    /// Purchased quantity.
    pub quantity: u32,

    /// Unit price frozen at purchase time.
    pub unit_price: Money,

    /// Fulfillment status of this line.
    pub status: OrderStatus,
}

impl OrderItem {
    /// Creates a new pending order item with the price frozen now.
    pub fn new(
        order_id: OrderId,
        product_id: ProductId,
        seller_id: SellerId,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            id: OrderItemId::new(),
            order_id,
            product_id,
            seller_id,
            quantity,
            unit_price,
            status: OrderStatus::Pending,
        }
    }

    /// Returns the total price for this line (quantity × unit price).
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}
