//! Storage traits: single-statement operations and the unit of work.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AddressId, CartId, OrderId, OrderItemId, ProductId, SellerId, SessionId, UserId};
use domain::{Address, Cart, CartItem, Order, OrderItem, OrderStatus, PaymentStatus, Product};

use crate::error::Result;

/// Core trait for marketplace storage backends.
///
/// Every method outside [`CommerceStore::begin`] is a single atomic
/// statement (auto-commit). Multi-statement operations open a
/// [`StoreTx`]. All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait CommerceStore: Send + Sync {
    // -- products / stock ledger --

    /// Inserts a new product row.
    async fn insert_product(&self, product: &Product) -> Result<()>;

    /// Fetches a product by ID.
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Conditionally decrements stock: `stock = stock - qty` only where
    /// `stock >= qty`.
    ///
    /// Returns true iff exactly one row was affected. This conditional
    /// write is the authoritative oversell gate; it stays correct even
    /// if the caller's lock TTL lapsed mid-operation.
    async fn decrement_stock(&self, id: ProductId, quantity: u32) -> Result<bool>;

    /// Unconditionally increments stock (restock, cancellation
    /// compensation). Not idempotent — callers own invocation
    /// discipline.
    async fn increment_stock(&self, id: ProductId, quantity: u32) -> Result<()>;

    // -- reservations --

    /// Sums the quantity of active cart items holding `product_id`
    /// across all carts except `exclude_cart`.
    ///
    /// Active means `reservation_expires_at` is null or after `now`.
    async fn reserved_quantity(
        &self,
        product_id: ProductId,
        exclude_cart: Option<CartId>,
        now: DateTime<Utc>,
    ) -> Result<i64>;

    // -- carts --

    /// Inserts a new cart row.
    ///
    /// Fails with [`StoreError::Conflict`] if the user already has a
    /// cart (the `carts_one_per_user` constraint); anonymous carts are
    /// not unique per session.
    ///
    /// [`StoreError::Conflict`]: crate::error::StoreError::Conflict
    async fn insert_cart(&self, cart: &Cart) -> Result<()>;

    /// Fetches a cart by ID.
    async fn get_cart(&self, id: CartId) -> Result<Option<Cart>>;

    /// Finds the cart owned by an authenticated user.
    async fn find_cart_by_user(&self, user_id: UserId) -> Result<Option<Cart>>;

    /// Finds the most recently created unexpired cart for a session.
    async fn find_latest_cart_by_session(
        &self,
        session_id: &SessionId,
        now: DateTime<Utc>,
    ) -> Result<Option<Cart>>;

    /// Deletes a cart and its items.
    async fn delete_cart(&self, id: CartId) -> Result<()>;

    // -- cart items --

    /// Inserts or replaces the `(cart_id, product_id)` row.
    ///
    /// Replacement overwrites both quantity and reservation deadline —
    /// repeat adds never sum.
    async fn upsert_cart_item(&self, item: &CartItem) -> Result<()>;

    /// Fetches one cart line.
    async fn get_cart_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<Option<CartItem>>;

    /// Lists all lines in a cart.
    async fn list_cart_items(&self, cart_id: CartId) -> Result<Vec<CartItem>>;

    /// Deletes one cart line. Deleting an absent line is a no-op.
    async fn delete_cart_item(&self, cart_id: CartId, product_id: ProductId) -> Result<()>;

    /// Deletes every line in a cart.
    async fn delete_cart_items(&self, cart_id: CartId) -> Result<()>;

    /// Deletes lines whose reservation lapsed at or before `now`.
    /// Returns the number of rows removed.
    async fn delete_expired_cart_items(&self, cart_id: CartId, now: DateTime<Utc>) -> Result<u64>;

    /// Deletes lines whose product is out of stock (or gone). Returns
    /// the number of rows removed.
    async fn delete_out_of_stock_cart_items(&self, cart_id: CartId) -> Result<u64>;

    // -- addresses --

    /// Inserts a new address row.
    async fn insert_address(&self, address: &Address) -> Result<()>;

    /// Fetches an address by ID.
    async fn get_address(&self, id: AddressId) -> Result<Option<Address>>;

    // -- orders --

    /// Fetches an order (parent or sub-order) by ID.
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Lists a user's parent orders, newest first.
    async fn list_parent_orders_by_user(&self, user_id: UserId) -> Result<Vec<Order>>;

    /// Lists the sub-orders under a parent.
    async fn list_sub_orders(&self, parent_order_id: OrderId) -> Result<Vec<Order>>;

    /// Lists a seller's sub-orders, newest first.
    async fn list_sub_orders_by_seller(&self, seller_id: SellerId) -> Result<Vec<Order>>;

    /// Lists the items of one sub-order.
    async fn list_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>>;

    /// Fetches one order item by ID.
    async fn get_order_item(&self, id: OrderItemId) -> Result<Option<OrderItem>>;

    // -- transactions --

    /// Opens a unit of work. Writes made through the returned [`StoreTx`]
    /// become visible atomically on commit and are undone on rollback.
    async fn begin(&self) -> Result<Box<dyn StoreTx>>;
}

/// A unit of work: one atomic scope threaded through an orchestrated
/// operation.
///
/// Dropping a transaction without committing rolls it back.
#[async_trait]
pub trait StoreTx: Send {
    /// Fetches a product inside the transaction.
    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>>;

    /// Conditional stock decrement; see
    /// [`CommerceStore::decrement_stock`].
    async fn decrement_stock(&mut self, id: ProductId, quantity: u32) -> Result<bool>;

    /// Unconditional stock increment; see
    /// [`CommerceStore::increment_stock`].
    async fn increment_stock(&mut self, id: ProductId, quantity: u32) -> Result<()>;

    /// Inserts an order row (parent or sub-order).
    async fn insert_order(&mut self, order: &Order) -> Result<()>;

    /// Inserts an order item row.
    async fn insert_order_item(&mut self, item: &OrderItem) -> Result<()>;

    /// Rewrites an order's status and payment status.
    async fn update_order_status(
        &mut self,
        id: OrderId,
        status: OrderStatus,
        payment_status: PaymentStatus,
    ) -> Result<()>;

    /// Rewrites one order item's status.
    async fn update_order_item_status(&mut self, id: OrderItemId, status: OrderStatus)
    -> Result<()>;

    /// Rewrites the status of every item in an order.
    async fn update_order_items_status(
        &mut self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<()>;

    /// Deletes every line in a cart (checkout clears the cart last).
    async fn delete_cart_items(&mut self, cart_id: CartId) -> Result<()>;

    /// Commits the unit of work.
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Rolls the unit of work back, undoing every write made through it.
    async fn rollback(self: Box<Self>) -> Result<()>;
}
