//! Checkout orchestration: order creation, cancellation, status updates.

use chrono::Utc;
use common::{AddressId, CartId, Money, OrderId, OrderItemId, SellerId, UserId};
use domain::{CartItem, DomainError, Order, OrderItem, OrderStatus, PaymentStatus, Product};
use lock::{keys, LockManager, LockStore};
use store::{CommerceStore, StoreTx};

use crate::error::{CheckoutError, Result};

/// A parent order aggregated with its per-seller sub-orders and items.
#[derive(Debug, Clone)]
pub struct OrderDetails {
    /// The parent order row.
    pub order: Order,
    /// One entry per seller.
    pub sub_orders: Vec<SubOrderDetails>,
}

/// A sub-order with its line items.
#[derive(Debug, Clone)]
pub struct SubOrderDetails {
    /// The sub-order row.
    pub order: Order,
    /// Its line items.
    pub items: Vec<OrderItem>,
}

/// Service orchestrating multi-seller checkout and its reversals.
///
/// Every stock mutation happens under the product's distributed lock
/// AND as a conditional write inside one unit of work, so a lock whose
/// TTL lapsed mid-checkout still cannot oversell. One failing line
/// aborts the whole checkout.
pub struct CheckoutService<S, L> {
    store: S,
    locks: LockManager<L>,
}

impl<S, L> CheckoutService<S, L>
where
    S: CommerceStore,
    L: LockStore,
{
    /// Creates a checkout service.
    pub fn new(store: S, locks: LockManager<L>) -> Self {
        Self { store, locks }
    }

    /// Converts the user's cart into a parent order with per-seller
    /// sub-orders, deducting stock per item.
    ///
    /// Fails without side effects on an empty cart, an unowned address,
    /// a lapsed hold, or visibly insufficient stock; aborts the whole
    /// transaction if any line loses the authoritative decrement. The
    /// cart is cleared only after every line across every sub-order
    /// succeeded.
    #[tracing::instrument(skip(self))]
    pub async fn create_order(
        &self,
        user_id: UserId,
        address_id: AddressId,
    ) -> Result<OrderDetails> {
        metrics::counter!("checkout_attempts_total").increment(1);
        let started = std::time::Instant::now();

        let result = self.create_order_inner(user_id, address_id).await;

        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());
        match &result {
            Ok(details) => {
                metrics::counter!("checkout_orders_total").increment(1);
                tracing::info!(order_id = %details.order.id, "checkout completed");
            }
            Err(e) => {
                metrics::counter!("checkout_failures_total").increment(1);
                tracing::warn!(error = %e, "checkout failed");
            }
        }
        result
    }

    async fn create_order_inner(
        &self,
        user_id: UserId,
        address_id: AddressId,
    ) -> Result<OrderDetails> {
        // 1. Load the cart; nothing to order without items.
        let cart = self
            .store
            .find_cart_by_user(user_id)
            .await?
            .ok_or(CheckoutError::EmptyCart)?;
        let items = self.store.list_cart_items(cart.id).await?;
        if items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        // 2. The address must exist and belong to the buyer.
        self.store
            .get_address(address_id)
            .await?
            .filter(|a| a.is_owned_by(user_id))
            .ok_or(CheckoutError::AddressNotFound)?;

        // 3. Advisory pre-checks, lock-free: lapsed holds and visibly
        //    short stock fail fast. The authoritative verdict is the
        //    conditional decrement in step 5.
        let now = Utc::now();
        let mut lines: Vec<(CartItem, Product)> = Vec::with_capacity(items.len());
        for item in items {
            if !item.is_reservation_active(now) {
                return Err(CheckoutError::ReservationExpired(item.product_id));
            }
            let product = self
                .store
                .get_product(item.product_id)
                .await?
                .ok_or(CheckoutError::ProductNotFound(item.product_id))?;
            if product.stock < item.quantity as i64 {
                return Err(CheckoutError::InsufficientStock {
                    product_id: item.product_id,
                    requested: item.quantity,
                    available: product.stock.max(0),
                });
            }
            lines.push((item, product));
        }

        // 4. Partition by seller and freeze prices.
        let mut groups: Vec<(SellerId, Vec<(CartItem, Product)>)> = Vec::new();
        for (item, product) in lines {
            match groups.iter_mut().find(|(s, _)| *s == product.seller_id) {
                Some((_, group)) => group.push((item, product)),
                None => groups.push((product.seller_id, vec![(item, product)])),
            }
        }
        let grand_total: Money = groups
            .iter()
            .flat_map(|(_, group)| group.iter())
            .map(|(item, product)| product.price.multiply(item.quantity))
            .sum();
        let parent = Order::parent(user_id, address_id, grand_total);

        // 5. One unit of work for the whole order tree.
        let mut tx = self.store.begin().await?;
        match self
            .place_order_tree(&mut *tx, &parent, &groups, cart.id)
            .await
        {
            Ok(sub_orders) => {
                tx.commit().await?;
                Ok(OrderDetails {
                    order: parent,
                    sub_orders,
                })
            }
            Err(e) => {
                tx.rollback().await?;
                Err(e)
            }
        }
    }

    /// Persists the parent, sub-orders, and items, deducting stock per
    /// item under its product lock. Clears the cart last.
    async fn place_order_tree(
        &self,
        tx: &mut dyn StoreTx,
        parent: &Order,
        groups: &[(SellerId, Vec<(CartItem, Product)>)],
        cart_id: CartId,
    ) -> Result<Vec<SubOrderDetails>> {
        tx.insert_order(parent).await?;

        let mut sub_orders = Vec::with_capacity(groups.len());
        for (seller_id, group) in groups {
            let sub_total: Money = group
                .iter()
                .map(|(item, product)| product.price.multiply(item.quantity))
                .sum();
            let sub = Order::sub_order(parent, *seller_id, sub_total);
            tx.insert_order(&sub).await?;

            let sub_id = sub.id;
            let mut sub_items = Vec::with_capacity(group.len());
            for (cart_item, product) in group {
                let key = keys::product_stock(cart_item.product_id);
                let tx_ref = &mut *tx;
                let order_item = self
                    .locks
                    .with_lock(&key, move || async move {
                        // Reload under the lock and verify before the
                        // conditional decrement settles it.
                        let current = tx_ref
                            .get_product(cart_item.product_id)
                            .await?
                            .ok_or(CheckoutError::ProductNotFound(cart_item.product_id))?;
                        if current.stock < cart_item.quantity as i64
                            || !tx_ref
                                .decrement_stock(cart_item.product_id, cart_item.quantity)
                                .await?
                        {
                            return Err(CheckoutError::InsufficientStock {
                                product_id: cart_item.product_id,
                                requested: cart_item.quantity,
                                available: current.stock.max(0),
                            });
                        }
                        let order_item = OrderItem::new(
                            sub_id,
                            cart_item.product_id,
                            product.seller_id,
                            cart_item.quantity,
                            product.price,
                        );
                        tx_ref.insert_order_item(&order_item).await?;
                        Ok(order_item)
                    })
                    .await??;
                sub_items.push(order_item);
            }

            sub_orders.push(SubOrderDetails {
                order: sub,
                items: sub_items,
            });
        }

        tx.delete_cart_items(cart_id).await?;
        Ok(sub_orders)
    }

    /// Cancels a pending order owned by `user_id`.
    ///
    /// Parent orders cascade: every sub-order goes to
    /// `Cancelled`/`Refunded`, every item to `Cancelled`, and every
    /// item's stock is restored under its product lock. Legacy
    /// non-parent orders restore just their own items. Sub-orders that
    /// were already cancelled individually are skipped — their stock was
    /// compensated when they were cancelled.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, user_id: UserId, order_id: OrderId) -> Result<()> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .filter(|o| o.user_id == user_id)
            .ok_or(CheckoutError::OrderNotFound(order_id))?;
        if !order.status.can_cancel_order() {
            return Err(
                DomainError::invalid_transition(order.status, OrderStatus::Cancelled).into(),
            );
        }

        let mut tx = self.store.begin().await?;
        match self.cancel_order_tree(&mut *tx, &order).await {
            Ok(()) => {
                tx.commit().await?;
                tracing::info!(%order_id, "order cancelled");
                Ok(())
            }
            Err(e) => {
                tx.rollback().await?;
                Err(e)
            }
        }
    }

    async fn cancel_order_tree(&self, tx: &mut dyn StoreTx, order: &Order) -> Result<()> {
        if order.is_parent {
            for sub in self.store.list_sub_orders(order.id).await? {
                if sub.status == OrderStatus::Cancelled {
                    continue;
                }
                self.cancel_one_order(tx, &sub).await?;
            }
            tx.update_order_status(order.id, OrderStatus::Cancelled, PaymentStatus::Refunded)
                .await?;
        } else {
            self.cancel_one_order(tx, order).await?;
        }
        Ok(())
    }

    /// Marks one order row and its items cancelled and restores each
    /// item's stock under the product lock.
    async fn cancel_one_order(&self, tx: &mut dyn StoreTx, order: &Order) -> Result<()> {
        for item in self.store.list_order_items(order.id).await? {
            let key = keys::product_stock(item.product_id);
            let tx_ref = &mut *tx;
            self.locks
                .with_lock(&key, move || async move {
                    tx_ref.increment_stock(item.product_id, item.quantity).await
                })
                .await??;
        }
        tx.update_order_items_status(order.id, OrderStatus::Cancelled)
            .await?;
        tx.update_order_status(order.id, OrderStatus::Cancelled, PaymentStatus::Refunded)
            .await?;
        Ok(())
    }

    /// Cancels one sub-order on behalf of its owning seller.
    ///
    /// Allowed while the sub-order is pending or confirmed. Restores
    /// stock, marks the sub-order and its items cancelled, then
    /// re-evaluates the siblings: when every sub-order under the parent
    /// is cancelled, the parent cascades to cancelled as well.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_sub_order(&self, seller_id: SellerId, sub_order_id: OrderId) -> Result<()> {
        let sub = self
            .store
            .get_order(sub_order_id)
            .await?
            .filter(|o| !o.is_parent)
            .ok_or(CheckoutError::OrderNotFound(sub_order_id))?;
        if sub.seller_id != Some(seller_id) {
            return Err(CheckoutError::Unauthorized);
        }
        if !sub.status.can_cancel_sub_order() {
            return Err(DomainError::invalid_transition(sub.status, OrderStatus::Cancelled).into());
        }

        let mut tx = self.store.begin().await?;
        match self.cancel_sub_order_inner(&mut *tx, &sub).await {
            Ok(()) => {
                tx.commit().await?;
                tracing::info!(%sub_order_id, "sub-order cancelled");
                Ok(())
            }
            Err(e) => {
                tx.rollback().await?;
                Err(e)
            }
        }
    }

    async fn cancel_sub_order_inner(&self, tx: &mut dyn StoreTx, sub: &Order) -> Result<()> {
        self.cancel_one_order(tx, sub).await?;

        // Status roll-up is emergent: cancelling the last live sibling
        // cancels the parent.
        if let Some(parent_id) = sub.parent_order_id {
            let siblings = self.store.list_sub_orders(parent_id).await?;
            let all_cancelled = siblings
                .iter()
                .all(|s| s.id == sub.id || s.status == OrderStatus::Cancelled);
            if all_cancelled {
                tx.update_order_status(parent_id, OrderStatus::Cancelled, PaymentStatus::Refunded)
                    .await?;
            }
        }
        Ok(())
    }

    /// Advances one order item's status on behalf of its seller.
    ///
    /// Legal moves are `Pending → Confirmed | Cancelled`,
    /// `Confirmed → Shipped`, `Shipped → Delivered`. The new status is
    /// mirrored eagerly onto the owning sub-order and the parent.
    #[tracing::instrument(skip(self))]
    pub async fn update_item_status(
        &self,
        seller_id: SellerId,
        item_id: OrderItemId,
        new_status: OrderStatus,
    ) -> Result<OrderItem> {
        let item = self
            .store
            .get_order_item(item_id)
            .await?
            .ok_or(CheckoutError::OrderItemNotFound(item_id))?;
        let sub = self
            .store
            .get_order(item.order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound(item.order_id))?;
        if sub.seller_id != Some(seller_id) {
            return Err(CheckoutError::Unauthorized);
        }
        if !item.status.can_transition_to(new_status) {
            return Err(DomainError::invalid_transition(item.status, new_status).into());
        }

        let mut tx = self.store.begin().await?;
        let result: Result<()> = async {
            tx.update_order_item_status(item.id, new_status).await?;
            tx.update_order_status(sub.id, new_status, sub.payment_status)
                .await?;
            if let Some(parent_id) = sub.parent_order_id
                && let Some(parent) = self.store.get_order(parent_id).await?
            {
                tx.update_order_status(parent_id, new_status, parent.payment_status)
                    .await?;
            }
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                tx.commit().await?;
                Ok(OrderItem {
                    status: new_status,
                    ..item
                })
            }
            Err(e) => {
                tx.rollback().await?;
                Err(e)
            }
        }
    }

    /// Returns a parent order aggregated with its sub-orders and items,
    /// if owned by `user_id`.
    pub async fn get_order_details(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<OrderDetails> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .filter(|o| o.is_parent && o.user_id == user_id)
            .ok_or(CheckoutError::OrderNotFound(order_id))?;
        self.aggregate(order).await
    }

    /// Lists a user's parent orders, newest first.
    pub async fn list_orders(&self, user_id: UserId) -> Result<Vec<Order>> {
        Ok(self.store.list_parent_orders_by_user(user_id).await?)
    }

    /// Lists a seller's sub-orders with their items, newest first.
    pub async fn list_seller_orders(&self, seller_id: SellerId) -> Result<Vec<SubOrderDetails>> {
        let mut details = Vec::new();
        for order in self.store.list_sub_orders_by_seller(seller_id).await? {
            let items = self.store.list_order_items(order.id).await?;
            details.push(SubOrderDetails { order, items });
        }
        Ok(details)
    }

    async fn aggregate(&self, order: Order) -> Result<OrderDetails> {
        let mut sub_orders = Vec::new();
        for sub in self.store.list_sub_orders(order.id).await? {
            let items = self.store.list_order_items(sub.id).await?;
            sub_orders.push(SubOrderDetails { order: sub, items });
        }
        Ok(OrderDetails { order, sub_orders })
    }

    pub(crate) fn store(&self) -> &S {
        &self.store
    }
}
