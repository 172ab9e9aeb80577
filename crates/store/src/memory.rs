//! In-memory store implementation for testing.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AddressId, CartId, OrderId, OrderItemId, ProductId, SellerId, SessionId, UserId};
use domain::{Address, Cart, CartItem, Order, OrderItem, OrderStatus, PaymentStatus, Product};

use crate::error::{Result, StoreError};
use crate::store::{CommerceStore, StoreTx};

#[derive(Debug, Clone, Default)]
struct State {
    products: HashMap<ProductId, Product>,
    carts: HashMap<CartId, Cart>,
    cart_items: HashMap<(CartId, ProductId), CartItem>,
    addresses: HashMap<AddressId, Address>,
    orders: HashMap<OrderId, Order>,
    order_items: HashMap<OrderItemId, OrderItem>,
}

/// In-memory store implementation for testing.
///
/// Provides the same interface and semantics as the PostgreSQL
/// implementation, including the `carts_one_per_user` constraint and
/// transactional rollback. Transaction writes apply to the shared state
/// immediately and an inverse-operation log restores them on rollback
/// (or on drop without commit).
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of order rows (parents and sub-orders).
    pub fn order_count(&self) -> usize {
        self.state.read().unwrap().orders.len()
    }

    /// Returns the number of order item rows.
    pub fn order_item_count(&self) -> usize {
        self.state.read().unwrap().order_items.len()
    }
}

#[async_trait]
impl CommerceStore for InMemoryStore {
    async fn insert_product(&self, product: &Product) -> Result<()> {
        self.state
            .write()
            .unwrap()
            .products
            .insert(product.id, product.clone());
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.state.read().unwrap().products.get(&id).cloned())
    }

    async fn decrement_stock(&self, id: ProductId, quantity: u32) -> Result<bool> {
        let mut state = self.state.write().unwrap();
        match state.products.get_mut(&id) {
            Some(product) if product.stock >= quantity as i64 => {
                product.stock -= quantity as i64;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn increment_stock(&self, id: ProductId, quantity: u32) -> Result<()> {
        let mut state = self.state.write().unwrap();
        if let Some(product) = state.products.get_mut(&id) {
            product.stock += quantity as i64;
        }
        Ok(())
    }

    async fn reserved_quantity(
        &self,
        product_id: ProductId,
        exclude_cart: Option<CartId>,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        let state = self.state.read().unwrap();
        Ok(state
            .cart_items
            .values()
            .filter(|item| item.product_id == product_id)
            .filter(|item| Some(item.cart_id) != exclude_cart)
            .filter(|item| item.is_reservation_active(now))
            .map(|item| item.quantity as i64)
            .sum())
    }

    async fn insert_cart(&self, cart: &Cart) -> Result<()> {
        let mut state = self.state.write().unwrap();
        if let Some(user_id) = cart.user_id
            && state.carts.values().any(|c| c.user_id == Some(user_id))
        {
            return Err(StoreError::Conflict {
                constraint: "carts_one_per_user".to_string(),
            });
        }
        state.carts.insert(cart.id, cart.clone());
        Ok(())
    }

    async fn get_cart(&self, id: CartId) -> Result<Option<Cart>> {
        Ok(self.state.read().unwrap().carts.get(&id).cloned())
    }

    async fn find_cart_by_user(&self, user_id: UserId) -> Result<Option<Cart>> {
        let state = self.state.read().unwrap();
        Ok(state
            .carts
            .values()
            .find(|c| c.user_id == Some(user_id))
            .cloned())
    }

    async fn find_latest_cart_by_session(
        &self,
        session_id: &SessionId,
        now: DateTime<Utc>,
    ) -> Result<Option<Cart>> {
        let state = self.state.read().unwrap();
        Ok(state
            .carts
            .values()
            .filter(|c| c.session_id.as_ref() == Some(session_id))
            .filter(|c| !c.is_expired(now))
            .max_by_key(|c| c.created_at)
            .cloned())
    }

    async fn delete_cart(&self, id: CartId) -> Result<()> {
        let mut state = self.state.write().unwrap();
        state.carts.remove(&id);
        state.cart_items.retain(|(cart_id, _), _| *cart_id != id);
        Ok(())
    }

    async fn upsert_cart_item(&self, item: &CartItem) -> Result<()> {
        self.state
            .write()
            .unwrap()
            .cart_items
            .insert((item.cart_id, item.product_id), item.clone());
        Ok(())
    }

    async fn get_cart_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<Option<CartItem>> {
        Ok(self
            .state
            .read()
            .unwrap()
            .cart_items
            .get(&(cart_id, product_id))
            .cloned())
    }

    async fn list_cart_items(&self, cart_id: CartId) -> Result<Vec<CartItem>> {
        let state = self.state.read().unwrap();
        Ok(state
            .cart_items
            .values()
            .filter(|item| item.cart_id == cart_id)
            .cloned()
            .collect())
    }

    async fn delete_cart_item(&self, cart_id: CartId, product_id: ProductId) -> Result<()> {
        self.state
            .write()
            .unwrap()
            .cart_items
            .remove(&(cart_id, product_id));
        Ok(())
    }

    async fn delete_cart_items(&self, cart_id: CartId) -> Result<()> {
        self.state
            .write()
            .unwrap()
            .cart_items
            .retain(|(id, _), _| *id != cart_id);
        Ok(())
    }

    async fn delete_expired_cart_items(&self, cart_id: CartId, now: DateTime<Utc>) -> Result<u64> {
        let mut state = self.state.write().unwrap();
        let before = state.cart_items.len();
        state
            .cart_items
            .retain(|(id, _), item| *id != cart_id || item.is_reservation_active(now));
        Ok((before - state.cart_items.len()) as u64)
    }

    async fn delete_out_of_stock_cart_items(&self, cart_id: CartId) -> Result<u64> {
        let mut state = self.state.write().unwrap();
        let empty: Vec<ProductId> = state
            .cart_items
            .values()
            .filter(|item| item.cart_id == cart_id)
            .filter(|item| {
                state
                    .products
                    .get(&item.product_id)
                    .is_none_or(|p| p.stock <= 0)
            })
            .map(|item| item.product_id)
            .collect();
        for product_id in &empty {
            state.cart_items.remove(&(cart_id, *product_id));
        }
        Ok(empty.len() as u64)
    }

    async fn insert_address(&self, address: &Address) -> Result<()> {
        self.state
            .write()
            .unwrap()
            .addresses
            .insert(address.id, address.clone());
        Ok(())
    }

    async fn get_address(&self, id: AddressId) -> Result<Option<Address>> {
        Ok(self.state.read().unwrap().addresses.get(&id).cloned())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.read().unwrap().orders.get(&id).cloned())
    }

    async fn list_parent_orders_by_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let state = self.state.read().unwrap();
        let mut orders: Vec<_> = state
            .orders
            .values()
            .filter(|o| o.is_parent && o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn list_sub_orders(&self, parent_order_id: OrderId) -> Result<Vec<Order>> {
        let state = self.state.read().unwrap();
        Ok(state
            .orders
            .values()
            .filter(|o| o.parent_order_id == Some(parent_order_id))
            .cloned()
            .collect())
    }

    async fn list_sub_orders_by_seller(&self, seller_id: SellerId) -> Result<Vec<Order>> {
        let state = self.state.read().unwrap();
        let mut orders: Vec<_> = state
            .orders
            .values()
            .filter(|o| o.seller_id == Some(seller_id))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn list_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let state = self.state.read().unwrap();
        Ok(state
            .order_items
            .values()
            .filter(|item| item.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn get_order_item(&self, id: OrderItemId) -> Result<Option<OrderItem>> {
        Ok(self.state.read().unwrap().order_items.get(&id).cloned())
    }

    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        Ok(Box::new(InMemoryTx {
            state: self.state.clone(),
            undo: Vec::new(),
            finished: false,
        }))
    }
}

enum UndoOp {
    /// Add `delta` back onto the product's stock.
    StockDelta { product_id: ProductId, delta: i64 },
    RemoveOrder(OrderId),
    RemoveOrderItem(OrderItemId),
    RestoreOrderStatus {
        id: OrderId,
        status: OrderStatus,
        payment_status: PaymentStatus,
    },
    RestoreOrderItemStatus {
        id: OrderItemId,
        status: OrderStatus,
    },
    RestoreCartItems(Vec<CartItem>),
}

struct InMemoryTx {
    state: Arc<RwLock<State>>,
    undo: Vec<UndoOp>,
    finished: bool,
}

impl InMemoryTx {
    fn apply_undo(state: &Arc<RwLock<State>>, undo: &mut Vec<UndoOp>) {
        let mut state = state.write().unwrap();
        for op in undo.drain(..).rev() {
            match op {
                UndoOp::StockDelta { product_id, delta } => {
                    if let Some(product) = state.products.get_mut(&product_id) {
                        product.stock += delta;
                    }
                }
                UndoOp::RemoveOrder(id) => {
                    state.orders.remove(&id);
                }
                UndoOp::RemoveOrderItem(id) => {
                    state.order_items.remove(&id);
                }
                UndoOp::RestoreOrderStatus {
                    id,
                    status,
                    payment_status,
                } => {
                    if let Some(order) = state.orders.get_mut(&id) {
                        order.status = status;
                        order.payment_status = payment_status;
                    }
                }
                UndoOp::RestoreOrderItemStatus { id, status } => {
                    if let Some(item) = state.order_items.get_mut(&id) {
                        item.status = status;
                    }
                }
                UndoOp::RestoreCartItems(items) => {
                    for item in items {
                        state.cart_items.insert((item.cart_id, item.product_id), item);
                    }
                }
            }
        }
    }
}

impl Drop for InMemoryTx {
    fn drop(&mut self) {
        if !self.finished {
            Self::apply_undo(&self.state, &mut self.undo);
        }
    }
}

#[async_trait]
impl StoreTx for InMemoryTx {
    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.state.read().unwrap().products.get(&id).cloned())
    }

    async fn decrement_stock(&mut self, id: ProductId, quantity: u32) -> Result<bool> {
        let decremented = {
            let mut state = self.state.write().unwrap();
            match state.products.get_mut(&id) {
                Some(product) if product.stock >= quantity as i64 => {
                    product.stock -= quantity as i64;
                    true
                }
                _ => false,
            }
        };
        if decremented {
            self.undo.push(UndoOp::StockDelta {
                product_id: id,
                delta: quantity as i64,
            });
        }
        Ok(decremented)
    }

    async fn increment_stock(&mut self, id: ProductId, quantity: u32) -> Result<()> {
        let incremented = {
            let mut state = self.state.write().unwrap();
            match state.products.get_mut(&id) {
                Some(product) => {
                    product.stock += quantity as i64;
                    true
                }
                None => false,
            }
        };
        if incremented {
            self.undo.push(UndoOp::StockDelta {
                product_id: id,
                delta: -(quantity as i64),
            });
        }
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        self.state
            .write()
            .unwrap()
            .orders
            .insert(order.id, order.clone());
        self.undo.push(UndoOp::RemoveOrder(order.id));
        Ok(())
    }

    async fn insert_order_item(&mut self, item: &OrderItem) -> Result<()> {
        self.state
            .write()
            .unwrap()
            .order_items
            .insert(item.id, item.clone());
        self.undo.push(UndoOp::RemoveOrderItem(item.id));
        Ok(())
    }

    async fn update_order_status(
        &mut self,
        id: OrderId,
        status: OrderStatus,
        payment_status: PaymentStatus,
    ) -> Result<()> {
        let previous = {
            let mut state = self.state.write().unwrap();
            state.orders.get_mut(&id).map(|order| {
                let previous = (order.status, order.payment_status);
                order.status = status;
                order.payment_status = payment_status;
                previous
            })
        };
        if let Some((status, payment_status)) = previous {
            self.undo.push(UndoOp::RestoreOrderStatus {
                id,
                status,
                payment_status,
            });
        }
        Ok(())
    }

    async fn update_order_item_status(
        &mut self,
        id: OrderItemId,
        status: OrderStatus,
    ) -> Result<()> {
        let previous = {
            let mut state = self.state.write().unwrap();
            state.order_items.get_mut(&id).map(|item| {
                let previous = item.status;
                item.status = status;
                previous
            })
        };
        if let Some(status) = previous {
            self.undo
                .push(UndoOp::RestoreOrderItemStatus { id, status });
        }
        Ok(())
    }

    async fn update_order_items_status(
        &mut self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let mut previous = Vec::new();
        for item in state.order_items.values_mut() {
            if item.order_id == order_id {
                previous.push((item.id, item.status));
                item.status = status;
            }
        }
        drop(state);
        for (id, status) in previous {
            self.undo.push(UndoOp::RestoreOrderItemStatus { id, status });
        }
        Ok(())
    }

    async fn delete_cart_items(&mut self, cart_id: CartId) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let removed: Vec<CartItem> = state
            .cart_items
            .values()
            .filter(|item| item.cart_id == cart_id)
            .cloned()
            .collect();
        state.cart_items.retain(|(id, _), _| *id != cart_id);
        drop(state);
        if !removed.is_empty() {
            self.undo.push(UndoOp::RestoreCartItems(removed));
        }
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<()> {
        self.finished = true;
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<()> {
        Self::apply_undo(&self.state, &mut self.undo);
        self.finished = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Money;

    fn product(stock: i64) -> Product {
        Product::new(
            "Widget",
            Money::from_cents(1000),
            stock,
            "tools",
            SellerId::new(),
        )
    }

    #[tokio::test]
    async fn test_conditional_decrement_boundary() {
        let store = InMemoryStore::new();
        let p = product(2);
        store.insert_product(&p).await.unwrap();

        assert!(store.decrement_stock(p.id, 2).await.unwrap());
        assert!(!store.decrement_stock(p.id, 1).await.unwrap());
        assert_eq!(store.get_product(p.id).await.unwrap().unwrap().stock, 0);
    }

    #[tokio::test]
    async fn test_one_cart_per_user_constraint() {
        let store = InMemoryStore::new();
        let user = UserId::new();
        store.insert_cart(&Cart::for_user(user)).await.unwrap();

        let err = store.insert_cart(&Cart::for_user(user)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { ref constraint } if constraint == "carts_one_per_user"));
    }

    #[tokio::test]
    async fn test_upsert_replaces_quantity() {
        let store = InMemoryStore::new();
        let cart_id = CartId::new();
        let product_id = ProductId::new();

        store
            .upsert_cart_item(&CartItem::new(cart_id, product_id, 5, None))
            .await
            .unwrap();
        store
            .upsert_cart_item(&CartItem::new(cart_id, product_id, 5, None))
            .await
            .unwrap();

        let item = store
            .get_cart_item(cart_id, product_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.quantity, 5);
        assert_eq!(store.list_cart_items(cart_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reserved_quantity_excludes_cart_and_expired() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let product_id = ProductId::new();
        let mine = CartId::new();
        let other = CartId::new();

        store
            .upsert_cart_item(&CartItem::new(
                mine,
                product_id,
                3,
                Some(now + chrono::Duration::minutes(15)),
            ))
            .await
            .unwrap();
        store
            .upsert_cart_item(&CartItem::new(
                other,
                product_id,
                2,
                Some(now + chrono::Duration::minutes(15)),
            ))
            .await
            .unwrap();
        store
            .upsert_cart_item(&CartItem::new(
                CartId::new(),
                product_id,
                7,
                Some(now - chrono::Duration::minutes(1)),
            ))
            .await
            .unwrap();

        assert_eq!(
            store
                .reserved_quantity(product_id, Some(mine), now)
                .await
                .unwrap(),
            2
        );
        assert_eq!(
            store.reserved_quantity(product_id, None, now).await.unwrap(),
            5
        );
    }

    #[tokio::test]
    async fn test_tx_rollback_restores_everything() {
        let store = InMemoryStore::new();
        let p = product(10);
        store.insert_product(&p).await.unwrap();
        let cart_id = CartId::new();
        store
            .upsert_cart_item(&CartItem::new(cart_id, p.id, 2, None))
            .await
            .unwrap();

        let order = Order::parent(UserId::new(), AddressId::new(), Money::from_cents(2000));
        let mut tx = store.begin().await.unwrap();
        tx.insert_order(&order).await.unwrap();
        assert!(tx.decrement_stock(p.id, 2).await.unwrap());
        tx.insert_order_item(&OrderItem::new(
            order.id,
            p.id,
            p.seller_id,
            2,
            Money::from_cents(1000),
        ))
        .await
        .unwrap();
        tx.delete_cart_items(cart_id).await.unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(store.get_product(p.id).await.unwrap().unwrap().stock, 10);
        assert_eq!(store.order_count(), 0);
        assert_eq!(store.order_item_count(), 0);
        assert_eq!(store.list_cart_items(cart_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_tx_drop_without_commit_rolls_back() {
        let store = InMemoryStore::new();
        let p = product(5);
        store.insert_product(&p).await.unwrap();

        {
            let mut tx = store.begin().await.unwrap();
            assert!(tx.decrement_stock(p.id, 3).await.unwrap());
        }

        assert_eq!(store.get_product(p.id).await.unwrap().unwrap().stock, 5);
    }

    #[tokio::test]
    async fn test_tx_commit_keeps_writes() {
        let store = InMemoryStore::new();
        let p = product(5);
        store.insert_product(&p).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert!(tx.decrement_stock(p.id, 3).await.unwrap());
        tx.commit().await.unwrap();

        assert_eq!(store.get_product(p.id).await.unwrap().unwrap().stock, 2);
    }

    #[tokio::test]
    async fn test_session_cart_resolution_prefers_latest_unexpired() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let session = SessionId::new("sess-1");

        let mut old = Cart::for_session(session.clone(), now + chrono::Duration::hours(24));
        old.created_at = now - chrono::Duration::hours(2);
        let mut newer = Cart::for_session(session.clone(), now + chrono::Duration::hours(24));
        newer.created_at = now - chrono::Duration::hours(1);
        let mut expired = Cart::for_session(session.clone(), now - chrono::Duration::minutes(1));
        expired.created_at = now;

        store.insert_cart(&old).await.unwrap();
        store.insert_cart(&newer).await.unwrap();
        store.insert_cart(&expired).await.unwrap();

        let found = store
            .find_latest_cart_by_session(&session, now)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, newer.id);
    }

    #[tokio::test]
    async fn test_sweep_helpers_remove_rows() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let cart_id = CartId::new();

        let gone = product(0);
        let live = product(5);
        store.insert_product(&gone).await.unwrap();
        store.insert_product(&live).await.unwrap();

        store
            .upsert_cart_item(&CartItem::new(
                cart_id,
                gone.id,
                1,
                Some(now + chrono::Duration::minutes(10)),
            ))
            .await
            .unwrap();
        store
            .upsert_cart_item(&CartItem::new(
                cart_id,
                live.id,
                1,
                Some(now - chrono::Duration::minutes(10)),
            ))
            .await
            .unwrap();

        assert_eq!(
            store.delete_out_of_stock_cart_items(cart_id).await.unwrap(),
            1
        );
        assert_eq!(
            store
                .delete_expired_cart_items(cart_id, now)
                .await
                .unwrap(),
            1
        );
        assert!(store.list_cart_items(cart_id).await.unwrap().is_empty());
    }
}
