//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration
//! ```

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{Money, SellerId, UserId};
use domain::{Address, Cart, CartItem, Order, OrderItem, OrderStatus, PaymentStatus, Product};
use serial_test::serial;
use sqlx::postgres::PgPoolOptions;
use store::{CommerceStore, PostgresStore, StoreError};
use testcontainers::{runners::AsyncRunner, ContainerAsync};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

async fn get_store() -> PostgresStore {
    let info = get_container_info().await;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();
    let store = PostgresStore::new(pool);
    store.run_migrations().await.unwrap();
    store
}

async fn seed_product(store: &PostgresStore, stock: i64) -> Product {
    let product = Product::new(
        "Widget",
        Money::from_cents(1000),
        stock,
        "tools",
        SellerId::new(),
    );
    store.insert_product(&product).await.unwrap();
    product
}

#[tokio::test]
#[serial]
async fn test_conditional_decrement_boundary() {
    let store = get_store().await;
    let product = seed_product(&store, 2).await;

    assert!(store.decrement_stock(product.id, 2).await.unwrap());
    assert!(!store.decrement_stock(product.id, 1).await.unwrap());
    assert_eq!(
        store.get_product(product.id).await.unwrap().unwrap().stock,
        0
    );

    store.increment_stock(product.id, 3).await.unwrap();
    assert_eq!(
        store.get_product(product.id).await.unwrap().unwrap().stock,
        3
    );
}

#[tokio::test]
#[serial]
async fn test_user_cart_uniqueness_maps_to_conflict() {
    let store = get_store().await;
    let user = UserId::new();

    store.insert_cart(&Cart::for_user(user)).await.unwrap();
    let err = store.insert_cart(&Cart::for_user(user)).await.unwrap_err();
    assert!(
        matches!(err, StoreError::Conflict { ref constraint } if constraint == "carts_one_per_user")
    );
}

#[tokio::test]
#[serial]
async fn test_cart_item_upsert_and_reserved_sum() {
    let store = get_store().await;
    let now = Utc::now();
    let product = seed_product(&store, 10).await;

    let user_a = UserId::new();
    let user_b = UserId::new();
    let cart_a = Cart::for_user(user_a);
    let cart_b = Cart::for_user(user_b);
    store.insert_cart(&cart_a).await.unwrap();
    store.insert_cart(&cart_b).await.unwrap();

    store
        .upsert_cart_item(&CartItem::new(
            cart_a.id,
            product.id,
            5,
            Some(now + Duration::minutes(15)),
        ))
        .await
        .unwrap();
    // Replacement, not addition.
    store
        .upsert_cart_item(&CartItem::new(
            cart_a.id,
            product.id,
            3,
            Some(now + Duration::minutes(15)),
        ))
        .await
        .unwrap();
    store
        .upsert_cart_item(&CartItem::new(
            cart_b.id,
            product.id,
            2,
            Some(now - Duration::minutes(1)),
        ))
        .await
        .unwrap();

    // Expired holds don't count; exclusion removes the caller's cart.
    assert_eq!(
        store
            .reserved_quantity(product.id, None, now)
            .await
            .unwrap(),
        3
    );
    assert_eq!(
        store
            .reserved_quantity(product.id, Some(cart_a.id), now)
            .await
            .unwrap(),
        0
    );

    assert_eq!(
        store
            .delete_expired_cart_items(cart_b.id, now)
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
#[serial]
async fn test_transaction_rollback_leaves_no_trace() {
    let store = get_store().await;
    let product = seed_product(&store, 10).await;

    let user = UserId::new();
    let address = Address::new(user, "A. Buyer", "1 Main St", "Springfield", "12345");
    store.insert_address(&address).await.unwrap();

    let order = Order::parent(user, address.id, Money::from_cents(2000));
    let mut tx = store.begin().await.unwrap();
    tx.insert_order(&order).await.unwrap();
    assert!(tx.decrement_stock(product.id, 2).await.unwrap());
    tx.insert_order_item(&OrderItem::new(
        order.id,
        product.id,
        product.seller_id,
        2,
        Money::from_cents(1000),
    ))
    .await
    .unwrap();
    tx.rollback().await.unwrap();

    assert_eq!(
        store.get_product(product.id).await.unwrap().unwrap().stock,
        10
    );
    assert!(store.get_order(order.id).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn test_order_tree_roundtrip() {
    let store = get_store().await;
    let product = seed_product(&store, 10).await;

    let user = UserId::new();
    let address = Address::new(user, "A. Buyer", "1 Main St", "Springfield", "12345");
    store.insert_address(&address).await.unwrap();

    let parent = Order::parent(user, address.id, Money::from_cents(3000));
    let seller = product.seller_id;
    let sub = Order::sub_order(&parent, seller, Money::from_cents(3000));
    let item = OrderItem::new(sub.id, product.id, seller, 3, Money::from_cents(1000));

    let mut tx = store.begin().await.unwrap();
    tx.insert_order(&parent).await.unwrap();
    tx.insert_order(&sub).await.unwrap();
    tx.insert_order_item(&item).await.unwrap();
    tx.update_order_status(sub.id, OrderStatus::Confirmed, PaymentStatus::Paid)
        .await
        .unwrap();
    tx.update_order_items_status(sub.id, OrderStatus::Confirmed)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let fetched_parent = store.get_order(parent.id).await.unwrap().unwrap();
    assert!(fetched_parent.is_parent);
    assert_eq!(fetched_parent.total_amount, Money::from_cents(3000));

    let subs = store.list_sub_orders(parent.id).await.unwrap();
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].status, OrderStatus::Confirmed);
    assert_eq!(subs[0].payment_status, PaymentStatus::Paid);
    assert_eq!(subs[0].seller_id, Some(seller));

    let items = store.list_order_items(sub.id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].status, OrderStatus::Confirmed);
    assert_eq!(items[0].unit_price, Money::from_cents(1000));

    let by_seller = store.list_sub_orders_by_seller(seller).await.unwrap();
    assert_eq!(by_seller.len(), 1);
}

#[tokio::test]
#[serial]
async fn test_session_cart_resolution() {
    let store = get_store().await;
    let now = Utc::now();
    let session = common::SessionId::new(format!("sess-{}", uuid::Uuid::new_v4()));

    let expired = Cart::for_session(session.clone(), now - Duration::minutes(1));
    store.insert_cart(&expired).await.unwrap();
    assert!(store
        .find_latest_cart_by_session(&session, now)
        .await
        .unwrap()
        .is_none());

    let live = Cart::for_session(session.clone(), now + Duration::hours(24));
    store.insert_cart(&live).await.unwrap();
    let found = store
        .find_latest_cart_by_session(&session, now)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, live.id);

    store.delete_cart(live.id).await.unwrap();
    assert!(store.get_cart(live.id).await.unwrap().is_none());
}
