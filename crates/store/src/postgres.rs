//! PostgreSQL-backed store implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    AddressId, CartId, Money, OrderId, OrderItemId, ProductId, SellerId, SessionId, UserId,
};
use domain::{Address, Cart, CartItem, Order, OrderItem, OrderStatus, PaymentStatus, Product};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::store::{CommerceStore, StoreTx};

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }
}

fn row_to_product(row: PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
        name: row.try_get("name")?,
        price: Money::from_cents(row.try_get::<i64, _>("price_cents")?),
        stock: row.try_get("stock")?,
        category: row.try_get("category")?,
        seller_id: SellerId::from_uuid(row.try_get::<Uuid, _>("seller_id")?),
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_cart(row: PgRow) -> Result<Cart> {
    Ok(Cart {
        id: CartId::from_uuid(row.try_get::<Uuid, _>("id")?),
        user_id: row
            .try_get::<Option<Uuid>, _>("user_id")?
            .map(UserId::from_uuid),
        session_id: row
            .try_get::<Option<String>, _>("session_id")?
            .map(SessionId::from),
        expires_at: row.try_get("expires_at")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_cart_item(row: PgRow) -> Result<CartItem> {
    Ok(CartItem {
        cart_id: CartId::from_uuid(row.try_get::<Uuid, _>("cart_id")?),
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        quantity: row.try_get::<i32, _>("quantity")? as u32,
        reservation_expires_at: row.try_get("reservation_expires_at")?,
    })
}

fn row_to_address(row: PgRow) -> Result<Address> {
    Ok(Address {
        id: AddressId::from_uuid(row.try_get::<Uuid, _>("id")?),
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
        recipient: row.try_get("recipient")?,
        line1: row.try_get("line1")?,
        city: row.try_get("city")?,
        postal_code: row.try_get("postal_code")?,
    })
}

fn row_to_order(row: PgRow) -> Result<Order> {
    Ok(Order {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
        address_id: AddressId::from_uuid(row.try_get::<Uuid, _>("address_id")?),
        parent_order_id: row
            .try_get::<Option<Uuid>, _>("parent_order_id")?
            .map(OrderId::from_uuid),
        seller_id: row
            .try_get::<Option<Uuid>, _>("seller_id")?
            .map(SellerId::from_uuid),
        total_amount: Money::from_cents(row.try_get::<i64, _>("total_cents")?),
        status: row.try_get::<String, _>("status")?.parse::<OrderStatus>()?,
        payment_status: row
            .try_get::<String, _>("payment_status")?
            .parse::<PaymentStatus>()?,
        is_parent: row.try_get("is_parent")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_order_item(row: PgRow) -> Result<OrderItem> {
    Ok(OrderItem {
        id: OrderItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        seller_id: SellerId::from_uuid(row.try_get::<Uuid, _>("seller_id")?),
        quantity: row.try_get::<i32, _>("quantity")? as u32,
        unit_price: Money::from_cents(row.try_get::<i64, _>("unit_price_cents")?),
        status: row.try_get::<String, _>("status")?.parse::<OrderStatus>()?,
    })
}

async fn fetch_product(
    executor: impl sqlx::PgExecutor<'_>,
    id: ProductId,
) -> Result<Option<Product>> {
    let row = sqlx::query(
        "SELECT id, name, price_cents, stock, category, seller_id, created_at \
         FROM products WHERE id = $1",
    )
    .bind(id.as_uuid())
    .fetch_optional(executor)
    .await?;
    row.map(row_to_product).transpose()
}

async fn exec_decrement_stock(
    executor: impl sqlx::PgExecutor<'_>,
    id: ProductId,
    quantity: u32,
) -> Result<bool> {
    let result = sqlx::query("UPDATE products SET stock = stock - $2 WHERE id = $1 AND stock >= $2")
        .bind(id.as_uuid())
        .bind(quantity as i64)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() == 1)
}

async fn exec_increment_stock(
    executor: impl sqlx::PgExecutor<'_>,
    id: ProductId,
    quantity: u32,
) -> Result<()> {
    sqlx::query("UPDATE products SET stock = stock + $2 WHERE id = $1")
        .bind(id.as_uuid())
        .bind(quantity as i64)
        .execute(executor)
        .await?;
    Ok(())
}

#[async_trait]
impl CommerceStore for PostgresStore {
    async fn insert_product(&self, product: &Product) -> Result<()> {
        sqlx::query(
            "INSERT INTO products (id, name, price_cents, stock, category, seller_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(product.price.cents())
        .bind(product.stock)
        .bind(&product.category)
        .bind(product.seller_id.as_uuid())
        .bind(product.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        fetch_product(&self.pool, id).await
    }

    async fn decrement_stock(&self, id: ProductId, quantity: u32) -> Result<bool> {
        exec_decrement_stock(&self.pool, id, quantity).await
    }

    async fn increment_stock(&self, id: ProductId, quantity: u32) -> Result<()> {
        exec_increment_stock(&self.pool, id, quantity).await
    }

    async fn reserved_quantity(
        &self,
        product_id: ProductId,
        exclude_cart: Option<CartId>,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        let sum: Option<i64> = sqlx::query_scalar(
            "SELECT SUM(quantity)::BIGINT FROM cart_items \
             WHERE product_id = $1 \
               AND ($2::UUID IS NULL OR cart_id <> $2) \
               AND (reservation_expires_at IS NULL OR reservation_expires_at > $3)",
        )
        .bind(product_id.as_uuid())
        .bind(exclude_cart.map(|c| c.as_uuid()))
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(sum.unwrap_or(0))
    }

    async fn insert_cart(&self, cart: &Cart) -> Result<()> {
        sqlx::query(
            "INSERT INTO carts (id, user_id, session_id, expires_at, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(cart.id.as_uuid())
        .bind(cart.user_id.map(|u| u.as_uuid()))
        .bind(cart.session_id.as_ref().map(|s| s.as_str()))
        .bind(cart.expires_at)
        .bind(cart.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("carts_one_per_user")
            {
                return StoreError::Conflict {
                    constraint: "carts_one_per_user".to_string(),
                };
            }
            StoreError::Database(e)
        })?;
        Ok(())
    }

    async fn get_cart(&self, id: CartId) -> Result<Option<Cart>> {
        let row = sqlx::query(
            "SELECT id, user_id, session_id, expires_at, created_at FROM carts WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_cart).transpose()
    }

    async fn find_cart_by_user(&self, user_id: UserId) -> Result<Option<Cart>> {
        let row = sqlx::query(
            "SELECT id, user_id, session_id, expires_at, created_at \
             FROM carts WHERE user_id = $1",
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_cart).transpose()
    }

    async fn find_latest_cart_by_session(
        &self,
        session_id: &SessionId,
        now: DateTime<Utc>,
    ) -> Result<Option<Cart>> {
        let row = sqlx::query(
            "SELECT id, user_id, session_id, expires_at, created_at \
             FROM carts \
             WHERE session_id = $1 AND (expires_at IS NULL OR expires_at > $2) \
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(session_id.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_cart).transpose()
    }

    async fn delete_cart(&self, id: CartId) -> Result<()> {
        sqlx::query("DELETE FROM carts WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn upsert_cart_item(&self, item: &CartItem) -> Result<()> {
        sqlx::query(
            "INSERT INTO cart_items (cart_id, product_id, quantity, reservation_expires_at) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (cart_id, product_id) DO UPDATE \
             SET quantity = EXCLUDED.quantity, \
                 reservation_expires_at = EXCLUDED.reservation_expires_at",
        )
        .bind(item.cart_id.as_uuid())
        .bind(item.product_id.as_uuid())
        .bind(item.quantity as i32)
        .bind(item.reservation_expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_cart_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<Option<CartItem>> {
        let row = sqlx::query(
            "SELECT cart_id, product_id, quantity, reservation_expires_at \
             FROM cart_items WHERE cart_id = $1 AND product_id = $2",
        )
        .bind(cart_id.as_uuid())
        .bind(product_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_cart_item).transpose()
    }

    async fn list_cart_items(&self, cart_id: CartId) -> Result<Vec<CartItem>> {
        let rows = sqlx::query(
            "SELECT cart_id, product_id, quantity, reservation_expires_at \
             FROM cart_items WHERE cart_id = $1",
        )
        .bind(cart_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_cart_item).collect()
    }

    async fn delete_cart_item(&self, cart_id: CartId, product_id: ProductId) -> Result<()> {
        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND product_id = $2")
            .bind(cart_id.as_uuid())
            .bind(product_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_cart_items(&self, cart_id: CartId) -> Result<()> {
        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_expired_cart_items(&self, cart_id: CartId, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM cart_items \
             WHERE cart_id = $1 \
               AND reservation_expires_at IS NOT NULL \
               AND reservation_expires_at <= $2",
        )
        .bind(cart_id.as_uuid())
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_out_of_stock_cart_items(&self, cart_id: CartId) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM cart_items \
             WHERE cart_id = $1 \
               AND product_id IN (SELECT id FROM products WHERE stock <= 0)",
        )
        .bind(cart_id.as_uuid())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn insert_address(&self, address: &Address) -> Result<()> {
        sqlx::query(
            "INSERT INTO addresses (id, user_id, recipient, line1, city, postal_code) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(address.id.as_uuid())
        .bind(address.user_id.as_uuid())
        .bind(&address.recipient)
        .bind(&address.line1)
        .bind(&address.city)
        .bind(&address.postal_code)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_address(&self, id: AddressId) -> Result<Option<Address>> {
        let row = sqlx::query(
            "SELECT id, user_id, recipient, line1, city, postal_code FROM addresses WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_address).transpose()
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(
            "SELECT id, user_id, address_id, parent_order_id, seller_id, total_cents, \
                    status, payment_status, is_parent, created_at \
             FROM orders WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_order).transpose()
    }

    async fn list_parent_orders_by_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            "SELECT id, user_id, address_id, parent_order_id, seller_id, total_cents, \
                    status, payment_status, is_parent, created_at \
             FROM orders WHERE user_id = $1 AND is_parent ORDER BY created_at DESC",
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_order).collect()
    }

    async fn list_sub_orders(&self, parent_order_id: OrderId) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            "SELECT id, user_id, address_id, parent_order_id, seller_id, total_cents, \
                    status, payment_status, is_parent, created_at \
             FROM orders WHERE parent_order_id = $1",
        )
        .bind(parent_order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_order).collect()
    }

    async fn list_sub_orders_by_seller(&self, seller_id: SellerId) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            "SELECT id, user_id, address_id, parent_order_id, seller_id, total_cents, \
                    status, payment_status, is_parent, created_at \
             FROM orders WHERE seller_id = $1 ORDER BY created_at DESC",
        )
        .bind(seller_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_order).collect()
    }

    async fn list_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query(
            "SELECT id, order_id, product_id, seller_id, quantity, unit_price_cents, status \
             FROM order_items WHERE order_id = $1",
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_order_item).collect()
    }

    async fn get_order_item(&self, id: OrderItemId) -> Result<Option<OrderItem>> {
        let row = sqlx::query(
            "SELECT id, order_id, product_id, seller_id, quantity, unit_price_cents, status \
             FROM order_items WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_order_item).transpose()
    }

    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresTx { tx }))
    }
}

struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PostgresTx {
    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        fetch_product(&mut *self.tx, id).await
    }

    async fn decrement_stock(&mut self, id: ProductId, quantity: u32) -> Result<bool> {
        exec_decrement_stock(&mut *self.tx, id, quantity).await
    }

    async fn increment_stock(&mut self, id: ProductId, quantity: u32) -> Result<()> {
        exec_increment_stock(&mut *self.tx, id, quantity).await
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        sqlx::query(
            "INSERT INTO orders (id, user_id, address_id, parent_order_id, seller_id, \
                                 total_cents, status, payment_status, is_parent, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(order.address_id.as_uuid())
        .bind(order.parent_order_id.map(|o| o.as_uuid()))
        .bind(order.seller_id.map(|s| s.as_uuid()))
        .bind(order.total_amount.cents())
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.is_parent)
        .bind(order.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_order_item(&mut self, item: &OrderItem) -> Result<()> {
        sqlx::query(
            "INSERT INTO order_items (id, order_id, product_id, seller_id, quantity, \
                                      unit_price_cents, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(item.id.as_uuid())
        .bind(item.order_id.as_uuid())
        .bind(item.product_id.as_uuid())
        .bind(item.seller_id.as_uuid())
        .bind(item.quantity as i32)
        .bind(item.unit_price.cents())
        .bind(item.status.as_str())
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_order_status(
        &mut self,
        id: OrderId,
        status: OrderStatus,
        payment_status: PaymentStatus,
    ) -> Result<()> {
        sqlx::query("UPDATE orders SET status = $2, payment_status = $3 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(status.as_str())
            .bind(payment_status.as_str())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn update_order_item_status(
        &mut self,
        id: OrderItemId,
        status: OrderStatus,
    ) -> Result<()> {
        sqlx::query("UPDATE order_items SET status = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn update_order_items_status(
        &mut self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<()> {
        sqlx::query("UPDATE order_items SET status = $2 WHERE order_id = $1")
            .bind(order_id.as_uuid())
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn delete_cart_items(&mut self, cart_id: CartId) -> Result<()> {
        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart_id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
