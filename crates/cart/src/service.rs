//! Cart service: resolution, holds, sweeping, and login-time merge.

use chrono::Utc;
use common::{CartId, Money, ProductId, SessionId, UserId};
use domain::{Cart, CartItem, Product};
use lock::{keys, LockManager, LockStore};
use store::{CommerceStore, StoreError};

use crate::config::CartConfig;
use crate::error::{CartError, Result};

/// Who a cart request acts on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartOwner {
    /// An authenticated user.
    User(UserId),
    /// An anonymous session.
    Session(SessionId),
}

/// One cart line joined with its product.
#[derive(Debug, Clone)]
pub struct CartLine {
    /// The hold itself.
    pub item: CartItem,
    /// The product it holds, with live price and stock.
    pub product: Product,
}

/// A swept, priced view of a cart.
///
/// Prices here are live catalog prices; they are frozen only when the
/// cart converts into an order.
#[derive(Debug, Clone)]
pub struct CartView {
    /// The cart row.
    pub cart: Cart,
    /// Lines surviving the sweep.
    pub lines: Vec<CartLine>,
    /// Sum of line totals at live prices.
    pub subtotal: Money,
}

/// Service for cart reads and hold mutations.
///
/// Every availability check that gates a write runs inside the
/// product's distributed lock, so two processes can't both hold the
/// last unit. Reads are lock-free and self-healing: expired holds and
/// dead products disappear before the caller sees them.
pub struct CartService<S, L> {
    store: S,
    locks: LockManager<L>,
    config: CartConfig,
}

impl<S, L> CartService<S, L>
where
    S: CommerceStore,
    L: LockStore,
{
    /// Creates a cart service with default configuration.
    pub fn new(store: S, locks: LockManager<L>) -> Self {
        Self::with_config(store, locks, CartConfig::default())
    }

    /// Creates a cart service with explicit configuration.
    pub fn with_config(store: S, locks: LockManager<L>, config: CartConfig) -> Self {
        Self {
            store,
            locks,
            config,
        }
    }

    /// Finds the owner's cart, creating one if none exists.
    ///
    /// On a create race (two requests both inserting a user's first
    /// cart) the loser adopts the winner's row instead of failing.
    /// Session carts are keyed by session, expire absolutely, and are
    /// not unique — the most recently created unexpired one wins.
    #[tracing::instrument(skip(self))]
    pub async fn resolve_cart(&self, owner: &CartOwner) -> Result<Cart> {
        match owner {
            CartOwner::User(user_id) => {
                if let Some(cart) = self.store.find_cart_by_user(*user_id).await? {
                    return Ok(cart);
                }
                let cart = Cart::for_user(*user_id);
                match self.store.insert_cart(&cart).await {
                    Ok(()) => Ok(cart),
                    Err(StoreError::Conflict { constraint }) => self
                        .store
                        .find_cart_by_user(*user_id)
                        .await?
                        .ok_or(CartError::Store(StoreError::Conflict { constraint })),
                    Err(e) => Err(e.into()),
                }
            }
            CartOwner::Session(session_id) => {
                let now = Utc::now();
                if let Some(cart) = self
                    .store
                    .find_latest_cart_by_session(session_id, now)
                    .await?
                {
                    return Ok(cart);
                }
                let cart =
                    Cart::for_session(session_id.clone(), now + self.config.anonymous_cart_ttl);
                self.store.insert_cart(&cart).await?;
                Ok(cart)
            }
        }
    }

    /// Removes everything unfulfillable from a cart: the whole cart if
    /// its absolute expiry passed, lines whose reservation lapsed, and
    /// lines whose product is out of stock.
    ///
    /// Returns false if the cart itself was deleted.
    #[tracing::instrument(skip(self, cart), fields(cart_id = %cart.id))]
    pub async fn sweep(&self, cart: &Cart) -> Result<bool> {
        let now = Utc::now();
        if cart.is_expired(now) {
            self.store.delete_cart(cart.id).await?;
            return Ok(false);
        }
        self.store.delete_expired_cart_items(cart.id, now).await?;
        self.store.delete_out_of_stock_cart_items(cart.id).await?;
        Ok(true)
    }

    /// Returns the owner's cart as a swept, priced view.
    #[tracing::instrument(skip(self))]
    pub async fn get_cart(&self, owner: &CartOwner) -> Result<CartView> {
        let cart = self.resolve_cart(owner).await?;
        let cart = if self.sweep(&cart).await? {
            cart
        } else {
            // Expired between resolution and sweep; start fresh.
            self.resolve_cart(owner).await?
        };
        self.view(cart).await
    }

    async fn view(&self, cart: Cart) -> Result<CartView> {
        let items = self.store.list_cart_items(cart.id).await?;
        let mut lines = Vec::with_capacity(items.len());
        let mut subtotal = Money::zero();
        for item in items {
            let Some(product) = self.store.get_product(item.product_id).await? else {
                continue;
            };
            subtotal += product.price.multiply(item.quantity);
            lines.push(CartLine { item, product });
        }
        Ok(CartView {
            cart,
            lines,
            subtotal,
        })
    }

    /// Live availability for a product: authoritative stock minus every
    /// active hold outside `exclude_cart`.
    ///
    /// Advisory when called alone; run inside the product's lock when a
    /// write depends on the answer.
    pub async fn available_quantity(
        &self,
        product_id: ProductId,
        exclude_cart: Option<CartId>,
    ) -> Result<i64> {
        let product = self
            .store
            .get_product(product_id)
            .await?
            .ok_or(CartError::ProductNotFound(product_id))?;
        let reserved = self
            .store
            .reserved_quantity(product_id, exclude_cart, Utc::now())
            .await?;
        Ok(product.stock - reserved)
    }

    /// Sets the held quantity for `(cart, product)`.
    ///
    /// Quantity 0 deletes the line (idempotent) and returns `None`.
    /// Otherwise the quantity REPLACES any existing hold — repeat adds
    /// never sum — and the reservation deadline is refreshed. The
    /// availability check excludes this cart's own existing hold and
    /// runs under the product's lock.
    #[tracing::instrument(skip(self, cart), fields(cart_id = %cart.id))]
    pub async fn upsert_item(
        &self,
        cart: &Cart,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Option<CartItem>> {
        if quantity == 0 {
            self.store.delete_cart_item(cart.id, product_id).await?;
            return Ok(None);
        }

        let cart_id = cart.id;
        let reservation_ttl = self.config.reservation_ttl;
        let key = keys::product_stock(product_id);
        let item = self
            .locks
            .with_lock(&key, move || async move {
                let now = Utc::now();
                let product = self
                    .store
                    .get_product(product_id)
                    .await?
                    .ok_or(CartError::ProductNotFound(product_id))?;
                let reserved = self
                    .store
                    .reserved_quantity(product_id, Some(cart_id), now)
                    .await?;
                let available = product.stock - reserved;
                if (quantity as i64) > available {
                    return Err(CartError::InsufficientStock {
                        product_id,
                        requested: quantity,
                        available: available.max(0),
                    });
                }
                let item = CartItem::new(
                    cart_id,
                    product_id,
                    quantity,
                    Some(now + reservation_ttl),
                );
                self.store.upsert_cart_item(&item).await?;
                Ok(item)
            })
            .await??;
        Ok(Some(item))
    }

    /// Removes one line from a cart. Removing an absent line is a no-op.
    #[tracing::instrument(skip(self, cart), fields(cart_id = %cart.id))]
    pub async fn remove_item(&self, cart: &Cart, product_id: ProductId) -> Result<()> {
        self.store.delete_cart_item(cart.id, product_id).await?;
        Ok(())
    }

    /// Merges the session's anonymous cart into the user's cart at
    /// login, then deletes the anonymous cart.
    ///
    /// Per product, under the product's lock: quantities sum into an
    /// existing destination line (or create one), provided the combined
    /// quantity fits availability computed excluding both carts. A line
    /// that does not fit is dropped whole — no partial fill. Expired
    /// source holds never migrate.
    #[tracing::instrument(skip(self))]
    pub async fn merge_carts(&self, user_id: UserId, session_id: &SessionId) -> Result<Cart> {
        let now = Utc::now();
        let user_cart = self.resolve_cart(&CartOwner::User(user_id)).await?;
        let Some(anon) = self
            .store
            .find_latest_cart_by_session(session_id, now)
            .await?
        else {
            return Ok(user_cart);
        };

        let user_cart_id = user_cart.id;
        let anon_cart_id = anon.id;
        let reservation_ttl = self.config.reservation_ttl;

        for item in self.store.list_cart_items(anon.id).await? {
            if !item.is_reservation_active(now) {
                continue;
            }
            let product_id = item.product_id;
            let source_quantity = item.quantity;
            let key = keys::product_stock(product_id);

            self.locks
                .with_lock(&key, move || async move {
                    let now = Utc::now();
                    let Some(product) = self.store.get_product(product_id).await? else {
                        return Ok(());
                    };

                    let destination = self
                        .store
                        .get_cart_item(user_cart_id, product_id)
                        .await?
                        .filter(|existing| existing.is_reservation_active(now));
                    let destination_quantity =
                        destination.map(|d| d.quantity).unwrap_or(0);

                    // Availability excluding both the source line and the
                    // destination line it would replace.
                    let reserved_elsewhere = self
                        .store
                        .reserved_quantity(product_id, Some(anon_cart_id), now)
                        .await?
                        - destination_quantity as i64;
                    let available = product.stock - reserved_elsewhere;

                    let combined = destination_quantity + source_quantity;
                    if (combined as i64) > available {
                        tracing::debug!(
                            %product_id,
                            combined,
                            available,
                            "dropping cart line that does not fit after merge"
                        );
                        return Ok(());
                    }

                    let merged = CartItem::new(
                        user_cart_id,
                        product_id,
                        combined,
                        Some(now + reservation_ttl),
                    );
                    self.store.upsert_cart_item(&merged).await?;
                    Ok::<(), CartError>(())
                })
                .await??;
        }

        self.store.delete_cart(anon.id).await?;
        Ok(user_cart)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use common::SellerId;
    use lock::InMemoryLockStore;
    use store::InMemoryStore;

    type TestService = CartService<InMemoryStore, InMemoryLockStore>;

    fn setup() -> (TestService, InMemoryStore) {
        let store = InMemoryStore::new();
        let locks = LockManager::new(InMemoryLockStore::new());
        (CartService::new(store.clone(), locks), store)
    }

    async fn seed_product(store: &InMemoryStore, stock: i64) -> Product {
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
    async fn test_resolve_creates_then_reuses_user_cart() {
        let (service, _) = setup();
        let owner = CartOwner::User(UserId::new());

        let first = service.resolve_cart(&owner).await.unwrap();
        let second = service.resolve_cart(&owner).await.unwrap();
        assert_eq!(first.id, second.id);
        assert!(first.expires_at.is_none());
    }

    #[tokio::test]
    async fn test_resolve_session_cart_expires_and_recreates() {
        let (service, store) = setup();
        let session = SessionId::new("sess-1");
        let owner = CartOwner::Session(session.clone());

        let first = service.resolve_cart(&owner).await.unwrap();
        assert!(first.expires_at.is_some());

        // Force the cart past its absolute expiry.
        let mut expired = first.clone();
        expired.expires_at = Some(Utc::now() - Duration::minutes(1));
        store.delete_cart(first.id).await.unwrap();
        store.insert_cart(&expired).await.unwrap();

        let second = service.resolve_cart(&owner).await.unwrap();
        assert_ne!(second.id, first.id);
    }

    #[tokio::test]
    async fn test_upsert_holds_within_availability() {
        let (service, store) = setup();
        let product = seed_product(&store, 5).await;
        let cart = service
            .resolve_cart(&CartOwner::User(UserId::new()))
            .await
            .unwrap();

        let item = service
            .upsert_item(&cart, product.id, 3)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.quantity, 3);
        assert!(item.reservation_expires_at.is_some());
        // The hold is soft: authoritative stock is untouched.
        assert_eq!(store.get_product(product.id).await.unwrap().unwrap().stock, 5);
    }

    #[tokio::test]
    async fn test_repeat_add_replaces_quantity() {
        let (service, store) = setup();
        let product = seed_product(&store, 10).await;
        let cart = service
            .resolve_cart(&CartOwner::User(UserId::new()))
            .await
            .unwrap();

        service.upsert_item(&cart, product.id, 5).await.unwrap();
        let item = service
            .upsert_item(&cart, product.id, 5)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(item.quantity, 5);
        let stored = store
            .get_cart_item(cart.id, product.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.quantity, 5);
    }

    #[tokio::test]
    async fn test_upsert_rejects_when_others_hold_stock() {
        let (service, store) = setup();
        let product = seed_product(&store, 5).await;

        let other = service
            .resolve_cart(&CartOwner::Session(SessionId::new("other")))
            .await
            .unwrap();
        service.upsert_item(&other, product.id, 3).await.unwrap();

        let cart = service
            .resolve_cart(&CartOwner::User(UserId::new()))
            .await
            .unwrap();
        let err = service.upsert_item(&cart, product.id, 3).await.unwrap_err();
        match err {
            CartError::InsufficientStock {
                requested,
                available,
                ..
            } => {
                assert_eq!(requested, 3);
                assert_eq!(available, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_upsert_excludes_own_existing_hold() {
        let (service, store) = setup();
        let product = seed_product(&store, 5).await;
        let cart = service
            .resolve_cart(&CartOwner::User(UserId::new()))
            .await
            .unwrap();

        service.upsert_item(&cart, product.id, 5).await.unwrap();
        // Replacing our own full-stock hold with the same quantity fits.
        let item = service
            .upsert_item(&cart, product.id, 5)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.quantity, 5);
    }

    #[tokio::test]
    async fn test_zero_quantity_deletes_idempotently() {
        let (service, store) = setup();
        let product = seed_product(&store, 5).await;
        let cart = service
            .resolve_cart(&CartOwner::User(UserId::new()))
            .await
            .unwrap();

        service.upsert_item(&cart, product.id, 2).await.unwrap();
        assert!(service.upsert_item(&cart, product.id, 0).await.unwrap().is_none());
        assert!(service.upsert_item(&cart, product.id, 0).await.unwrap().is_none());
        assert!(store
            .get_cart_item(cart.id, product.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_expired_hold_vanishes_from_reads() {
        let (service, store) = setup();
        let product = seed_product(&store, 5).await;
        let owner = CartOwner::User(UserId::new());
        let cart = service.resolve_cart(&owner).await.unwrap();

        store
            .upsert_cart_item(&CartItem::new(
                cart.id,
                product.id,
                2,
                Some(Utc::now() - Duration::minutes(1)),
            ))
            .await
            .unwrap();

        let view = service.get_cart(&owner).await.unwrap();
        assert!(view.lines.is_empty());
        assert!(store
            .get_cart_item(cart.id, product.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_out_of_stock_line_vanishes_from_reads() {
        let (service, store) = setup();
        let product = seed_product(&store, 3).await;
        let owner = CartOwner::User(UserId::new());
        let cart = service.resolve_cart(&owner).await.unwrap();

        service.upsert_item(&cart, product.id, 2).await.unwrap();
        // Someone else buys out the stock.
        assert!(store.decrement_stock(product.id, 3).await.unwrap());

        let view = service.get_cart(&owner).await.unwrap();
        assert!(view.lines.is_empty());
    }

    #[tokio::test]
    async fn test_view_prices_are_live() {
        let (service, store) = setup();
        let product = seed_product(&store, 5).await;
        let owner = CartOwner::User(UserId::new());
        let cart = service.resolve_cart(&owner).await.unwrap();

        service.upsert_item(&cart, product.id, 3).await.unwrap();
        let view = service.get_cart(&owner).await.unwrap();
        assert_eq!(view.subtotal, Money::from_cents(3000));
        assert_eq!(view.lines.len(), 1);
    }

    #[tokio::test]
    async fn test_merge_sums_when_it_fits() {
        let (service, store) = setup();
        let product = seed_product(&store, 5).await;
        let user = UserId::new();
        let session = SessionId::new("sess-merge");

        let user_cart = service
            .resolve_cart(&CartOwner::User(user))
            .await
            .unwrap();
        service.upsert_item(&user_cart, product.id, 3).await.unwrap();

        let anon_cart = service
            .resolve_cart(&CartOwner::Session(session.clone()))
            .await
            .unwrap();
        // The session only sees what the user cart left over.
        service.upsert_item(&anon_cart, product.id, 2).await.unwrap();

        let merged_into = service.merge_carts(user, &session).await.unwrap();
        assert_eq!(merged_into.id, user_cart.id);

        let merged = store
            .get_cart_item(user_cart.id, product.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(merged.quantity, 5);
        // The anonymous cart is gone.
        assert!(store.get_cart(anon_cart.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_merge_drops_lines_that_do_not_fit() {
        let (service, store) = setup();
        let product = seed_product(&store, 4).await;
        let user = UserId::new();
        let session = SessionId::new("sess-overflow");

        let user_cart = service
            .resolve_cart(&CartOwner::User(user))
            .await
            .unwrap();
        service.upsert_item(&user_cart, product.id, 3).await.unwrap();

        let anon_cart = service
            .resolve_cart(&CartOwner::Session(session.clone()))
            .await
            .unwrap();
        service.upsert_item(&anon_cart, product.id, 1).await.unwrap();
        // Stock shrinks after the anonymous hold was taken.
        assert!(store.decrement_stock(product.id, 1).await.unwrap());

        service.merge_carts(user, &session).await.unwrap();

        // 3 + 1 = 4 does not fit in the remaining 3; the source line is
        // dropped whole and the destination is untouched.
        let destination = store
            .get_cart_item(user_cart.id, product.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(destination.quantity, 3);
        assert!(store.get_cart(anon_cart.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_merge_without_anonymous_cart_is_a_noop() {
        let (service, store) = setup();
        let user = UserId::new();

        let cart = service
            .merge_carts(user, &SessionId::new("never-used"))
            .await
            .unwrap();
        assert_eq!(cart.user_id, Some(user));
        assert!(store.get_cart(cart.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_available_quantity_subtracts_active_holds() {
        let (service, store) = setup();
        let product = seed_product(&store, 10).await;
        let cart = service
            .resolve_cart(&CartOwner::User(UserId::new()))
            .await
            .unwrap();
        service.upsert_item(&cart, product.id, 4).await.unwrap();

        assert_eq!(
            service.available_quantity(product.id, None).await.unwrap(),
            6
        );
        assert_eq!(
            service
                .available_quantity(product.id, Some(cart.id))
                .await
                .unwrap(),
            10
        );
    }
}
