//! HTTP API server with observability for the marketplace core.
//!
//! Provides REST endpoints for carts, checkout, seller order
//! management, and payment callbacks, with structured logging
//! (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::routing::{delete, get, post, put};
use axum::Router;
use cart::CartService;
use checkout::CheckoutService;
use lock::{LockManager, LockStore};
use metrics_exporter_prometheus::PrometheusHandle;
use store::CommerceStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;

/// Shared application state accessible from all handlers.
pub struct AppState<S, L> {
    pub cart_service: CartService<S, L>,
    pub checkout_service: CheckoutService<S, L>,
    pub locks: LockManager<L>,
    pub store: S,
}

/// Builds the application state from a store and a lock store.
pub fn create_state<S, L>(store: S, lock_store: L, config: &Config) -> Arc<AppState<S, L>>
where
    S: CommerceStore + Clone,
    L: LockStore + Clone,
{
    let locks = LockManager::with_config(lock_store, config.lock_config());
    let cart_service =
        CartService::with_config(store.clone(), locks.clone(), config.cart_config());
    let checkout_service = CheckoutService::new(store.clone(), locks.clone());
    Arc::new(AppState {
        cart_service,
        checkout_service,
        locks,
        store,
    })
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, L>(state: Arc<AppState<S, L>>, metrics_handle: PrometheusHandle) -> Router
where
    S: CommerceStore + Clone + 'static,
    L: LockStore + Clone + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/cart", get(routes::carts::get::<S, L>))
        .route("/cart/items", put(routes::carts::upsert_item::<S, L>))
        .route(
            "/cart/items/{product_id}",
            delete(routes::carts::remove_item::<S, L>),
        )
        .route("/cart/merge", post(routes::carts::merge::<S, L>))
        .route("/orders", post(routes::orders::create::<S, L>))
        .route("/orders", get(routes::orders::list::<S, L>))
        .route("/orders/{id}", get(routes::orders::get::<S, L>))
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S, L>))
        .route(
            "/sellers/{seller_id}/orders",
            get(routes::sellers::list_orders::<S, L>),
        )
        .route(
            "/sellers/{seller_id}/orders/{order_id}/cancel",
            post(routes::sellers::cancel_sub_order::<S, L>),
        )
        .route(
            "/sellers/{seller_id}/items/{item_id}/status",
            post(routes::sellers::update_item_status::<S, L>),
        )
        .route("/products", post(routes::products::create::<S, L>))
        .route("/products/{id}", get(routes::products::get::<S, L>))
        .route(
            "/products/{id}/restock",
            post(routes::products::restock::<S, L>),
        )
        .route("/payments/callback", post(routes::payments::callback::<S, L>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
