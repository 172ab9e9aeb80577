//! Catalog seeding and availability endpoints.
//!
//! Browse and search live elsewhere; this surface exists so the stock
//! ledger can be driven end-to-end (seeding, restock, availability).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use common::{Money, ProductId, SellerId};
use domain::Product;
use lock::{keys, LockStore};
use serde::{Deserialize, Serialize};
use store::CommerceStore;
use uuid::Uuid;

use crate::error::ApiError;
use crate::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub price_cents: i64,
    pub stock: i64,
    pub category: String,
    pub seller_id: Uuid,
}

#[derive(Deserialize)]
pub struct RestockRequest {
    pub quantity: u32,
}

// -- Response types --

#[derive(Serialize)]
pub struct ProductResponse {
    pub id: String,
    pub name: String,
    pub price_cents: i64,
    pub stock: i64,
    pub available: i64,
    pub category: String,
    pub seller_id: String,
}

// -- Handlers --

/// POST /products — seed a product.
#[tracing::instrument(skip(state, req))]
pub async fn create<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError>
where
    S: CommerceStore + 'static,
    L: LockStore + 'static,
{
    if req.price_cents < 0 || req.stock < 0 {
        return Err(ApiError::BadRequest(
            "price and stock must be non-negative".to_string(),
        ));
    }
    let product = Product::new(
        req.name,
        Money::from_cents(req.price_cents),
        req.stock,
        req.category,
        SellerId::from_uuid(req.seller_id),
    );
    state.store.insert_product(&product).await?;

    let available = product.stock;
    Ok((
        StatusCode::CREATED,
        Json(to_product_response(product, available)),
    ))
}

/// GET /products/{id} — a product with its live availability
/// (authoritative stock minus active holds).
#[tracing::instrument(skip(state))]
pub async fn get<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<ProductResponse>, ApiError>
where
    S: CommerceStore + 'static,
    L: LockStore + 'static,
{
    let product_id = ProductId::from_uuid(product_id);
    let product = state
        .store
        .get_product(product_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("product not found: {product_id}")))?;
    let available = state.cart_service.available_quantity(product_id, None).await?;
    Ok(Json(to_product_response(product, available)))
}

/// POST /products/{id}/restock — add units to the authoritative stock,
/// under the product's lock like every other stock mutation.
#[tracing::instrument(skip(state, req))]
pub async fn restock<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Path(product_id): Path<Uuid>,
    Json(req): Json<RestockRequest>,
) -> Result<Json<ProductResponse>, ApiError>
where
    S: CommerceStore + Clone + 'static,
    L: LockStore + 'static,
{
    let product_id = ProductId::from_uuid(product_id);
    state
        .store
        .get_product(product_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("product not found: {product_id}")))?;

    let key = keys::product_stock(product_id);
    let quantity = req.quantity;
    let store = state.store.clone();
    state
        .locks
        .with_lock(&key, move || async move {
            store.increment_stock(product_id, quantity).await
        })
        .await
        .map_err(|e| ApiError::Cart(cart::CartError::Lock(e)))??;

    let product = state
        .store
        .get_product(product_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("product not found: {product_id}")))?;
    let available = state.cart_service.available_quantity(product_id, None).await?;
    Ok(Json(to_product_response(product, available)))
}

fn to_product_response(product: Product, available: i64) -> ProductResponse {
    ProductResponse {
        id: product.id.to_string(),
        name: product.name,
        price_cents: product.price.cents(),
        stock: product.stock,
        available: available.max(0),
        category: product.category,
        seller_id: product.seller_id.to_string(),
    }
}
