//! Cart endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use cart::{CartOwner, CartView};
use chrono::{DateTime, Utc};
use common::ProductId;
use lock::LockStore;
use serde::{Deserialize, Serialize};
use store::CommerceStore;
use uuid::Uuid;

use crate::error::ApiError;
use crate::routes::{identity, require_user};
use crate::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct UpsertItemRequest {
    pub product_id: Uuid,
    pub quantity: u32,
}

// -- Response types --

#[derive(Serialize)]
pub struct CartResponse {
    pub cart_id: String,
    pub items: Vec<CartItemResponse>,
    pub subtotal_cents: i64,
}

#[derive(Serialize)]
pub struct CartItemResponse {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
    pub reservation_expires_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct UpsertItemResponse {
    pub product_id: String,
    pub quantity: u32,
    pub reservation_expires_at: Option<DateTime<Utc>>,
}

fn to_cart_response(view: CartView) -> CartResponse {
    CartResponse {
        cart_id: view.cart.id.to_string(),
        subtotal_cents: view.subtotal.cents(),
        items: view
            .lines
            .into_iter()
            .map(|line| CartItemResponse {
                product_id: line.item.product_id.to_string(),
                product_name: line.product.name,
                quantity: line.item.quantity,
                unit_price_cents: line.product.price.cents(),
                line_total_cents: line.product.price.multiply(line.item.quantity).cents(),
                reservation_expires_at: line.item.reservation_expires_at,
            })
            .collect(),
    }
}

// -- Handlers --

/// GET /cart — the caller's cart, swept and priced.
#[tracing::instrument(skip(state, headers))]
pub async fn get<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    headers: HeaderMap,
) -> Result<Json<CartResponse>, ApiError>
where
    S: CommerceStore + 'static,
    L: LockStore + 'static,
{
    let owner = identity(&headers)?;
    let view = state.cart_service.get_cart(&owner).await?;
    Ok(Json(to_cart_response(view)))
}

/// PUT /cart/items — set the held quantity for a product. Quantity 0
/// removes the line.
#[tracing::instrument(skip(state, headers, req))]
pub async fn upsert_item<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    headers: HeaderMap,
    Json(req): Json<UpsertItemRequest>,
) -> Result<(StatusCode, Json<Option<UpsertItemResponse>>), ApiError>
where
    S: CommerceStore + 'static,
    L: LockStore + 'static,
{
    let owner = identity(&headers)?;
    let cart = state.cart_service.resolve_cart(&owner).await?;
    let item = state
        .cart_service
        .upsert_item(&cart, ProductId::from_uuid(req.product_id), req.quantity)
        .await?;

    Ok((
        StatusCode::OK,
        Json(item.map(|item| UpsertItemResponse {
            product_id: item.product_id.to_string(),
            quantity: item.quantity,
            reservation_expires_at: item.reservation_expires_at,
        })),
    ))
}

/// DELETE /cart/items/{product_id} — remove one line.
#[tracing::instrument(skip(state, headers))]
pub async fn remove_item<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    headers: HeaderMap,
    Path(product_id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
    S: CommerceStore + 'static,
    L: LockStore + 'static,
{
    let owner = identity(&headers)?;
    let cart = state.cart_service.resolve_cart(&owner).await?;
    state
        .cart_service
        .remove_item(&cart, ProductId::from_uuid(product_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /cart/merge — fold the session's anonymous cart into the
/// authenticated user's cart (login-time, once).
#[tracing::instrument(skip(state, headers))]
pub async fn merge<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    headers: HeaderMap,
) -> Result<Json<CartResponse>, ApiError>
where
    S: CommerceStore + 'static,
    L: LockStore + 'static,
{
    let user_id = require_user(&headers)?;
    let session_id = match identity(&headers)? {
        CartOwner::Session(session_id) => session_id,
        CartOwner::User(_) => {
            let value = headers
                .get("x-session-id")
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    ApiError::BadRequest("x-session-id header required for merge".to_string())
                })?;
            common::SessionId::new(value)
        }
    };

    state.cart_service.merge_carts(user_id, &session_id).await?;
    let view = state
        .cart_service
        .get_cart(&CartOwner::User(user_id))
        .await?;
    Ok(Json(to_cart_response(view)))
}
