//! Buyer order endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use checkout::{OrderDetails, SubOrderDetails};
use chrono::{DateTime, Utc};
use common::{AddressId, OrderId};
use domain::Order;
use lock::LockStore;
use serde::{Deserialize, Serialize};
use store::CommerceStore;
use uuid::Uuid;

use crate::error::ApiError;
use crate::routes::require_user;
use crate::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub address_id: Uuid,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub status: String,
    pub payment_status: String,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
    pub sub_orders: Vec<SubOrderResponse>,
}

#[derive(Serialize)]
pub struct SubOrderResponse {
    pub id: String,
    pub seller_id: String,
    pub status: String,
    pub payment_status: String,
    pub total_cents: i64,
    pub items: Vec<OrderItemResponse>,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub id: String,
    pub product_id: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub status: String,
}

#[derive(Serialize)]
pub struct OrderSummaryResponse {
    pub id: String,
    pub status: String,
    pub payment_status: String,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
}

pub(crate) fn to_sub_order_response(details: SubOrderDetails) -> SubOrderResponse {
    SubOrderResponse {
        id: details.order.id.to_string(),
        seller_id: details
            .order
            .seller_id
            .map(|s| s.to_string())
            .unwrap_or_default(),
        status: details.order.status.to_string(),
        payment_status: details.order.payment_status.to_string(),
        total_cents: details.order.total_amount.cents(),
        items: details
            .items
            .into_iter()
            .map(|item| OrderItemResponse {
                id: item.id.to_string(),
                product_id: item.product_id.to_string(),
                quantity: item.quantity,
                unit_price_cents: item.unit_price.cents(),
                status: item.status.to_string(),
            })
            .collect(),
    }
}

fn to_order_response(details: OrderDetails) -> OrderResponse {
    OrderResponse {
        id: details.order.id.to_string(),
        status: details.order.status.to_string(),
        payment_status: details.order.payment_status.to_string(),
        total_cents: details.order.total_amount.cents(),
        created_at: details.order.created_at,
        sub_orders: details
            .sub_orders
            .into_iter()
            .map(to_sub_order_response)
            .collect(),
    }
}

fn to_summary(order: Order) -> OrderSummaryResponse {
    OrderSummaryResponse {
        id: order.id.to_string(),
        status: order.status.to_string(),
        payment_status: order.payment_status.to_string(),
        total_cents: order.total_amount.cents(),
        created_at: order.created_at,
    }
}

// -- Handlers --

/// POST /orders — convert the caller's cart into an order.
#[tracing::instrument(skip(state, headers, req))]
pub async fn create<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    headers: HeaderMap,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError>
where
    S: CommerceStore + 'static,
    L: LockStore + 'static,
{
    let user_id = require_user(&headers)?;
    let details = state
        .checkout_service
        .create_order(user_id, AddressId::from_uuid(req.address_id))
        .await?;
    Ok((StatusCode::CREATED, Json(to_order_response(details))))
}

/// GET /orders — the caller's parent orders, newest first.
#[tracing::instrument(skip(state, headers))]
pub async fn list<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    headers: HeaderMap,
) -> Result<Json<Vec<OrderSummaryResponse>>, ApiError>
where
    S: CommerceStore + 'static,
    L: LockStore + 'static,
{
    let user_id = require_user(&headers)?;
    let orders = state.checkout_service.list_orders(user_id).await?;
    Ok(Json(orders.into_iter().map(to_summary).collect()))
}

/// GET /orders/{id} — one parent order with sub-orders and items.
#[tracing::instrument(skip(state, headers))]
pub async fn get<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    headers: HeaderMap,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderResponse>, ApiError>
where
    S: CommerceStore + 'static,
    L: LockStore + 'static,
{
    let user_id = require_user(&headers)?;
    let details = state
        .checkout_service
        .get_order_details(user_id, OrderId::from_uuid(order_id))
        .await?;
    Ok(Json(to_order_response(details)))
}

/// POST /orders/{id}/cancel — cancel a pending order, restoring stock.
#[tracing::instrument(skip(state, headers))]
pub async fn cancel<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    headers: HeaderMap,
    Path(order_id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
    S: CommerceStore + 'static,
    L: LockStore + 'static,
{
    let user_id = require_user(&headers)?;
    state
        .checkout_service
        .cancel_order(user_id, OrderId::from_uuid(order_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
