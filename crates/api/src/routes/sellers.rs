//! Seller-facing endpoints.
//!
//! Sellers act on sub-orders and their items; the path-scoped seller ID
//! is trusted from the authenticating edge, like the identity headers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use common::{OrderId, OrderItemId, SellerId};
use domain::OrderStatus;
use lock::LockStore;
use serde::Deserialize;
use store::CommerceStore;
use uuid::Uuid;

use crate::error::ApiError;
use crate::routes::orders::{to_sub_order_response, OrderItemResponse, SubOrderResponse};
use crate::AppState;

#[derive(Deserialize)]
pub struct UpdateItemStatusRequest {
    pub status: OrderStatus,
}

/// GET /sellers/{seller_id}/orders — the seller's sub-orders with items.
#[tracing::instrument(skip(state))]
pub async fn list_orders<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Path(seller_id): Path<Uuid>,
) -> Result<Json<Vec<SubOrderResponse>>, ApiError>
where
    S: CommerceStore + 'static,
    L: LockStore + 'static,
{
    let details = state
        .checkout_service
        .list_seller_orders(SellerId::from_uuid(seller_id))
        .await?;
    Ok(Json(details.into_iter().map(to_sub_order_response).collect()))
}

/// POST /sellers/{seller_id}/orders/{order_id}/cancel — cancel one
/// sub-order, restoring its stock; cancels the parent when no live
/// sibling remains.
#[tracing::instrument(skip(state))]
pub async fn cancel_sub_order<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Path((seller_id, order_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError>
where
    S: CommerceStore + 'static,
    L: LockStore + 'static,
{
    state
        .checkout_service
        .cancel_sub_order(SellerId::from_uuid(seller_id), OrderId::from_uuid(order_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /sellers/{seller_id}/items/{item_id}/status — advance one item
/// through the fulfillment state machine.
#[tracing::instrument(skip(state, req))]
pub async fn update_item_status<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Path((seller_id, item_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateItemStatusRequest>,
) -> Result<Json<OrderItemResponse>, ApiError>
where
    S: CommerceStore + 'static,
    L: LockStore + 'static,
{
    let item = state
        .checkout_service
        .update_item_status(
            SellerId::from_uuid(seller_id),
            OrderItemId::from_uuid(item_id),
            req.status,
        )
        .await?;
    Ok(Json(OrderItemResponse {
        id: item.id.to_string(),
        product_id: item.product_id.to_string(),
        quantity: item.quantity,
        unit_price_cents: item.unit_price.cents(),
        status: item.status.to_string(),
    }))
}
