//! Payment gateway callback endpoint.
//!
//! The simulated gateway reports outcomes here; no card or gateway
//! details ever cross into this service.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use common::OrderId;
use lock::LockStore;
use serde::Deserialize;
use store::CommerceStore;
use uuid::Uuid;

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentOutcome {
    Paid,
    Failed,
    Refunded,
}

#[derive(Deserialize)]
pub struct PaymentCallbackRequest {
    pub order_id: Uuid,
    pub outcome: PaymentOutcome,
}

/// POST /payments/callback — record a payment outcome.
///
/// Success confirms the whole order tree atomically; failure marks the
/// payment failed while the order stays pending, and stock is NOT
/// released.
#[tracing::instrument(skip(state, req))]
pub async fn callback<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Json(req): Json<PaymentCallbackRequest>,
) -> Result<StatusCode, ApiError>
where
    S: CommerceStore + 'static,
    L: LockStore + 'static,
{
    let order_id = OrderId::from_uuid(req.order_id);
    match req.outcome {
        PaymentOutcome::Paid => state.checkout_service.mark_paid(order_id).await?,
        PaymentOutcome::Failed => state.checkout_service.mark_failed(order_id).await?,
        PaymentOutcome::Refunded => state.checkout_service.mark_refunded(order_id).await?,
    }
    Ok(StatusCode::NO_CONTENT)
}
