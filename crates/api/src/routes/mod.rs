//! HTTP route handlers.

pub mod carts;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod payments;
pub mod products;
pub mod sellers;

use axum::http::HeaderMap;
use cart::CartOwner;
use common::{SessionId, UserId};
use uuid::Uuid;

use crate::error::ApiError;

/// Extracts the caller identity the edge already resolved.
///
/// The HTTP layer in front of this service authenticates and forwards
/// either `x-user-id` (a UUID) or `x-session-id` (an opaque token); the
/// core never parses credentials itself.
pub(crate) fn identity(headers: &HeaderMap) -> Result<CartOwner, ApiError> {
    if let Some(user_id) = header_uuid(headers, "x-user-id")? {
        return Ok(CartOwner::User(UserId::from_uuid(user_id)));
    }
    if let Some(value) = headers.get("x-session-id") {
        let raw = value
            .to_str()
            .map_err(|_| ApiError::BadRequest("invalid x-session-id header".to_string()))?;
        if !raw.is_empty() {
            return Ok(CartOwner::Session(SessionId::new(raw)));
        }
    }
    Err(ApiError::BadRequest(
        "x-user-id or x-session-id header required".to_string(),
    ))
}

/// Extracts an authenticated user, rejecting anonymous callers.
pub(crate) fn require_user(headers: &HeaderMap) -> Result<UserId, ApiError> {
    header_uuid(headers, "x-user-id")?
        .map(UserId::from_uuid)
        .ok_or_else(|| ApiError::BadRequest("x-user-id header required".to_string()))
}

fn header_uuid(headers: &HeaderMap, name: &str) -> Result<Option<Uuid>, ApiError> {
    let Some(value) = headers.get(name) else {
        return Ok(None);
    };
    let raw = value
        .to_str()
        .map_err(|_| ApiError::BadRequest(format!("invalid {name} header")))?;
    let uuid = Uuid::parse_str(raw)
        .map_err(|e| ApiError::BadRequest(format!("invalid {name} header: {e}")))?;
    Ok(Some(uuid))
}
