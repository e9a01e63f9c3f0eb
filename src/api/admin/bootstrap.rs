//! Privileged bootstrap minting
//!
//! Mints a root/admin key directly, gated by a shared secret compared in
//! constant time. With no secret configured the path answers 404 — the
//! route cannot be probed open by misconfiguration.

use axum::{Json, extract::State, http::HeaderMap};
use serde::Deserialize;
use tracing::{info, warn};

use crate::api::routes::keys::{ApiKeyResponse, IssuedKeyResponse};
use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::api_key::ApiKeyRole;

/// Header carrying the shared bootstrap secret
pub const BOOTSTRAP_SECRET_HEADER: &str = "x-bootstrap-secret";

#[derive(Debug, Deserialize)]
pub struct BootstrapRequest {
    pub name: String,
    pub role: ApiKeyRole,
}

/// POST /admin/bootstrap
pub async fn mint_key(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<BootstrapRequest>,
) -> Result<Json<IssuedKeyResponse>, ApiError> {
    // Fail closed: no configured secret, no route
    let Some(configured) = &state.bootstrap_secret else {
        return Err(ApiError::not_found("Not found"));
    };

    let presented = headers
        .get(BOOTSTRAP_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !constant_time_eq(presented, configured) {
        warn!("Bootstrap attempt with wrong shared secret");
        return Err(ApiError::unauthorized("Invalid bootstrap secret"));
    }

    if request.name.trim().is_empty() {
        return Err(ApiError::bad_request("name must not be empty"));
    }
    if request.role == ApiKeyRole::User {
        return Err(ApiError::bad_request(
            "bootstrap mints root or admin keys only",
        ));
    }

    info!(role = %request.role, "Minting bootstrap key");

    let issued = state
        .api_keys
        .issue(None, request.name.trim(), request.role, None)
        .await?;

    Ok(Json(IssuedKeyResponse {
        api_key: ApiKeyResponse::from(&issued.api_key),
        secret: issued.secret,
    }))
}

/// Constant-time string comparison to keep the shared secret unguessable
/// through timing
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}
