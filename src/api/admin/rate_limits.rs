//! Rate limiter admin endpoints

use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::middleware::RequireAdmin;
use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::rate_limit::RateLimitQuota;

#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    pub identifier: String,
    pub endpoint: String,
}

#[derive(Debug, Serialize)]
pub struct WindowInfoResponse {
    pub limit: i32,
    pub remaining: i32,
    pub reset_at: DateTime<Utc>,
}

/// GET /admin/rate-limits
pub async fn window_info(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(query): Query<WindowQuery>,
) -> Result<Json<WindowInfoResponse>, ApiError> {
    let info = state
        .rate_limiter
        .info(&query.identifier, &query.endpoint, &RateLimitQuota::default())
        .await?;

    Ok(Json(WindowInfoResponse {
        limit: info.limit,
        remaining: info.remaining,
        reset_at: info.reset_at,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub identifier: String,
    pub endpoint: String,
}

/// POST /admin/rate-limits/reset
pub async fn reset_window(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Json(request): Json<ResetRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let cleared = state
        .rate_limiter
        .reset(&request.identifier, &request.endpoint)
        .await?;

    Ok(Json(serde_json::json!({ "cleared": cleared })))
}
