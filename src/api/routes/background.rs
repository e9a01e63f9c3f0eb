//! Background-image lookup endpoint

use axum::{Json, extract::{Query, State}};
use serde::{Deserialize, Serialize};

use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::weather::BackgroundImage;

#[derive(Debug, Deserialize)]
pub struct BackgroundQuery {
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct BackgroundResponse {
    pub image: Option<BackgroundImage>,
}

/// GET /api/background
pub async fn lookup(
    State(state): State<AppState>,
    Query(query): Query<BackgroundQuery>,
) -> Result<Json<BackgroundResponse>, ApiError> {
    let q = query.q.trim();
    if q.is_empty() {
        return Err(ApiError::bad_request("query must not be empty"));
    }

    let image = state.images.search(q).await?;
    Ok(Json(BackgroundResponse { image }))
}
