//! Location search endpoint

use axum::{Json, extract::{Query, State}};
use serde::{Deserialize, Serialize};

use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::weather::GeoMatch;

const MAX_RESULTS: usize = 10;

#[derive(Debug, Deserialize)]
pub struct GeocodeQuery {
    pub q: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct GeocodeResponse {
    pub results: Vec<GeoMatch>,
}

/// GET /api/geocode
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<GeocodeQuery>,
) -> Result<Json<GeocodeResponse>, ApiError> {
    let q = query.q.trim();
    if q.is_empty() {
        return Err(ApiError::bad_request("query must not be empty"));
    }

    let limit = query.limit.unwrap_or(5).min(MAX_RESULTS);
    let results = state.geocoding.search(q, limit).await?;

    Ok(Json(GeocodeResponse { results }))
}
