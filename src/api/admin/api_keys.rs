//! Key management admin endpoints

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::api::middleware::RequireAdmin;
use crate::api::routes::keys::{ApiKeyResponse, IssuedKeyResponse, UpdateKeyRequest};
use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::api_key::ApiKeyRole;
use crate::infrastructure::api_key::ApiKeyUpdate;

#[derive(Debug, Deserialize)]
pub struct CreateKeyRequest {
    pub name: String,
    #[serde(default)]
    pub role: ApiKeyRole,
    /// Owning user; absent means a system key
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ListKeysQuery {
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ListKeysResponse {
    pub api_keys: Vec<ApiKeyResponse>,
    pub total: usize,
}

/// GET /admin/keys
pub async fn list_keys(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(query): Query<ListKeysQuery>,
) -> Result<Json<ListKeysResponse>, ApiError> {
    let keys = match query.user_id {
        Some(user_id) => state.api_keys.list_for_user(user_id).await?,
        None => state.api_keys.list().await?,
    };

    let api_keys: Vec<ApiKeyResponse> = keys.iter().map(ApiKeyResponse::from).collect();
    let total = api_keys.len();

    Ok(Json(ListKeysResponse { api_keys, total }))
}

/// POST /admin/keys
pub async fn create_key(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(request): Json<CreateKeyRequest>,
) -> Result<Json<IssuedKeyResponse>, ApiError> {
    if request.name.trim().is_empty() {
        return Err(ApiError::bad_request("name must not be empty"));
    }

    debug!(
        admin_key = ?admin.api_key_id,
        role = %request.role,
        "Admin issuing API key"
    );

    let issued = state
        .api_keys
        .issue(
            request.user_id,
            request.name.trim(),
            request.role,
            request.expires_at,
        )
        .await?;

    Ok(Json(IssuedKeyResponse {
        api_key: ApiKeyResponse::from(&issued.api_key),
        secret: issued.secret,
    }))
}

/// GET /admin/keys/{id}
pub async fn get_key(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiKeyResponse>, ApiError> {
    let key = state
        .api_keys
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("API key '{}' not found", id)))?;

    Ok(Json(ApiKeyResponse::from(&key)))
}

/// PATCH /admin/keys/{id}
pub async fn update_key(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateKeyRequest>,
) -> Result<Json<ApiKeyResponse>, ApiError> {
    let updated = state
        .api_keys
        .update(
            id,
            ApiKeyUpdate {
                name: request.name,
                is_active: request.is_active,
                expires_at: request.expires_at,
            },
        )
        .await?;

    Ok(Json(ApiKeyResponse::from(&updated)))
}

/// POST /admin/keys/{id}/deactivate
pub async fn deactivate_key(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiKeyResponse>, ApiError> {
    let key = state.api_keys.deactivate(id).await?;
    Ok(Json(ApiKeyResponse::from(&key)))
}

/// DELETE /admin/keys/{id}
pub async fn delete_key(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.api_keys.delete(id).await?;
    Ok(Json(serde_json::json!({ "deleted": true, "id": id })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_defaults() {
        let request: CreateKeyRequest =
            serde_json::from_str(r#"{"name": "CI key"}"#).unwrap();

        assert_eq!(request.name, "CI key");
        assert_eq!(request.role, ApiKeyRole::User);
        assert!(request.user_id.is_none());
        assert!(request.expires_at.is_none());
    }

    #[test]
    fn test_create_request_with_role() {
        let request: CreateKeyRequest =
            serde_json::from_str(r#"{"name": "Ops", "role": "admin"}"#).unwrap();
        assert_eq!(request.role, ApiKeyRole::Admin);
    }
}
