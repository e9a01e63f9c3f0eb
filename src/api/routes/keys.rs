//! Key self-service endpoints
//!
//! Authenticated callers manage keys bound to their own user. System keys
//! (no owning user) are handled on the admin surface only.

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::api::middleware::AuthContext;
use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::api_key::{ApiKey, ApiKeyRole};
use crate::infrastructure::api_key::ApiKeyUpdate;

/// API key as exposed over the wire; the hash never leaves the store
#[derive(Debug, Clone, Serialize)]
pub struct ApiKeyResponse {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub name: String,
    pub role: ApiKeyRole,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&ApiKey> for ApiKeyResponse {
    fn from(key: &ApiKey) -> Self {
        Self {
            id: key.id(),
            user_id: key.user_id(),
            name: key.name().to_string(),
            role: key.role(),
            is_active: key.is_active(),
            expires_at: key.expires_at(),
            created_at: key.created_at(),
            updated_at: key.updated_at(),
        }
    }
}

/// Creation response: the only place the plaintext secret ever appears
#[derive(Debug, Serialize)]
pub struct IssuedKeyResponse {
    #[serde(flatten)]
    pub api_key: ApiKeyResponse,
    pub secret: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateKeyRequest {
    pub name: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateKeyRequest {
    pub name: Option<String>,
    pub is_active: Option<bool>,
    /// Present-and-null clears the expiration
    #[serde(default, with = "double_option")]
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

/// Distinguishes an absent field from an explicit null
mod double_option {
    use super::*;
    use serde::Deserializer;

    pub fn deserialize<'de, D>(
        deserializer: D,
    ) -> Result<Option<Option<DateTime<Utc>>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Some(Option::deserialize(deserializer)?))
    }
}

fn require_user(ctx: &AuthContext) -> Result<Uuid, ApiError> {
    ctx.user_id.ok_or_else(|| {
        ApiError::forbidden("This key is not bound to a user; use the admin surface")
    })
}

/// POST /api/keys
pub async fn create_key(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(request): Json<CreateKeyRequest>,
) -> Result<Json<IssuedKeyResponse>, ApiError> {
    let user_id = require_user(&ctx)?;

    if request.name.trim().is_empty() {
        return Err(ApiError::bad_request("name must not be empty"));
    }

    debug!(user_id = %user_id, "User issuing API key");

    let issued = state
        .api_keys
        .issue(
            Some(user_id),
            request.name.trim(),
            ApiKeyRole::User,
            request.expires_at,
        )
        .await?;

    Ok(Json(IssuedKeyResponse {
        api_key: ApiKeyResponse::from(&issued.api_key),
        secret: issued.secret,
    }))
}

/// GET /api/keys
pub async fn list_keys(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<Vec<ApiKeyResponse>>, ApiError> {
    let user_id = require_user(&ctx)?;

    let keys = state.api_keys.list_for_user(user_id).await?;
    Ok(Json(keys.iter().map(ApiKeyResponse::from).collect()))
}

/// Load a key and check it belongs to the caller. Missing and not-owned
/// are indistinguishable to the caller.
async fn owned_key(state: &AppState, ctx: &AuthContext, id: Uuid) -> Result<ApiKey, ApiError> {
    let user_id = require_user(ctx)?;

    state
        .api_keys
        .get(id)
        .await?
        .filter(|key| key.user_id() == Some(user_id))
        .ok_or_else(|| ApiError::not_found(format!("API key '{}' not found", id)))
}

/// PATCH /api/keys/{id}
pub async fn update_key(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateKeyRequest>,
) -> Result<Json<ApiKeyResponse>, ApiError> {
    owned_key(&state, &ctx, id).await?;

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

/// DELETE /api/keys/{id}
pub async fn delete_key(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    owned_key(&state, &ctx, id).await?;

    state.api_keys.delete(id).await?;

    Ok(Json(serde_json::json!({ "deleted": true, "id": id })))
}
