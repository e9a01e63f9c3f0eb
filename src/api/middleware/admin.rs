//! Admin access extractor
//!
//! The gateway has already authenticated the caller; this extractor only
//! checks that the attached identity carries an administrative role.

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::debug;

use crate::api::types::ApiError;

use super::gateway::AuthContext;

/// Extractor that requires a key with the admin or root role
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub AuthContext);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ctx = parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("API key required"))?;

        match ctx.role {
            Some(role) if role.is_admin() => {
                debug!(key_id = ?ctx.api_key_id, "Admin access granted");
                Ok(RequireAdmin(ctx))
            }
            _ => Err(ApiError::forbidden("Admin access required")),
        }
    }
}
