//! API Key repository trait

use async_trait::async_trait;
use std::fmt::Debug;
use uuid::Uuid;

use super::entity::ApiKey;
use crate::domain::DomainError;

/// Repository trait for API key storage
#[async_trait]
pub trait ApiKeyRepository: Send + Sync + Debug {
    /// Get an API key by its id
    async fn get(&self, id: Uuid) -> Result<Option<ApiKey>, DomainError>;

    /// All currently-active keys. Validation hash-compares against each of
    /// these; there is deliberately no lookup by a derived secret fragment.
    async fn list_active(&self) -> Result<Vec<ApiKey>, DomainError>;

    /// Create a new API key row
    async fn create(&self, api_key: ApiKey) -> Result<ApiKey, DomainError>;

    /// Update an existing API key row
    async fn update(&self, api_key: &ApiKey) -> Result<ApiKey, DomainError>;

    /// Delete an API key row
    async fn delete(&self, id: Uuid) -> Result<bool, DomainError>;

    /// All keys owned by a user
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<ApiKey>, DomainError>;

    /// All keys, regardless of state
    async fn list(&self) -> Result<Vec<ApiKey>, DomainError>;

    /// Check whether a key id exists
    async fn exists(&self, id: Uuid) -> Result<bool, DomainError> {
        Ok(self.get(id).await?.is_some())
    }
}
