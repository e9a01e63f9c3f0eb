//! Key Registry service
//!
//! High-level API key operations: issuance, validation, lifecycle updates.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::DomainError;
use crate::domain::api_key::{ApiKey, ApiKeyRepository, ApiKeyRole};

use super::generator::SecretGenerator;
use super::hasher::{Argon2SecretHasher, SecretHasher};

/// Result of issuing a new API key. The secret is returned exactly once
/// and never persisted.
#[derive(Debug)]
pub struct IssuedApiKey {
    pub api_key: ApiKey,
    pub secret: String,
}

/// Partial update for an API key
#[derive(Debug, Clone, Default)]
pub struct ApiKeyUpdate {
    pub name: Option<String>,
    pub is_active: Option<bool>,
    /// `Some(None)` clears the expiration; `None` leaves it untouched
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

/// API Key service backing the Key Registry
#[derive(Debug)]
pub struct ApiKeyService<R>
where
    R: ApiKeyRepository,
{
    repository: Arc<R>,
    generator: SecretGenerator,
    hasher: Arc<dyn SecretHasher>,
}

impl<R: ApiKeyRepository> ApiKeyService<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self {
            repository,
            generator: SecretGenerator::production(),
            hasher: Arc::new(Argon2SecretHasher::new()),
        }
    }

    /// Use a custom secret generator
    pub fn with_generator(mut self, generator: SecretGenerator) -> Self {
        self.generator = generator;
        self
    }

    /// Use a custom hasher
    pub fn with_hasher(mut self, hasher: Arc<dyn SecretHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    /// Issue a new key. The plaintext secret exists only in the returned
    /// value; the row stores its salted hash.
    pub async fn issue(
        &self,
        user_id: Option<Uuid>,
        name: impl Into<String>,
        role: ApiKeyRole,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<IssuedApiKey, DomainError> {
        let name = name.into();
        info!(name = %name, role = %role, "Issuing API key");

        let secret = self.generator.generate();
        let hash = self.hasher.hash(&secret)?;

        let mut api_key = ApiKey::new(&name, hash, role);
        if let Some(user_id) = user_id {
            api_key = api_key.with_user(user_id);
        }
        if let Some(expires_at) = expires_at {
            api_key = api_key.with_expiration(expires_at);
        }

        let created = self.repository.create(api_key).await?;
        info!(id = %created.id(), "API key issued");

        Ok(IssuedApiKey {
            api_key: created,
            secret,
        })
    }

    /// Validate a presented secret.
    ///
    /// Rejects immediately on a missing prefix, then hash-compares against
    /// every active row — only the stored hash can confirm a match, so
    /// there is no lookup by plaintext or a derived key. A key discovered
    /// expired here is deactivated as a side effect (lazy expiry) and
    /// reported as not found.
    pub async fn validate(&self, secret: &str) -> Result<Option<ApiKey>, DomainError> {
        if !self.generator.has_expected_prefix(secret) {
            debug!("Presented credential lacks the expected prefix");
            return Ok(None);
        }

        let candidates = self.repository.list_active().await?;

        for key in candidates {
            if !self.hasher.verify(secret, key.secret_hash()) {
                continue;
            }

            if key.is_expired() {
                debug!(id = %key.id(), "Key matched but is expired; deactivating");
                let mut expired = key;
                expired.deactivate();
                if let Err(e) = self.repository.update(&expired).await {
                    warn!(id = %expired.id(), error = %e, "Failed to deactivate expired key");
                }
                return Ok(None);
            }

            return Ok(Some(key));
        }

        debug!("No active key matched the presented secret");
        Ok(None)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<ApiKey>, DomainError> {
        self.repository.get(id).await
    }

    /// Apply a partial update
    pub async fn update(&self, id: Uuid, update: ApiKeyUpdate) -> Result<ApiKey, DomainError> {
        let mut key = self
            .repository
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("API key '{}' not found", id)))?;

        if let Some(name) = update.name {
            key.set_name(name);
        }
        if let Some(active) = update.is_active {
            key.set_active(active);
        }
        if let Some(expires_at) = update.expires_at {
            key.set_expiration(expires_at);
        }

        self.repository.update(&key).await
    }

    pub async fn deactivate(&self, id: Uuid) -> Result<ApiKey, DomainError> {
        info!(id = %id, "Deactivating API key");

        let mut key = self
            .repository
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("API key '{}' not found", id)))?;

        key.deactivate();
        self.repository.update(&key).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), DomainError> {
        info!(id = %id, "Deleting API key");

        if !self.repository.delete(id).await? {
            return Err(DomainError::not_found(format!(
                "API key '{}' not found",
                id
            )));
        }

        Ok(())
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<ApiKey>, DomainError> {
        self.repository.list_for_user(user_id).await
    }

    pub async fn list(&self) -> Result<Vec<ApiKey>, DomainError> {
        self.repository.list().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::api_key::InMemoryApiKeyRepository;
    use chrono::Duration;

    fn fast_hasher() -> Arc<dyn SecretHasher> {
        Arc::new(Argon2SecretHasher::tuned(64, 1, 1))
    }

    fn create_service() -> ApiKeyService<InMemoryApiKeyRepository> {
        ApiKeyService::new(Arc::new(InMemoryApiKeyRepository::new()))
            .with_generator(SecretGenerator::test())
            .with_hasher(fast_hasher())
    }

    #[tokio::test]
    async fn test_issue_returns_secret_once() {
        let service = create_service();

        let issued = service
            .issue(None, "Dashboard", ApiKeyRole::User, None)
            .await
            .unwrap();

        assert!(issued.secret.starts_with("wk_test_"));
        assert_eq!(issued.api_key.name(), "Dashboard");
        // The row holds only the hash
        assert_ne!(issued.api_key.secret_hash(), issued.secret);
        assert!(!issued.api_key.secret_hash().contains(&issued.secret));
    }

    #[tokio::test]
    async fn test_validate_round_trip() {
        let service = create_service();
        let owner = Uuid::new_v4();

        let issued = service
            .issue(Some(owner), "Dashboard", ApiKeyRole::User, None)
            .await
            .unwrap();

        let validated = service.validate(&issued.secret).await.unwrap().unwrap();
        assert_eq!(validated.id(), issued.api_key.id());
        assert_eq!(validated.user_id(), Some(owner));
    }

    #[tokio::test]
    async fn test_validate_wrong_prefix_short_circuits() {
        let service = create_service();
        service
            .issue(None, "Dashboard", ApiKeyRole::User, None)
            .await
            .unwrap();

        assert!(service.validate("sk-whatever").await.unwrap().is_none());
        assert!(service.validate("wk_live_other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_validate_right_prefix_wrong_body() {
        let service = create_service();
        service
            .issue(None, "Dashboard", ApiKeyRole::User, None)
            .await
            .unwrap();

        let validated = service
            .validate("wk_test_definitely-not-the-secret")
            .await
            .unwrap();
        assert!(validated.is_none());
    }

    #[tokio::test]
    async fn test_validate_deactivated_key() {
        let service = create_service();
        let issued = service
            .issue(None, "Dashboard", ApiKeyRole::User, None)
            .await
            .unwrap();

        service.deactivate(issued.api_key.id()).await.unwrap();

        assert!(service.validate(&issued.secret).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lazy_expiry_deactivates_row() {
        let service = create_service();
        let issued = service
            .issue(
                None,
                "Short-lived",
                ApiKeyRole::User,
                Some(Utc::now() - Duration::minutes(1)),
            )
            .await
            .unwrap();

        // First validation discovers the expiry and flips the flag
        assert!(service.validate(&issued.secret).await.unwrap().is_none());

        let stored = service.get(issued.api_key.id()).await.unwrap().unwrap();
        assert!(!stored.is_active());

        // Second validation also misses (the row is now inactive)
        assert!(service.validate(&issued.secret).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_rename_and_expiry() {
        let service = create_service();
        let issued = service
            .issue(None, "Dashboard", ApiKeyRole::User, None)
            .await
            .unwrap();

        let expires = Utc::now() + Duration::days(7);
        let updated = service
            .update(
                issued.api_key.id(),
                ApiKeyUpdate {
                    name: Some("Renamed".into()),
                    is_active: None,
                    expires_at: Some(Some(expires)),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name(), "Renamed");
        assert_eq!(updated.expires_at(), Some(expires));
    }

    #[tokio::test]
    async fn test_update_missing_key() {
        let service = create_service();
        let result = service.update(Uuid::new_v4(), ApiKeyUpdate::default()).await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_delete_missing_key() {
        let service = create_service();
        let result = service.delete(Uuid::new_v4()).await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_list_for_user_scopes_ownership() {
        let service = create_service();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        service
            .issue(Some(alice), "Alice 1", ApiKeyRole::User, None)
            .await
            .unwrap();
        service
            .issue(Some(alice), "Alice 2", ApiKeyRole::User, None)
            .await
            .unwrap();
        service
            .issue(Some(bob), "Bob", ApiKeyRole::User, None)
            .await
            .unwrap();

        assert_eq!(service.list_for_user(alice).await.unwrap().len(), 2);
        assert_eq!(service.list_for_user(bob).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_validate_propagates_store_failure() {
        use crate::domain::api_key::MockApiKeyRepository;

        let repo = Arc::new(MockApiKeyRepository::new());
        let service = ApiKeyService::new(repo.clone())
            .with_generator(SecretGenerator::test())
            .with_hasher(fast_hasher());

        repo.set_should_fail(true).await;

        let result = service.validate("wk_test_anything").await;
        assert!(matches!(result, Err(DomainError::Storage { .. })));
    }

}
