//! In-memory API key repository implementation

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::DomainError;
use crate::domain::api_key::{ApiKey, ApiKeyRepository};

/// In-memory implementation of ApiKeyRepository
#[derive(Debug, Default)]
pub struct InMemoryApiKeyRepository {
    keys: Arc<RwLock<HashMap<Uuid, ApiKey>>>,
}

impl InMemoryApiKeyRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApiKeyRepository for InMemoryApiKeyRepository {
    async fn get(&self, id: Uuid) -> Result<Option<ApiKey>, DomainError> {
        Ok(self.keys.read().await.get(&id).cloned())
    }

    async fn list_active(&self) -> Result<Vec<ApiKey>, DomainError> {
        let keys = self.keys.read().await;
        Ok(keys.values().filter(|k| k.is_active()).cloned().collect())
    }

    async fn create(&self, api_key: ApiKey) -> Result<ApiKey, DomainError> {
        let mut keys = self.keys.write().await;

        if keys.contains_key(&api_key.id()) {
            return Err(DomainError::conflict(format!(
                "API key '{}' already exists",
                api_key.id()
            )));
        }

        keys.insert(api_key.id(), api_key.clone());
        Ok(api_key)
    }

    async fn update(&self, api_key: &ApiKey) -> Result<ApiKey, DomainError> {
        let mut keys = self.keys.write().await;

        if !keys.contains_key(&api_key.id()) {
            return Err(DomainError::not_found(format!(
                "API key '{}' not found",
                api_key.id()
            )));
        }

        keys.insert(api_key.id(), api_key.clone());
        Ok(api_key.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DomainError> {
        Ok(self.keys.write().await.remove(&id).is_some())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<ApiKey>, DomainError> {
        let keys = self.keys.read().await;
        let mut result: Vec<ApiKey> = keys
            .values()
            .filter(|k| k.user_id() == Some(user_id))
            .cloned()
            .collect();
        result.sort_by_key(|k| k.created_at());
        Ok(result)
    }

    async fn list(&self) -> Result<Vec<ApiKey>, DomainError> {
        let keys = self.keys.read().await;
        let mut result: Vec<ApiKey> = keys.values().cloned().collect();
        result.sort_by_key(|k| k.created_at());
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::api_key::ApiKeyRole;

    fn create_test_key(name: &str) -> ApiKey {
        ApiKey::new(name, "$argon2id$stub", ApiKeyRole::User)
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = InMemoryApiKeyRepository::new();
        let key = create_test_key("Test");

        repo.create(key.clone()).await.unwrap();

        let retrieved = repo.get(key.id()).await.unwrap();
        assert_eq!(retrieved.unwrap().name(), "Test");
    }

    #[tokio::test]
    async fn test_create_duplicate_id() {
        let repo = InMemoryApiKeyRepository::new();
        let key = create_test_key("Test");

        repo.create(key.clone()).await.unwrap();
        assert!(repo.create(key).await.is_err());
    }

    #[tokio::test]
    async fn test_update_missing() {
        let repo = InMemoryApiKeyRepository::new();
        let key = create_test_key("Test");
        assert!(repo.update(&key).await.is_err());
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = InMemoryApiKeyRepository::new();
        let key = create_test_key("Test");

        repo.create(key.clone()).await.unwrap();
        assert!(repo.delete(key.id()).await.unwrap());
        assert!(!repo.delete(key.id()).await.unwrap());
        assert!(repo.get(key.id()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_active_filters() {
        let repo = InMemoryApiKeyRepository::new();
        let mut off = create_test_key("Off");
        off.deactivate();

        repo.create(create_test_key("On")).await.unwrap();
        repo.create(off).await.unwrap();

        let active = repo.list_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name(), "On");

        assert_eq!(repo.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_list_for_user() {
        let repo = InMemoryApiKeyRepository::new();
        let owner = Uuid::new_v4();

        repo.create(create_test_key("System")).await.unwrap();
        repo.create(create_test_key("Owned").with_user(owner))
            .await
            .unwrap();

        let owned = repo.list_for_user(owner).await.unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].name(), "Owned");
    }

    #[tokio::test]
    async fn test_exists() {
        let repo = InMemoryApiKeyRepository::new();
        let key = create_test_key("Test");

        assert!(!repo.exists(key.id()).await.unwrap());
        repo.create(key.clone()).await.unwrap();
        assert!(repo.exists(key.id()).await.unwrap());
    }
}
