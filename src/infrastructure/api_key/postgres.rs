//! PostgreSQL API key repository implementation

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use uuid::Uuid;

use crate::domain::DomainError;
use crate::domain::api_key::{ApiKey, ApiKeyRepository, ApiKeyRole};

/// PostgreSQL implementation of ApiKeyRepository backed by the `api_keys`
/// table
#[derive(Debug, Clone)]
pub struct PostgresApiKeyRepository {
    pool: PgPool,
}

impl PostgresApiKeyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_key(row: &PgRow) -> Result<ApiKey, DomainError> {
        let role_str: String = row.get("role");
        let role = ApiKeyRole::parse(&role_str)
            .ok_or_else(|| DomainError::storage(format!("Unknown API key role '{}'", role_str)))?;

        Ok(ApiKey::from_parts(
            row.get("id"),
            row.get("user_id"),
            row.get("name"),
            row.get("secret_hash"),
            role,
            row.get("is_active"),
            row.get("expires_at"),
            row.get("created_at"),
            row.get("updated_at"),
        ))
    }
}

const SELECT_COLUMNS: &str =
    "id, user_id, name, secret_hash, role, is_active, expires_at, created_at, updated_at";

#[async_trait]
impl ApiKeyRepository for PostgresApiKeyRepository {
    async fn get(&self, id: Uuid) -> Result<Option<ApiKey>, DomainError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM api_keys WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to load API key: {}", e)))?;

        row.as_ref().map(Self::row_to_key).transpose()
    }

    async fn list_active(&self) -> Result<Vec<ApiKey>, DomainError> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM api_keys WHERE is_active ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to list active API keys: {}", e)))?;

        rows.iter().map(Self::row_to_key).collect()
    }

    async fn create(&self, api_key: ApiKey) -> Result<ApiKey, DomainError> {
        sqlx::query(
            r#"
            INSERT INTO api_keys
                (id, user_id, name, secret_hash, role, is_active, expires_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(api_key.id())
        .bind(api_key.user_id())
        .bind(api_key.name())
        .bind(api_key.secret_hash())
        .bind(api_key.role().as_str())
        .bind(api_key.is_active())
        .bind(api_key.expires_at())
        .bind(api_key.created_at())
        .bind(api_key.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                DomainError::conflict(format!("API key '{}' already exists", api_key.id()))
            }
            other => DomainError::storage(format!("Failed to create API key: {}", other)),
        })?;

        Ok(api_key)
    }

    async fn update(&self, api_key: &ApiKey) -> Result<ApiKey, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE api_keys
            SET name = $2, is_active = $3, expires_at = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(api_key.id())
        .bind(api_key.name())
        .bind(api_key.is_active())
        .bind(api_key.expires_at())
        .bind(api_key.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to update API key: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!(
                "API key '{}' not found",
                api_key.id()
            )));
        }

        Ok(api_key.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM api_keys WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to delete API key: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<ApiKey>, DomainError> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM api_keys WHERE user_id = $1 ORDER BY created_at"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to list user API keys: {}", e)))?;

        rows.iter().map(Self::row_to_key).collect()
    }

    async fn list(&self) -> Result<Vec<ApiKey>, DomainError> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM api_keys ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to list API keys: {}", e)))?;

        rows.iter().map(Self::row_to_key).collect()
    }
}
