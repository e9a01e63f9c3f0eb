//! PostgreSQL rate limit repository implementation
//!
//! The conditional writes run as single guarded statements, so concurrent
//! requests for one (identifier, endpoint) pair serialize at the row and
//! the counter can never pass its ceiling.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::{PgPool, PgRow};

use crate::domain::DomainError;
use crate::domain::rate_limit::{RateLimitRepository, RateLimitWindow};

/// PostgreSQL implementation of RateLimitRepository backed by the
/// `rate_limits` table
#[derive(Debug, Clone)]
pub struct PostgresRateLimitRepository {
    pool: PgPool,
}

impl PostgresRateLimitRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_window(row: &PgRow) -> RateLimitWindow {
        RateLimitWindow {
            identifier: row.get("identifier"),
            endpoint: row.get("endpoint"),
            request_count: row.get("request_count"),
            window_start: row.get("window_start"),
            window_end: row.get("window_end"),
            max_requests: row.get("max_requests"),
            window_ms: row.get("window_ms"),
            last_request: row.get("last_request"),
        }
    }
}

#[async_trait]
impl RateLimitRepository for PostgresRateLimitRepository {
    async fn fetch(
        &self,
        identifier: &str,
        endpoint: &str,
    ) -> Result<Option<RateLimitWindow>, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT identifier, endpoint, request_count, window_start, window_end,
                   max_requests, window_ms, last_request
            FROM rate_limits
            WHERE identifier = $1 AND endpoint = $2
            "#,
        )
        .bind(identifier)
        .bind(endpoint)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to load rate limit window: {}", e)))?;

        Ok(row.as_ref().map(Self::row_to_window))
    }

    async fn try_increment(
        &self,
        identifier: &str,
        endpoint: &str,
        max_requests: i32,
        now: DateTime<Utc>,
    ) -> Result<Option<(i32, DateTime<Utc>)>, DomainError> {
        let row = sqlx::query(
            r#"
            UPDATE rate_limits
            SET request_count = request_count + 1, last_request = $4
            WHERE identifier = $1 AND endpoint = $2
              AND window_end >= $4 AND request_count < $3
            RETURNING request_count, window_end
            "#,
        )
        .bind(identifier)
        .bind(endpoint)
        .bind(max_requests)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to count request: {}", e)))?;

        Ok(row.map(|r| (r.get("request_count"), r.get("window_end"))))
    }

    async fn start_window(&self, window: RateLimitWindow) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO rate_limits
                (identifier, endpoint, request_count, window_start, window_end,
                 max_requests, window_ms, last_request)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (identifier, endpoint) DO NOTHING
            "#,
        )
        .bind(&window.identifier)
        .bind(&window.endpoint)
        .bind(window.request_count)
        .bind(window.window_start)
        .bind(window.window_end)
        .bind(window.max_requests)
        .bind(window.window_ms)
        .bind(window.last_request)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to open rate limit window: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    async fn restart_window(
        &self,
        window: RateLimitWindow,
        now: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE rate_limits
            SET request_count = $3, window_start = $4, window_end = $5,
                max_requests = $6, window_ms = $7, last_request = $8
            WHERE identifier = $1 AND endpoint = $2 AND window_end < $9
            "#,
        )
        .bind(&window.identifier)
        .bind(&window.endpoint)
        .bind(window.request_count)
        .bind(window.window_start)
        .bind(window.window_end)
        .bind(window.max_requests)
        .bind(window.window_ms)
        .bind(window.last_request)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to reset rate limit window: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, identifier: &str, endpoint: &str) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM rate_limits WHERE identifier = $1 AND endpoint = $2")
            .bind(identifier)
            .bind(endpoint)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DomainError::storage(format!("Failed to delete rate limit window: {}", e))
            })?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM rate_limits WHERE window_end < $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DomainError::storage(format!("Failed to delete expired windows: {}", e))
            })?;

        Ok(result.rows_affected())
    }
}
