//! PostgreSQL audit repository implementation
//!
//! The association identity triple is enforced by a unique index declared
//! NULLS NOT DISTINCT, so an anonymous contact and a keyed contact from
//! the same address stay separate rows while repeats upsert in place.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::{PgPool, PgRow};
use uuid::Uuid;

use crate::domain::DomainError;
use crate::domain::audit::{
    Association, AssociationFilter, AuditLogEntry, AuditRepository, EndpointCount, SuspiciousIp,
    SuspicionThresholds, UsageStats, UsageStatsFilter,
};

/// PostgreSQL implementation of AuditRepository over the `api_audit_logs`
/// and `associations` tables
#[derive(Debug, Clone)]
pub struct PostgresAuditRepository {
    pool: PgPool,
}

impl PostgresAuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_association(row: &PgRow) -> Association {
        Association {
            id: row.get("id"),
            ip_address: row.get("ip_address"),
            api_key_id: row.get("api_key_id"),
            user_id: row.get("user_id"),
            hit_count: row.get("hit_count"),
            first_seen: row.get("first_seen"),
            last_seen: row.get("last_seen"),
            user_agent: row.get("user_agent"),
            geo_location: row.get("geo_location"),
        }
    }
}

#[async_trait]
impl AuditRepository for PostgresAuditRepository {
    async fn insert_log(&self, entry: AuditLogEntry) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO api_audit_logs
                (id, endpoint, method, ip_address, user_agent, api_key_id, user_id,
                 params, response_status, response_time_ms, error_message,
                 request_bytes, response_bytes, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(entry.id)
        .bind(&entry.endpoint)
        .bind(&entry.method)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(entry.api_key_id)
        .bind(entry.user_id)
        .bind(&entry.params)
        .bind(entry.response_status)
        .bind(entry.response_time_ms)
        .bind(&entry.error_message)
        .bind(entry.request_bytes)
        .bind(entry.response_bytes)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to insert audit log: {}", e)))?;

        Ok(())
    }

    async fn upsert_association(
        &self,
        ip_address: &str,
        api_key_id: Option<Uuid>,
        user_id: Option<Uuid>,
        user_agent: Option<String>,
        seen_at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO associations
                (id, ip_address, api_key_id, user_id, hit_count, first_seen, last_seen, user_agent)
            VALUES ($1, $2, $3, $4, 1, $5, $5, $6)
            ON CONFLICT (ip_address, api_key_id, user_id) DO UPDATE
            SET hit_count = associations.hit_count + 1,
                last_seen = EXCLUDED.last_seen,
                user_agent = COALESCE(EXCLUDED.user_agent, associations.user_agent)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(ip_address)
        .bind(api_key_id)
        .bind(user_id)
        .bind(seen_at)
        .bind(&user_agent)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to upsert association: {}", e)))?;

        Ok(())
    }

    async fn recent_logs(&self, limit: i64) -> Result<Vec<AuditLogEntry>, DomainError> {
        let rows = sqlx::query(
            r#"
            SELECT id, endpoint, method, ip_address, user_agent, api_key_id, user_id,
                   params, response_status, response_time_ms, error_message,
                   request_bytes, response_bytes, created_at
            FROM api_audit_logs
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to list audit logs: {}", e)))?;

        Ok(rows
            .iter()
            .map(|row| AuditLogEntry {
                id: row.get("id"),
                endpoint: row.get("endpoint"),
                method: row.get("method"),
                ip_address: row.get("ip_address"),
                user_agent: row.get("user_agent"),
                api_key_id: row.get("api_key_id"),
                user_id: row.get("user_id"),
                params: row.get("params"),
                response_status: row.get("response_status"),
                response_time_ms: row.get("response_time_ms"),
                error_message: row.get("error_message"),
                request_bytes: row.get("request_bytes"),
                response_bytes: row.get("response_bytes"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    async fn usage_stats(&self, filter: &UsageStatsFilter) -> Result<UsageStats, DomainError> {
        let totals = sqlx::query(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(DISTINCT ip_address) AS unique_ips,
                   COALESCE(AVG(response_time_ms), 0)::float8 AS avg_ms,
                   COALESCE(AVG((response_status >= 400)::int)::float8, 0) AS error_rate
            FROM api_audit_logs
            WHERE ($1::uuid IS NULL OR api_key_id = $1)
              AND ($2::uuid IS NULL OR user_id = $2)
              AND ($3::timestamptz IS NULL OR created_at >= $3)
              AND ($4::timestamptz IS NULL OR created_at <= $4)
            "#,
        )
        .bind(filter.api_key_id)
        .bind(filter.user_id)
        .bind(filter.since)
        .bind(filter.until)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to aggregate audit logs: {}", e)))?;

        let top = sqlx::query(
            r#"
            SELECT endpoint, COUNT(*) AS count
            FROM api_audit_logs
            WHERE ($1::uuid IS NULL OR api_key_id = $1)
              AND ($2::uuid IS NULL OR user_id = $2)
              AND ($3::timestamptz IS NULL OR created_at >= $3)
              AND ($4::timestamptz IS NULL OR created_at <= $4)
            GROUP BY endpoint
            ORDER BY count DESC, endpoint
            LIMIT 10
            "#,
        )
        .bind(filter.api_key_id)
        .bind(filter.user_id)
        .bind(filter.since)
        .bind(filter.until)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to rank endpoints: {}", e)))?;

        Ok(UsageStats {
            total_requests: totals.get("total"),
            unique_ips: totals.get("unique_ips"),
            avg_response_time_ms: totals.get("avg_ms"),
            error_rate: totals.get("error_rate"),
            top_endpoints: top
                .iter()
                .map(|row| EndpointCount {
                    endpoint: row.get("endpoint"),
                    count: row.get("count"),
                })
                .collect(),
        })
    }

    async fn associations(
        &self,
        filter: &AssociationFilter,
    ) -> Result<Vec<Association>, DomainError> {
        let rows = sqlx::query(
            r#"
            SELECT id, ip_address, api_key_id, user_id, hit_count,
                   first_seen, last_seen, user_agent, geo_location
            FROM associations
            WHERE ($1::text IS NULL OR ip_address = $1)
              AND ($2::uuid IS NULL OR api_key_id = $2)
              AND ($3::uuid IS NULL OR user_id = $3)
              AND ($4::bigint IS NULL OR hit_count >= $4)
            ORDER BY hit_count DESC
            "#,
        )
        .bind(&filter.ip_address)
        .bind(filter.api_key_id)
        .bind(filter.user_id)
        .bind(filter.min_hit_count)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to list associations: {}", e)))?;

        Ok(rows.iter().map(Self::row_to_association).collect())
    }

    async fn suspicious_activity(
        &self,
        since: DateTime<Utc>,
        thresholds: &SuspicionThresholds,
    ) -> Result<Vec<SuspiciousIp>, DomainError> {
        let rows = sqlx::query(
            r#"
            SELECT ip_address,
                   COUNT(*) AS request_count,
                   COUNT(*) FILTER (WHERE response_status >= 400) AS error_count
            FROM api_audit_logs
            WHERE created_at >= $1
            GROUP BY ip_address
            HAVING COUNT(*) > $2
                OR (COUNT(*) FILTER (WHERE response_status >= 400))::float8
                   / COUNT(*)::float8 > $3
                OR COUNT(*) FILTER (WHERE response_status >= 400) > $4
            ORDER BY request_count DESC
            "#,
        )
        .bind(since)
        .bind(thresholds.max_requests)
        .bind(thresholds.max_error_rate)
        .bind(thresholds.max_errors)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to scan for suspicious IPs: {}", e)))?;

        Ok(rows
            .iter()
            .map(|row| {
                let request_count: i64 = row.get("request_count");
                let error_count: i64 = row.get("error_count");
                SuspiciousIp {
                    ip_address: row.get("ip_address"),
                    request_count,
                    error_count,
                    error_rate: error_count as f64 / request_count as f64,
                }
            })
            .collect())
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<(u64, u64), DomainError> {
        let logs = sqlx::query("DELETE FROM api_audit_logs WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to purge audit logs: {}", e)))?;

        let associations = sqlx::query("DELETE FROM associations WHERE last_seen < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to purge associations: {}", e)))?;

        Ok((logs.rows_affected(), associations.rows_affected()))
    }
}
