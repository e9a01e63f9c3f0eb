//! Audit trail repository trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Debug;
use uuid::Uuid;

use super::entity::{
    Association, AssociationFilter, AuditLogEntry, SuspiciousIp, UsageStats, UsageStatsFilter,
};
use crate::domain::DomainError;

/// Thresholds for the suspicious-activity report
#[derive(Debug, Clone, Copy)]
pub struct SuspicionThresholds {
    /// Flag sources above this many requests in the window
    pub max_requests: i64,
    /// Flag sources above this error share
    pub max_error_rate: f64,
    /// Flag sources above this absolute error count
    pub max_errors: i64,
}

impl Default for SuspicionThresholds {
    fn default() -> Self {
        Self {
            max_requests: 100,
            max_error_rate: 0.5,
            max_errors: 20,
        }
    }
}

/// Storage for the audit log and the association aggregates. The log is
/// append-only; associations are upserted keyed by the exact
/// (ip, api_key_id, user_id) triple with nulls significant.
#[async_trait]
pub trait AuditRepository: Send + Sync + Debug {
    /// Append one log entry
    async fn insert_log(&self, entry: AuditLogEntry) -> Result<(), DomainError>;

    /// Create or bump the association row for an identity triple
    async fn upsert_association(
        &self,
        ip_address: &str,
        api_key_id: Option<Uuid>,
        user_id: Option<Uuid>,
        user_agent: Option<String>,
        seen_at: DateTime<Utc>,
    ) -> Result<(), DomainError>;

    /// Most recent log entries, newest first
    async fn recent_logs(&self, limit: i64) -> Result<Vec<AuditLogEntry>, DomainError>;

    /// Aggregate usage figures over the filtered log slice
    async fn usage_stats(&self, filter: &UsageStatsFilter) -> Result<UsageStats, DomainError>;

    /// Associations matching the filter, hit-count descending
    async fn associations(
        &self,
        filter: &AssociationFilter,
    ) -> Result<Vec<Association>, DomainError>;

    /// Per-IP activity since `since` that crosses any threshold,
    /// request-count descending
    async fn suspicious_activity(
        &self,
        since: DateTime<Utc>,
        thresholds: &SuspicionThresholds,
    ) -> Result<Vec<SuspiciousIp>, DomainError>;

    /// Drop log entries created before the cutoff and associations last
    /// seen before it. Returns (logs deleted, associations deleted).
    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<(u64, u64), DomainError>;
}
