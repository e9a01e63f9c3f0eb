//! Audit trail admin endpoints

use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::middleware::RequireAdmin;
use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::audit::{
    Association, AssociationFilter, AuditLogEntry, SuspiciousIp, UsageStats, UsageStatsFilter,
};

const DEFAULT_LOG_LIMIT: i64 = 100;
const MAX_LOG_LIMIT: i64 = 1000;

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub entries: Vec<AuditLogEntry>,
}

/// GET /admin/audit/logs
pub async fn recent_logs(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(query): Query<LogsQuery>,
) -> Result<Json<LogsResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT).clamp(1, MAX_LOG_LIMIT);
    let entries = state.audit.recent_logs(limit).await?;
    Ok(Json(LogsResponse { entries }))
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub api_key_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

/// GET /admin/audit/stats
pub async fn usage_stats(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(query): Query<StatsQuery>,
) -> Result<Json<UsageStats>, ApiError> {
    let stats = state
        .audit
        .usage_stats(&UsageStatsFilter {
            api_key_id: query.api_key_id,
            user_id: query.user_id,
            since: query.since,
            until: query.until,
        })
        .await?;

    Ok(Json(stats))
}

#[derive(Debug, Deserialize)]
pub struct AssociationsQuery {
    pub ip: Option<String>,
    pub api_key_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub min_hits: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct AssociationsResponse {
    pub associations: Vec<Association>,
    pub total: usize,
}

/// GET /admin/audit/associations
pub async fn associations(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(query): Query<AssociationsQuery>,
) -> Result<Json<AssociationsResponse>, ApiError> {
    let associations = state
        .audit
        .associations(&AssociationFilter {
            ip_address: query.ip,
            api_key_id: query.api_key_id,
            user_id: query.user_id,
            min_hit_count: query.min_hits,
        })
        .await?;

    let total = associations.len();
    Ok(Json(AssociationsResponse {
        associations,
        total,
    }))
}

#[derive(Debug, Serialize)]
pub struct SuspiciousResponse {
    pub flagged: Vec<SuspiciousIp>,
}

/// GET /admin/audit/suspicious
pub async fn suspicious_activity(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<SuspiciousResponse>, ApiError> {
    let flagged = state.audit.suspicious_activity().await?;
    Ok(Json(SuspiciousResponse { flagged }))
}

#[derive(Debug, Deserialize)]
pub struct PurgeRequest {
    pub days: u32,
}

#[derive(Debug, Serialize)]
pub struct PurgeResponse {
    pub logs_deleted: u64,
    pub associations_deleted: u64,
}

/// POST /admin/audit/purge
pub async fn purge(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Json(request): Json<PurgeRequest>,
) -> Result<Json<PurgeResponse>, ApiError> {
    if request.days == 0 {
        return Err(ApiError::bad_request("days must be at least 1"));
    }

    let (logs_deleted, associations_deleted) =
        state.audit.purge_older_than(request.days).await?;

    Ok(Json(PurgeResponse {
        logs_deleted,
        associations_deleted,
    }))
}
