//! Audit trail entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One immutable record per processed request. Append-only; rows are only
/// ever removed by the retention purge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub endpoint: String,
    pub method: String,
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub api_key_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    /// Structured request parameters (query string), when present
    pub params: Option<serde_json::Value>,
    pub response_status: i32,
    pub response_time_ms: i64,
    pub error_message: Option<String>,
    pub request_bytes: Option<i64>,
    pub response_bytes: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn new(
        endpoint: impl Into<String>,
        method: impl Into<String>,
        ip_address: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            endpoint: endpoint.into(),
            method: method.into(),
            ip_address: ip_address.into(),
            user_agent: None,
            api_key_id: None,
            user_id: None,
            params: None,
            response_status: 200,
            response_time_ms: 0,
            error_message: None,
            request_bytes: None,
            response_bytes: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_user_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent;
        self
    }

    pub fn with_caller(mut self, api_key_id: Option<Uuid>, user_id: Option<Uuid>) -> Self {
        self.api_key_id = api_key_id;
        self.user_id = user_id;
        self
    }

    pub fn with_params(mut self, params: Option<serde_json::Value>) -> Self {
        self.params = params;
        self
    }

    pub fn with_outcome(mut self, response_status: i32, response_time_ms: i64) -> Self {
        self.response_status = response_status;
        self.response_time_ms = response_time_ms;
        self
    }

    pub fn with_error(mut self, error_message: impl Into<String>) -> Self {
        self.error_message = Some(error_message.into());
        self
    }

    pub fn with_sizes(mut self, request_bytes: Option<i64>, response_bytes: Option<i64>) -> Self {
        self.request_bytes = request_bytes;
        self.response_bytes = response_bytes;
        self
    }

    pub fn is_error(&self) -> bool {
        self.response_status >= 400
    }
}

/// Rolling aggregate of repeated contact from one caller identity.
///
/// The identity key is the exact (ip, api_key_id, user_id) triple — `None`
/// values are part of the key, not wildcards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Association {
    pub id: Uuid,
    pub ip_address: String,
    pub api_key_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub hit_count: i64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub user_agent: Option<String>,
    pub geo_location: Option<String>,
}

impl Association {
    pub fn first_contact(
        ip_address: impl Into<String>,
        api_key_id: Option<Uuid>,
        user_id: Option<Uuid>,
        user_agent: Option<String>,
        seen_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            ip_address: ip_address.into(),
            api_key_id,
            user_id,
            hit_count: 1,
            first_seen: seen_at,
            last_seen: seen_at,
            user_agent,
            geo_location: None,
        }
    }

    /// Record another contact from the same identity
    pub fn observe(&mut self, user_agent: Option<String>, seen_at: DateTime<Utc>) {
        self.hit_count += 1;
        self.last_seen = seen_at;
        if user_agent.is_some() {
            self.user_agent = user_agent;
        }
    }

    /// Whether this row aggregates the given identity triple
    pub fn matches(&self, ip: &str, api_key_id: Option<Uuid>, user_id: Option<Uuid>) -> bool {
        self.ip_address == ip && self.api_key_id == api_key_id && self.user_id == user_id
    }
}

/// Aggregate usage figures over a slice of the audit log
#[derive(Debug, Clone, Default, Serialize)]
pub struct UsageStats {
    pub total_requests: i64,
    pub unique_ips: i64,
    pub avg_response_time_ms: f64,
    /// Share of requests with status >= 400
    pub error_rate: f64,
    pub top_endpoints: Vec<EndpointCount>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EndpointCount {
    pub endpoint: String,
    pub count: i64,
}

/// Filters for [`UsageStats`] queries
#[derive(Debug, Clone, Default)]
pub struct UsageStatsFilter {
    pub api_key_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

/// Filters for association listings
#[derive(Debug, Clone, Default)]
pub struct AssociationFilter {
    pub ip_address: Option<String>,
    pub api_key_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub min_hit_count: Option<i64>,
}

/// One flagged source in the suspicious-activity report
#[derive(Debug, Clone, Serialize)]
pub struct SuspiciousIp {
    pub ip_address: String,
    pub request_count: i64,
    pub error_count: i64,
    pub error_rate: f64,
}
