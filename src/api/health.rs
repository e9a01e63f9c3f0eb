//! Health check endpoints

use std::time::Instant;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;

use super::state::AppState;
use crate::domain::audit::UsageStatsFilter;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checks: Option<Vec<HealthCheck>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

#[derive(Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Serialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub latency_ms: u64,
}

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    let response = HealthResponse {
        status: HealthStatus::Healthy,
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: None,
        latency_ms: None,
    };

    (StatusCode::OK, Json(response))
}

/// GET /live
pub async fn live_check() -> impl IntoResponse {
    StatusCode::OK
}

/// GET /ready - verifies the governance stores answer
pub async fn ready_check(State(state): State<AppState>) -> impl IntoResponse {
    let start = Instant::now();
    let mut checks = Vec::new();
    let mut overall = HealthStatus::Healthy;

    let key_check = {
        let started = Instant::now();
        match state.api_keys.list().await {
            Ok(_) => HealthCheck {
                name: "key_registry".into(),
                status: HealthStatus::Healthy,
                message: None,
                latency_ms: started.elapsed().as_millis() as u64,
            },
            Err(e) => HealthCheck {
                name: "key_registry".into(),
                status: HealthStatus::Unhealthy,
                message: Some(e.to_string()),
                latency_ms: started.elapsed().as_millis() as u64,
            },
        }
    };
    if key_check.status != HealthStatus::Healthy {
        overall = HealthStatus::Unhealthy;
    }
    checks.push(key_check);

    let audit_check = {
        let started = Instant::now();
        match state.audit.usage_stats(&UsageStatsFilter::default()).await {
            Ok(_) => HealthCheck {
                name: "audit_store".into(),
                status: HealthStatus::Healthy,
                message: None,
                latency_ms: started.elapsed().as_millis() as u64,
            },
            Err(e) => HealthCheck {
                name: "audit_store".into(),
                status: HealthStatus::Degraded,
                message: Some(e.to_string()),
                latency_ms: started.elapsed().as_millis() as u64,
            },
        }
    };
    if audit_check.status != HealthStatus::Healthy && overall == HealthStatus::Healthy {
        overall = HealthStatus::Degraded;
    }
    checks.push(audit_check);

    let response = HealthResponse {
        status: overall,
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: Some(checks),
        latency_ms: Some(start.elapsed().as_millis() as u64),
    };

    let status_code = match overall {
        // Degraded still accepts traffic; audit is best-effort
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(response))
}
