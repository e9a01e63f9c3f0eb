//! Request governance gateway
//!
//! Wraps every governed route: extracts the presented credential, asks the
//! Key Registry to authenticate it, buckets the caller for the Rate
//! Limiter, runs the handler, and records the outcome with the Audit
//! Recorder. The gateway is the only component that decides HTTP-visible
//! status codes for governance outcomes.

use std::time::Instant;

use axum::{
    Extension,
    extract::{MatchedPath, Request, State},
    http::{HeaderMap, HeaderValue, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::api::state::AppState;
use crate::api::types::{ApiError, AuditErrorMessage};
use crate::domain::api_key::ApiKeyRole;
use crate::domain::audit::AuditLogEntry;
use crate::domain::rate_limit::{RateLimitDecision, RateLimitQuota};

/// Dedicated API key header
pub const API_KEY_HEADER: &str = "x-api-key";
/// Query parameter fallback for clients that cannot set headers
pub const API_KEY_QUERY_PARAM: &str = "api_key";

/// Per-route governance configuration
#[derive(Debug, Clone)]
pub struct RouteConfig {
    /// Route needs an authenticated caller
    pub require_auth: bool,
    /// Permit unauthenticated traffic even when auth is supported
    pub allow_public: bool,
    pub quota: RateLimitQuota,
    /// Rare opt-out for pure health checks
    pub skip_audit: bool,
}

impl RouteConfig {
    /// Anonymous callers welcome; rate-limited by IP
    pub fn public(quota: RateLimitQuota) -> Self {
        Self {
            require_auth: false,
            allow_public: true,
            quota,
            skip_audit: false,
        }
    }

    /// Valid API key required
    pub fn protected(quota: RateLimitQuota) -> Self {
        Self {
            require_auth: true,
            allow_public: false,
            quota,
            skip_audit: false,
        }
    }

    pub fn with_skip_audit(mut self) -> Self {
        self.skip_audit = true;
        self
    }
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self::public(RateLimitQuota::default())
    }
}

/// Caller identity handed to the wrapped handler
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub api_key_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub role: Option<ApiKeyRole>,
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub authenticated: bool,
}

impl AuthContext {
    fn anonymous(ip_address: String, user_agent: Option<String>) -> Self {
        Self {
            api_key_id: None,
            user_id: None,
            role: None,
            ip_address,
            user_agent,
            authenticated: false,
        }
    }

    /// Identifier used to bucket rate-limit counters
    pub fn rate_limit_identifier(&self) -> String {
        match self.api_key_id {
            Some(key_id) => format!("key:{}", key_id),
            None => format!("ip:{}", self.ip_address),
        }
    }
}

/// The per-request governance pipeline
pub async fn gateway_middleware(
    State(state): State<AppState>,
    Extension(config): Extension<RouteConfig>,
    request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();

    let method = request.method().to_string();
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|mp| mp.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let query = request.uri().query().map(str::to_string);

    let headers = request.headers();
    let ip_address = client_ip(headers);
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let request_bytes = content_length(headers);

    let mut ctx = AuthContext::anonymous(ip_address, user_agent);
    let params = parse_query_params(query.as_deref());

    // 1-2. Credential extraction and validation
    match extract_credential(headers, query.as_deref()) {
        Some(secret) => match state.api_keys.validate(&secret).await {
            Ok(Some(key)) => {
                debug!(key_id = %key.id(), "Authenticated API key");
                ctx.api_key_id = Some(key.id());
                ctx.user_id = key.user_id();
                ctx.role = Some(key.role());
                ctx.authenticated = true;
            }
            // Uniform message: no hint whether the key existed
            Ok(None) => {
                return finish(
                    &state,
                    &config,
                    audit_seed(&endpoint, &method, &ctx, params, request_bytes),
                    ApiError::unauthorized("Invalid API key").into_response(),
                    started,
                );
            }
            Err(e) => {
                return finish(
                    &state,
                    &config,
                    audit_seed(&endpoint, &method, &ctx, params, request_bytes),
                    ApiError::from(e).into_response(),
                    started,
                );
            }
        },
        // 3. No credential on a protected route
        None if config.require_auth && !config.allow_public => {
            return finish(
                &state,
                &config,
                audit_seed(&endpoint, &method, &ctx, params, request_bytes),
                ApiError::unauthorized("API key required").into_response(),
                started,
            );
        }
        None => {}
    }

    // 4-5. Rate limiting, unless the role is exempt
    let bypass = ctx.role.is_some_and(|role| role.bypasses_rate_limit());
    let mut decision: Option<RateLimitDecision> = None;

    if !bypass {
        let identifier = ctx.rate_limit_identifier();
        match state
            .rate_limiter
            .admit(&identifier, &endpoint, &config.quota)
            .await
        {
            Ok(admitted) if admitted.allowed => decision = Some(admitted),
            Ok(rejected) => {
                let mut response =
                    ApiError::rate_limit_exceeded(&rejected, Utc::now()).into_response();
                apply_rate_limit_headers(response.headers_mut(), &rejected);
                return finish(
                    &state,
                    &config,
                    audit_seed(&endpoint, &method, &ctx, params, request_bytes),
                    response,
                    started,
                );
            }
            // Fail closed: a broken limiter rejects, it never admits
            Err(e) => {
                return finish(
                    &state,
                    &config,
                    audit_seed(&endpoint, &method, &ctx, params, request_bytes),
                    ApiError::from(e).into_response(),
                    started,
                );
            }
        }
    }

    // 6. Run the wrapped handler with the caller identity attached
    let mut request = request;
    request.extensions_mut().insert(ctx.clone());
    let mut response = next.run(request).await;

    if let Some(decision) = &decision {
        apply_rate_limit_headers(response.headers_mut(), decision);
    }

    // 7. Record the outcome regardless of how the handler fared
    finish(
        &state,
        &config,
        audit_seed(&endpoint, &method, &ctx, params, request_bytes),
        response,
        started,
    )
}

/// Complete an audit entry from the response and hand it to the recorder
/// on a detached task, then return the response untouched.
fn finish(
    state: &AppState,
    config: &RouteConfig,
    seed: AuditLogEntry,
    response: Response,
    started: Instant,
) -> Response {
    if config.skip_audit {
        return response;
    }

    let status = response.status().as_u16() as i32;
    let elapsed_ms = started.elapsed().as_millis() as i64;
    let response_bytes = content_length(response.headers());
    let error_message = response
        .extensions()
        .get::<AuditErrorMessage>()
        .map(|m| m.0.clone());

    let mut entry = seed.with_outcome(status, elapsed_ms);
    entry.response_bytes = response_bytes;
    if let Some(message) = error_message {
        entry = entry.with_error(message);
    } else if status >= 500 {
        entry = entry.with_error("Internal server error");
    }

    let audit = state.audit.clone();
    tokio::spawn(async move {
        audit.record_with_retry(entry).await;
    });

    response
}

fn audit_seed(
    endpoint: &str,
    method: &str,
    ctx: &AuthContext,
    params: Option<serde_json::Value>,
    request_bytes: Option<i64>,
) -> AuditLogEntry {
    AuditLogEntry::new(endpoint, method, ctx.ip_address.clone())
        .with_user_agent(ctx.user_agent.clone())
        .with_caller(ctx.api_key_id, ctx.user_id)
        .with_params(params)
        .with_sizes(request_bytes, None)
}

/// Presented credential, in priority order: Authorization bearer token,
/// dedicated header, query parameter.
fn extract_credential(headers: &HeaderMap, query: Option<&str>) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                let token = token.trim();
                if !token.is_empty() {
                    return Some(token.to_string());
                }
            }
        }
    }

    if let Some(api_key_header) = headers.get(API_KEY_HEADER) {
        if let Ok(key) = api_key_header.to_str() {
            let key = key.trim();
            if !key.is_empty() {
                return Some(key.to_string());
            }
        }
    }

    if let Some(query) = query {
        if let Ok(pairs) = serde_urlencoded::from_str::<Vec<(String, String)>>(query) {
            for (name, value) in pairs {
                if name == API_KEY_QUERY_PARAM && !value.is_empty() {
                    return Some(value);
                }
            }
        }
    }

    None
}

/// Caller IP in priority order: forwarded-for, real-ip, platform
/// connecting-ip, else "unknown".
fn client_ip(headers: &HeaderMap) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(value) = forwarded.to_str() {
            if let Some(first) = value.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return first.to_string();
                }
            }
        }
    }

    for name in ["x-real-ip", "cf-connecting-ip"] {
        if let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) {
            let value = value.trim();
            if !value.is_empty() {
                return value.to_string();
            }
        }
    }

    "unknown".to_string()
}

fn content_length(headers: &HeaderMap) -> Option<i64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

fn parse_query_params(query: Option<&str>) -> Option<serde_json::Value> {
    let query = query?;
    if query.is_empty() {
        return None;
    }

    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query).ok()?;
    if pairs.is_empty() {
        return None;
    }

    let mut map = serde_json::Map::new();
    for (name, value) in pairs {
        // The credential never lands in the audit trail
        if name == API_KEY_QUERY_PARAM {
            map.insert(name, serde_json::Value::String("[REDACTED]".into()));
        } else {
            map.insert(name, serde_json::Value::String(value));
        }
    }

    Some(serde_json::Value::Object(map))
}

fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    let insert = |headers: &mut HeaderMap, name: &'static str, value: String| {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(name, value);
        }
    };

    insert(headers, "x-ratelimit-limit", decision.limit.to_string());
    insert(
        headers,
        "x-ratelimit-remaining",
        decision.remaining.to_string(),
    );
    insert(
        headers,
        "x-ratelimit-reset",
        decision.reset_at.timestamp().to_string(),
    );

    if !decision.allowed {
        insert(
            headers,
            "retry-after",
            decision.retry_after_secs(Utc::now()).to_string(),
        );
    }
}
