//! API error types
//!
//! The Gateway is the only place that turns outcomes into HTTP statuses;
//! everything here is the vocabulary it speaks.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::domain::DomainError;
use crate::domain::rate_limit::RateLimitDecision;

/// Machine-readable error categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorType {
    InvalidRequestError,
    AuthenticationError,
    PermissionError,
    NotFoundError,
    RateLimitError,
    ServerError,
    ServiceUnavailableError,
}

impl std::fmt::Display for ApiErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRequestError => write!(f, "invalid_request_error"),
            Self::AuthenticationError => write!(f, "authentication_error"),
            Self::PermissionError => write!(f, "permission_error"),
            Self::NotFoundError => write!(f, "not_found_error"),
            Self::RateLimitError => write!(f, "rate_limit_error"),
            Self::ServerError => write!(f, "server_error"),
            Self::ServiceUnavailableError => write!(f, "service_unavailable_error"),
        }
    }
}

/// Wire shape of an error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: ApiErrorType,
    /// Back-off metadata, present on 429 responses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitErrorMeta>,
}

/// The contract for rejected-by-rate-limit responses: limit, remaining,
/// reset timestamp and retry-after seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitErrorMeta {
    pub limit: i32,
    pub remaining: i32,
    pub reset_at: DateTime<Utc>,
    pub retry_after_secs: i64,
}

/// Message a response carries for the audit trail, stashed in response
/// extensions so the Gateway can copy it into the log entry.
#[derive(Debug, Clone)]
pub struct AuditErrorMessage(pub String);

/// API error with status code
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub response: ApiErrorResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, error_type: ApiErrorType, message: impl Into<String>) -> Self {
        Self {
            status,
            response: ApiErrorResponse {
                error: ApiErrorDetail {
                    message: message.into(),
                    error_type,
                    rate_limit: None,
                },
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            ApiErrorType::InvalidRequestError,
            message,
        )
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            ApiErrorType::AuthenticationError,
            message,
        )
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            ApiErrorType::PermissionError,
            message,
        )
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, ApiErrorType::NotFoundError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiErrorType::ServerError,
            message,
        )
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            ApiErrorType::ServiceUnavailableError,
            message,
        )
    }

    /// 429 carrying the full back-off contract
    pub fn rate_limit_exceeded(decision: &RateLimitDecision, now: DateTime<Utc>) -> Self {
        let mut err = Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            ApiErrorType::RateLimitError,
            "Rate limit exceeded",
        );
        err.response.error.rate_limit = Some(RateLimitErrorMeta {
            limit: decision.limit,
            remaining: decision.remaining,
            reset_at: decision.reset_at,
            retry_after_secs: decision.retry_after_secs(now),
        });
        err
    }

    pub fn message(&self) -> &str {
        &self.response.error.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.response.error.message.clone();
        let mut response = (self.status, Json(self.response)).into_response();
        response
            .extensions_mut()
            .insert(AuditErrorMessage(message));
        response
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match &err {
            DomainError::NotFound { message } => Self::not_found(message),
            DomainError::Validation { message } => Self::bad_request(message),
            DomainError::Conflict { message } => Self::bad_request(message),
            DomainError::Credential { message } => Self::unauthorized(message),
            // Upstream and store details stay out of the response body
            DomainError::Provider { provider, message } => {
                error!(provider = %provider, detail = %message, "Upstream provider failure");
                Self::unavailable("Upstream provider unavailable")
            }
            DomainError::RateLimiterUnavailable { message } => {
                error!(detail = %message, "Rate limiter unavailable; failing closed");
                Self::unavailable("Service temporarily unavailable")
            }
            DomainError::Configuration { message }
            | DomainError::Internal { message }
            | DomainError::Storage { message } => {
                error!(detail = %message, "Internal failure");
                Self::internal("Internal server error")
            }
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {}",
            self.response.error.error_type, self.response.error.message
        )
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::bad_request("").status, StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::unauthorized("").status, StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::forbidden("").status, StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("").status, StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::internal("").status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::unavailable("").status,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_rate_limit_error_carries_metadata() {
        let now = Utc::now();
        let decision = RateLimitDecision::rejected(30, now + chrono::Duration::seconds(25));
        let err = ApiError::rate_limit_exceeded(&decision, now);

        assert_eq!(err.status, StatusCode::TOO_MANY_REQUESTS);
        let meta = err.response.error.rate_limit.unwrap();
        assert_eq!(meta.limit, 30);
        assert_eq!(meta.remaining, 0);
        assert_eq!(meta.retry_after_secs, 25);
    }

    #[test]
    fn test_storage_detail_is_suppressed() {
        let api_err: ApiError = DomainError::storage("pg: password authentication failed").into();
        assert_eq!(api_err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api_err.message(), "Internal server error");
    }

    #[test]
    fn test_rate_limiter_unavailable_maps_to_503() {
        let api_err: ApiError = DomainError::rate_limiter_unavailable("pool exhausted").into();
        assert_eq!(api_err.status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(!api_err.message().contains("pool"));
    }

    #[test]
    fn test_serialization_shape() {
        let err = ApiError::unauthorized("Invalid API key");
        let json = serde_json::to_string(&err.response).unwrap();

        assert!(json.contains("authentication_error"));
        assert!(json.contains("Invalid API key"));
        assert!(!json.contains("rate_limit"));
    }

    #[test]
    fn test_response_carries_audit_message_extension() {
        let response = ApiError::unauthorized("API key required").into_response();
        let message = response.extensions().get::<AuditErrorMessage>().unwrap();
        assert_eq!(message.0, "API key required");
    }
}
