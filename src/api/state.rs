//! Application state for shared services using dynamic dispatch

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::DomainError;
use crate::domain::api_key::{ApiKey, ApiKeyRepository, ApiKeyRole};
use crate::domain::audit::{
    Association, AssociationFilter, AuditLogEntry, AuditRepository, SuspiciousIp, UsageStats,
    UsageStatsFilter,
};
use crate::domain::rate_limit::{RateLimitDecision, RateLimitQuota, RateLimitRepository};
use crate::domain::weather::{GeocodingProvider, ImageProvider, WeatherProvider};
use crate::infrastructure::api_key::{ApiKeyService, ApiKeyUpdate, IssuedApiKey};
use crate::infrastructure::audit::AuditService;
use crate::infrastructure::rate_limit::RateLimiter;

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub api_keys: Arc<dyn ApiKeyServiceTrait>,
    pub rate_limiter: Arc<dyn RateLimiterTrait>,
    pub audit: Arc<dyn AuditServiceTrait>,
    pub weather: Arc<dyn WeatherProvider>,
    pub geocoding: Arc<dyn GeocodingProvider>,
    pub images: Arc<dyn ImageProvider>,
    /// Shared secret gating the admin bootstrap route; `None` disables it
    pub bootstrap_secret: Option<String>,
}

/// Trait for Key Registry operations
#[async_trait::async_trait]
pub trait ApiKeyServiceTrait: Send + Sync {
    async fn validate(&self, secret: &str) -> Result<Option<ApiKey>, DomainError>;
    async fn issue(
        &self,
        user_id: Option<Uuid>,
        name: &str,
        role: ApiKeyRole,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<IssuedApiKey, DomainError>;
    async fn get(&self, id: Uuid) -> Result<Option<ApiKey>, DomainError>;
    async fn update(&self, id: Uuid, update: ApiKeyUpdate) -> Result<ApiKey, DomainError>;
    async fn deactivate(&self, id: Uuid) -> Result<ApiKey, DomainError>;
    async fn delete(&self, id: Uuid) -> Result<(), DomainError>;
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<ApiKey>, DomainError>;
    async fn list(&self) -> Result<Vec<ApiKey>, DomainError>;
}

/// Trait for Rate Limiter operations
#[async_trait::async_trait]
pub trait RateLimiterTrait: Send + Sync {
    async fn admit(
        &self,
        identifier: &str,
        endpoint: &str,
        quota: &RateLimitQuota,
    ) -> Result<RateLimitDecision, DomainError>;
    async fn info(
        &self,
        identifier: &str,
        endpoint: &str,
        quota: &RateLimitQuota,
    ) -> Result<RateLimitDecision, DomainError>;
    async fn reset(&self, identifier: &str, endpoint: &str) -> Result<bool, DomainError>;
    async fn cleanup_expired(&self) -> Result<u64, DomainError>;
}

/// Trait for Audit Recorder operations
#[async_trait::async_trait]
pub trait AuditServiceTrait: Send + Sync {
    async fn record(&self, entry: AuditLogEntry) -> Result<(), DomainError>;
    /// Write with bounded retries; never fails the caller
    async fn record_with_retry(&self, entry: AuditLogEntry);
    async fn recent_logs(&self, limit: i64) -> Result<Vec<AuditLogEntry>, DomainError>;
    async fn usage_stats(&self, filter: &UsageStatsFilter) -> Result<UsageStats, DomainError>;
    async fn associations(
        &self,
        filter: &AssociationFilter,
    ) -> Result<Vec<Association>, DomainError>;
    async fn suspicious_activity(&self) -> Result<Vec<SuspiciousIp>, DomainError>;
    async fn purge_older_than(&self, days: u32) -> Result<(u64, u64), DomainError>;
}

// Implement the traits for the concrete services

#[async_trait::async_trait]
impl<R: ApiKeyRepository + 'static> ApiKeyServiceTrait for ApiKeyService<R> {
    async fn validate(&self, secret: &str) -> Result<Option<ApiKey>, DomainError> {
        ApiKeyService::validate(self, secret).await
    }

    async fn issue(
        &self,
        user_id: Option<Uuid>,
        name: &str,
        role: ApiKeyRole,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<IssuedApiKey, DomainError> {
        ApiKeyService::issue(self, user_id, name, role, expires_at).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<ApiKey>, DomainError> {
        ApiKeyService::get(self, id).await
    }

    async fn update(&self, id: Uuid, update: ApiKeyUpdate) -> Result<ApiKey, DomainError> {
        ApiKeyService::update(self, id, update).await
    }

    async fn deactivate(&self, id: Uuid) -> Result<ApiKey, DomainError> {
        ApiKeyService::deactivate(self, id).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), DomainError> {
        ApiKeyService::delete(self, id).await
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<ApiKey>, DomainError> {
        ApiKeyService::list_for_user(self, user_id).await
    }

    async fn list(&self) -> Result<Vec<ApiKey>, DomainError> {
        ApiKeyService::list(self).await
    }
}

#[async_trait::async_trait]
impl<R: RateLimitRepository + 'static> RateLimiterTrait for RateLimiter<R> {
    async fn admit(
        &self,
        identifier: &str,
        endpoint: &str,
        quota: &RateLimitQuota,
    ) -> Result<RateLimitDecision, DomainError> {
        RateLimiter::admit(self, identifier, endpoint, quota).await
    }

    async fn info(
        &self,
        identifier: &str,
        endpoint: &str,
        quota: &RateLimitQuota,
    ) -> Result<RateLimitDecision, DomainError> {
        RateLimiter::info(self, identifier, endpoint, quota).await
    }

    async fn reset(&self, identifier: &str, endpoint: &str) -> Result<bool, DomainError> {
        RateLimiter::reset(self, identifier, endpoint).await
    }

    async fn cleanup_expired(&self) -> Result<u64, DomainError> {
        RateLimiter::cleanup_expired(self).await
    }
}

#[async_trait::async_trait]
impl<R: AuditRepository + 'static> AuditServiceTrait for AuditService<R> {
    async fn record(&self, entry: AuditLogEntry) -> Result<(), DomainError> {
        AuditService::record(self, entry).await
    }

    async fn record_with_retry(&self, entry: AuditLogEntry) {
        AuditService::record_with_retry(self, entry).await
    }

    async fn recent_logs(&self, limit: i64) -> Result<Vec<AuditLogEntry>, DomainError> {
        AuditService::recent_logs(self, limit).await
    }

    async fn usage_stats(&self, filter: &UsageStatsFilter) -> Result<UsageStats, DomainError> {
        AuditService::usage_stats(self, filter).await
    }

    async fn associations(
        &self,
        filter: &AssociationFilter,
    ) -> Result<Vec<Association>, DomainError> {
        AuditService::associations(self, filter).await
    }

    async fn suspicious_activity(&self) -> Result<Vec<SuspiciousIp>, DomainError> {
        AuditService::suspicious_activity(self).await
    }

    async fn purge_older_than(&self, days: u32) -> Result<(u64, u64), DomainError> {
        AuditService::purge_older_than(self, days).await
    }
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        api_keys: Arc<dyn ApiKeyServiceTrait>,
        rate_limiter: Arc<dyn RateLimiterTrait>,
        audit: Arc<dyn AuditServiceTrait>,
        weather: Arc<dyn WeatherProvider>,
        geocoding: Arc<dyn GeocodingProvider>,
        images: Arc<dyn ImageProvider>,
        bootstrap_secret: Option<String>,
    ) -> Self {
        Self {
            api_keys,
            rate_limiter,
            audit,
            weather,
            geocoding,
            images,
            bootstrap_secret,
        }
    }
}
