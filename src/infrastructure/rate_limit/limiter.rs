//! Rate limiter service
//!
//! Fixed-window admission over the persistent store. A window either does
//! not exist yet, is live, or has expired; expired windows are reset in
//! place (count back to 1, fresh bounds). Store failures reject the
//! request — the governance layer never fails open.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::domain::DomainError;
use crate::domain::rate_limit::{
    RateLimitDecision, RateLimitQuota, RateLimitRepository, RateLimitWindow,
};

/// Rate limiter backing the Gateway's admission checks
#[derive(Debug)]
pub struct RateLimiter<R>
where
    R: RateLimitRepository,
{
    repository: Arc<R>,
}

impl<R: RateLimitRepository> RateLimiter<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Admit or reject one request for (identifier, endpoint) under the
    /// given quota.
    ///
    /// The store operations are conditional (increment under ceiling,
    /// insert-if-absent, reset-if-expired), so concurrent admits cannot
    /// overshoot the limit. Losing one of those races is retried once;
    /// persistent contention or store failure rejects.
    pub async fn admit(
        &self,
        identifier: &str,
        endpoint: &str,
        quota: &RateLimitQuota,
    ) -> Result<RateLimitDecision, DomainError> {
        let now = Utc::now();

        for _ in 0..2 {
            if let Some((count, window_end)) = self
                .repository
                .try_increment(identifier, endpoint, quota.max_requests, now)
                .await
                .map_err(unavailable)?
            {
                return Ok(RateLimitDecision::admitted(
                    quota.max_requests,
                    quota.max_requests - count,
                    window_end,
                ));
            }

            match self
                .repository
                .fetch(identifier, endpoint)
                .await
                .map_err(unavailable)?
            {
                None => {
                    let window = RateLimitWindow::open(identifier, endpoint, quota, now);
                    let window_end = window.window_end;

                    if self
                        .repository
                        .start_window(window)
                        .await
                        .map_err(unavailable)?
                    {
                        return Ok(RateLimitDecision::admitted(
                            quota.max_requests,
                            quota.max_requests - 1,
                            window_end,
                        ));
                    }
                    // A concurrent request opened the window first; retry.
                }
                Some(existing) if existing.is_expired(now) => {
                    let window = RateLimitWindow::open(identifier, endpoint, quota, now);
                    let window_end = window.window_end;

                    if self
                        .repository
                        .restart_window(window, now)
                        .await
                        .map_err(unavailable)?
                    {
                        return Ok(RateLimitDecision::admitted(
                            quota.max_requests,
                            quota.max_requests - 1,
                            window_end,
                        ));
                    }
                    // A concurrent request reset the window first; retry.
                }
                Some(existing) => {
                    debug!(
                        identifier = %identifier,
                        endpoint = %endpoint,
                        count = existing.request_count,
                        "Rate limit exceeded"
                    );
                    return Ok(RateLimitDecision::rejected(
                        quota.max_requests,
                        existing.window_end,
                    ));
                }
            }
        }

        warn!(
            identifier = %identifier,
            endpoint = %endpoint,
            "Rate limit window contention persisted; rejecting"
        );
        Err(DomainError::rate_limiter_unavailable(
            "window contention persisted across retries",
        ))
    }

    /// Read-only view of the current window; never mutates
    pub async fn info(
        &self,
        identifier: &str,
        endpoint: &str,
        quota: &RateLimitQuota,
    ) -> Result<RateLimitDecision, DomainError> {
        let now = Utc::now();

        match self
            .repository
            .fetch(identifier, endpoint)
            .await
            .map_err(unavailable)?
        {
            Some(window) if !window.is_expired(now) => {
                let remaining = (window.max_requests - window.request_count).max(0);
                Ok(RateLimitDecision {
                    allowed: remaining > 0,
                    limit: window.max_requests,
                    remaining,
                    reset_at: window.window_end,
                })
            }
            // No live window: the next request opens a fresh one
            _ => Ok(RateLimitDecision::admitted(
                quota.max_requests,
                quota.max_requests,
                now,
            )),
        }
    }

    /// Administrative override: forget the window entirely
    pub async fn reset(&self, identifier: &str, endpoint: &str) -> Result<bool, DomainError> {
        self.repository.delete(identifier, endpoint).await
    }

    /// Drop rows whose window has fully passed. Run out of band.
    pub async fn cleanup_expired(&self) -> Result<u64, DomainError> {
        let deleted = self.repository.delete_expired(Utc::now()).await?;
        if deleted > 0 {
            debug!(deleted, "Cleaned up expired rate limit windows");
        }
        Ok(deleted)
    }
}

fn unavailable(err: DomainError) -> DomainError {
    match err {
        e @ DomainError::RateLimiterUnavailable { .. } => e,
        other => DomainError::rate_limiter_unavailable(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::rate_limit::InMemoryRateLimitRepository;
    use async_trait::async_trait;
    use chrono::DateTime;

    const IDENT: &str = "ip:203.0.113.7";
    const ENDPOINT: &str = "/api/weather";

    fn limiter() -> RateLimiter<InMemoryRateLimitRepository> {
        RateLimiter::new(Arc::new(InMemoryRateLimitRepository::new()))
    }

    #[tokio::test]
    async fn test_admits_up_to_limit_then_rejects() {
        let limiter = limiter();
        let quota = RateLimitQuota::new(60_000, 5);

        let mut reset_at = None;
        for expected_remaining in [4, 3, 2, 1, 0] {
            let decision = limiter.admit(IDENT, ENDPOINT, &quota).await.unwrap();
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
            assert_eq!(decision.limit, 5);

            match reset_at {
                None => reset_at = Some(decision.reset_at),
                Some(at) => assert_eq!(decision.reset_at, at),
            }
        }

        let rejected = limiter.admit(IDENT, ENDPOINT, &quota).await.unwrap();
        assert!(!rejected.allowed);
        assert_eq!(rejected.remaining, 0);
        // Retry boundary is the original window end, not a fresh one
        assert_eq!(rejected.reset_at, reset_at.unwrap());
    }

    #[tokio::test]
    async fn test_window_reset_after_expiry() {
        let limiter = limiter();
        let quota = RateLimitQuota::new(40, 5);

        let first = limiter.admit(IDENT, ENDPOINT, &quota).await.unwrap();
        for _ in 0..4 {
            limiter.admit(IDENT, ENDPOINT, &quota).await.unwrap();
        }
        assert!(!limiter.admit(IDENT, ENDPOINT, &quota).await.unwrap().allowed);

        tokio::time::sleep(std::time::Duration::from_millis(60)).await;

        let fresh = limiter.admit(IDENT, ENDPOINT, &quota).await.unwrap();
        assert!(fresh.allowed);
        assert_eq!(fresh.remaining, 4);
        assert!(fresh.reset_at > first.reset_at);
    }

    #[tokio::test]
    async fn test_identifiers_are_independent() {
        let limiter = limiter();
        let quota = RateLimitQuota::new(60_000, 1);

        assert!(limiter.admit("ip:a", ENDPOINT, &quota).await.unwrap().allowed);
        assert!(!limiter.admit("ip:a", ENDPOINT, &quota).await.unwrap().allowed);
        assert!(limiter.admit("ip:b", ENDPOINT, &quota).await.unwrap().allowed);
        // Same identifier on a different endpoint buckets separately
        assert!(limiter.admit("ip:a", "/api/geocode", &quota).await.unwrap().allowed);
    }

    #[tokio::test]
    async fn test_info_does_not_mutate() {
        let limiter = limiter();
        let quota = RateLimitQuota::new(60_000, 5);

        limiter.admit(IDENT, ENDPOINT, &quota).await.unwrap();

        let info1 = limiter.info(IDENT, ENDPOINT, &quota).await.unwrap();
        let info2 = limiter.info(IDENT, ENDPOINT, &quota).await.unwrap();
        assert_eq!(info1.remaining, 4);
        assert_eq!(info2.remaining, 4);
    }

    #[tokio::test]
    async fn test_info_without_window() {
        let limiter = limiter();
        let quota = RateLimitQuota::new(60_000, 5);

        let info = limiter.info(IDENT, ENDPOINT, &quota).await.unwrap();
        assert!(info.allowed);
        assert_eq!(info.remaining, 5);
    }

    #[tokio::test]
    async fn test_reset_clears_window() {
        let limiter = limiter();
        let quota = RateLimitQuota::new(60_000, 1);

        limiter.admit(IDENT, ENDPOINT, &quota).await.unwrap();
        assert!(!limiter.admit(IDENT, ENDPOINT, &quota).await.unwrap().allowed);

        assert!(limiter.reset(IDENT, ENDPOINT).await.unwrap());

        let decision = limiter.admit(IDENT, ENDPOINT, &quota).await.unwrap();
        assert!(decision.allowed);
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let limiter = limiter();
        let quota = RateLimitQuota::new(30, 5);

        limiter.admit("ip:a", ENDPOINT, &quota).await.unwrap();
        limiter.admit("ip:b", ENDPOINT, &quota).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(limiter.cleanup_expired().await.unwrap(), 2);
        assert_eq!(limiter.cleanup_expired().await.unwrap(), 0);
    }

    /// Repository that always fails, to exercise the fail-closed path
    #[derive(Debug)]
    struct BrokenRepository;

    #[async_trait]
    impl RateLimitRepository for BrokenRepository {
        async fn fetch(
            &self,
            _identifier: &str,
            _endpoint: &str,
        ) -> Result<Option<RateLimitWindow>, DomainError> {
            Err(DomainError::storage("store unreachable"))
        }

        async fn try_increment(
            &self,
            _identifier: &str,
            _endpoint: &str,
            _max_requests: i32,
            _now: DateTime<Utc>,
        ) -> Result<Option<(i32, DateTime<Utc>)>, DomainError> {
            Err(DomainError::storage("store unreachable"))
        }

        async fn start_window(&self, _window: RateLimitWindow) -> Result<bool, DomainError> {
            Err(DomainError::storage("store unreachable"))
        }

        async fn restart_window(
            &self,
            _window: RateLimitWindow,
            _now: DateTime<Utc>,
        ) -> Result<bool, DomainError> {
            Err(DomainError::storage("store unreachable"))
        }

        async fn delete(&self, _identifier: &str, _endpoint: &str) -> Result<bool, DomainError> {
            Err(DomainError::storage("store unreachable"))
        }

        async fn delete_expired(&self, _now: DateTime<Utc>) -> Result<u64, DomainError> {
            Err(DomainError::storage("store unreachable"))
        }
    }

    #[tokio::test]
    async fn test_store_failure_is_fail_closed() {
        let limiter = RateLimiter::new(Arc::new(BrokenRepository));
        let quota = RateLimitQuota::default();

        let result = limiter.admit(IDENT, ENDPOINT, &quota).await;
        assert!(matches!(
            result,
            Err(DomainError::RateLimiterUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_example_scenario_from_policy_table() {
        // policy {windowMs: 60000, maxRequests: 5} against /api/weather
        let limiter = limiter();
        let quota = RateLimitQuota::new(60_000, 5);

        let decisions: Vec<RateLimitDecision> = {
            let mut out = Vec::new();
            for _ in 0..5 {
                out.push(limiter.admit(IDENT, ENDPOINT, &quota).await.unwrap());
            }
            out
        };

        let remaining: Vec<i32> = decisions.iter().map(|d| d.remaining).collect();
        assert_eq!(remaining, vec![4, 3, 2, 1, 0]);

        let sixth = limiter.admit(IDENT, ENDPOINT, &quota).await.unwrap();
        assert!(!sixth.allowed);
        assert_eq!(sixth.reset_at, decisions[0].reset_at);
        assert!(sixth.retry_after_secs(Utc::now()) <= 60);
    }
}
