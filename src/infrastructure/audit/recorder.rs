//! Audit Recorder service
//!
//! One log append plus one association upsert per processed request.
//! Writes never participate in the request they describe: a failure is
//! retried a bounded number of times and then logged, nothing more.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info};

use crate::domain::DomainError;
use crate::domain::audit::{
    Association, AssociationFilter, AuditLogEntry, AuditRepository, SuspiciousIp,
    SuspicionThresholds, UsageStats, UsageStatsFilter,
};

/// Attempts per audit write before the entry is dropped (and logged)
const WRITE_ATTEMPTS: u32 = 3;
/// Pause between write attempts
const RETRY_BACKOFF: Duration = Duration::from_millis(200);

/// Audit service over the persistent store
#[derive(Debug)]
pub struct AuditService<R>
where
    R: AuditRepository,
{
    repository: Arc<R>,
    thresholds: SuspicionThresholds,
}

impl<R: AuditRepository> AuditService<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self {
            repository,
            thresholds: SuspicionThresholds::default(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: SuspicionThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Perform both audit writes for one request: the immutable log entry
    /// and the (ip, key, user) association bump.
    pub async fn record(&self, entry: AuditLogEntry) -> Result<(), DomainError> {
        let ip = entry.ip_address.clone();
        let api_key_id = entry.api_key_id;
        let user_id = entry.user_id;
        let user_agent = entry.user_agent.clone();
        let seen_at = entry.created_at;

        self.repository.insert_log(entry).await?;
        self.repository
            .upsert_association(&ip, api_key_id, user_id, user_agent, seen_at)
            .await
    }

    /// Record with bounded retries, used directly by detached writers and
    /// by tests that want the retry behavior observable.
    pub async fn record_with_retry(&self, entry: AuditLogEntry) {
        for attempt in 1..=WRITE_ATTEMPTS {
            match self.record(entry.clone()).await {
                Ok(()) => {
                    if attempt > 1 {
                        debug!(attempt, "Audit write succeeded after retry");
                    }
                    return;
                }
                Err(e) if attempt < WRITE_ATTEMPTS => {
                    debug!(attempt, error = %e, "Audit write failed; retrying");
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
                Err(e) => {
                    error!(
                        endpoint = %entry.endpoint,
                        ip = %entry.ip_address,
                        error = %e,
                        "Dropping audit entry after {} attempts",
                        WRITE_ATTEMPTS
                    );
                }
            }
        }
    }

    pub async fn recent_logs(&self, limit: i64) -> Result<Vec<AuditLogEntry>, DomainError> {
        self.repository.recent_logs(limit).await
    }

    pub async fn usage_stats(&self, filter: &UsageStatsFilter) -> Result<UsageStats, DomainError> {
        self.repository.usage_stats(filter).await
    }

    pub async fn associations(
        &self,
        filter: &AssociationFilter,
    ) -> Result<Vec<Association>, DomainError> {
        self.repository.associations(filter).await
    }

    /// Per-IP activity over the last hour that crosses any abuse threshold
    pub async fn suspicious_activity(&self) -> Result<Vec<SuspiciousIp>, DomainError> {
        let since = Utc::now() - chrono::Duration::hours(1);
        self.repository
            .suspicious_activity(since, &self.thresholds)
            .await
    }

    /// Drop audit rows past the retention horizon
    pub async fn purge_older_than(&self, days: u32) -> Result<(u64, u64), DomainError> {
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(days));
        let (logs, associations) = self.repository.purge_before(cutoff).await?;

        if logs > 0 || associations > 0 {
            info!(logs, associations, days, "Purged audit rows past retention");
        }

        Ok((logs, associations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::audit::InMemoryAuditRepository;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicU32, Ordering};
    use uuid::Uuid;

    fn service() -> AuditService<InMemoryAuditRepository> {
        AuditService::new(Arc::new(InMemoryAuditRepository::new()))
    }

    fn entry(ip: &str) -> AuditLogEntry {
        AuditLogEntry::new("/api/weather", "GET", ip).with_outcome(200, 7)
    }

    #[tokio::test]
    async fn test_record_writes_log_and_association() {
        let service = service();

        service.record(entry("203.0.113.7")).await.unwrap();
        service.record(entry("203.0.113.7")).await.unwrap();

        let stats = service.usage_stats(&UsageStatsFilter::default()).await.unwrap();
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.unique_ips, 1);

        let associations = service
            .associations(&AssociationFilter::default())
            .await
            .unwrap();
        assert_eq!(associations.len(), 1);
        assert_eq!(associations[0].hit_count, 2);
    }

    #[tokio::test]
    async fn test_association_identity_is_exact_triple() {
        let service = service();
        let key_id = Uuid::new_v4();

        // Same IP, once anonymous and once with a key: two rows
        service.record(entry("203.0.113.7")).await.unwrap();
        service
            .record(entry("203.0.113.7").with_caller(Some(key_id), None))
            .await
            .unwrap();

        let associations = service
            .associations(&AssociationFilter::default())
            .await
            .unwrap();
        assert_eq!(associations.len(), 2);
    }

    #[tokio::test]
    async fn test_n_requests_one_association() {
        let service = service();
        let key_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();

        for _ in 0..5 {
            service
                .record(entry("203.0.113.7").with_caller(Some(key_id), Some(user_id)))
                .await
                .unwrap();
        }

        let associations = service
            .associations(&AssociationFilter {
                api_key_id: Some(key_id),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(associations.len(), 1);
        assert_eq!(associations[0].hit_count, 5);
        assert_eq!(associations[0].user_id, Some(user_id));
    }

    #[tokio::test]
    async fn test_usage_stats_error_rate_and_top_endpoints() {
        let service = service();

        service.record(entry("203.0.113.7")).await.unwrap();
        service.record(entry("203.0.113.7")).await.unwrap();
        service
            .record(
                AuditLogEntry::new("/api/geocode", "GET", "203.0.113.8")
                    .with_outcome(500, 3)
                    .with_error("boom"),
            )
            .await
            .unwrap();
        service
            .record(AuditLogEntry::new("/api/geocode", "GET", "203.0.113.8").with_outcome(401, 1))
            .await
            .unwrap();

        let stats = service.usage_stats(&UsageStatsFilter::default()).await.unwrap();
        assert_eq!(stats.total_requests, 4);
        assert_eq!(stats.unique_ips, 2);
        assert!((stats.error_rate - 0.5).abs() < f64::EPSILON);
        assert_eq!(stats.top_endpoints.len(), 2);
        assert_eq!(stats.top_endpoints[0].count, 2);
    }

    #[tokio::test]
    async fn test_usage_stats_filter_by_key() {
        let service = service();
        let key_id = Uuid::new_v4();

        service.record(entry("203.0.113.7")).await.unwrap();
        service
            .record(entry("203.0.113.7").with_caller(Some(key_id), None))
            .await
            .unwrap();

        let stats = service
            .usage_stats(&UsageStatsFilter {
                api_key_id: Some(key_id),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(stats.total_requests, 1);
    }

    #[tokio::test]
    async fn test_suspicious_activity_thresholds() {
        let service = AuditService::new(Arc::new(InMemoryAuditRepository::new()))
            .with_thresholds(SuspicionThresholds {
                max_requests: 10,
                max_error_rate: 0.5,
                max_errors: 3,
            });

        // Quiet IP: under every threshold
        service.record(entry("198.51.100.1")).await.unwrap();

        // Noisy IP: above the request threshold
        for _ in 0..11 {
            service.record(entry("203.0.113.9")).await.unwrap();
        }

        // Error-heavy IP: 4 errors out of 5
        for _ in 0..4 {
            service
                .record(
                    AuditLogEntry::new("/api/weather", "GET", "203.0.113.10").with_outcome(500, 2),
                )
                .await
                .unwrap();
        }
        service.record(entry("203.0.113.10")).await.unwrap();

        let flagged = service.suspicious_activity().await.unwrap();
        let ips: Vec<&str> = flagged.iter().map(|s| s.ip_address.as_str()).collect();

        assert_eq!(ips, vec!["203.0.113.9", "203.0.113.10"]);
        assert!(flagged[1].error_rate > 0.5);
    }

    #[tokio::test]
    async fn test_purge_older_than() {
        let repo = Arc::new(InMemoryAuditRepository::new());
        let service = AuditService::new(repo.clone());

        let mut old = entry("203.0.113.7");
        old.created_at = Utc::now() - chrono::Duration::days(45);
        service.record(old).await.unwrap();
        service.record(entry("203.0.113.8")).await.unwrap();

        let (logs, associations) = service.purge_older_than(30).await.unwrap();
        assert_eq!(logs, 1);
        // The old entry's association was refreshed at record time with an
        // old last_seen, so it is purge-eligible too
        assert_eq!(associations, 1);

        let stats = service.usage_stats(&UsageStatsFilter::default()).await.unwrap();
        assert_eq!(stats.total_requests, 1);
    }

    /// Fails the first N writes, then delegates to the in-memory repo
    #[derive(Debug)]
    struct FlakyRepository {
        inner: InMemoryAuditRepository,
        failures_left: AtomicU32,
    }

    impl FlakyRepository {
        fn failing(n: u32) -> Self {
            Self {
                inner: InMemoryAuditRepository::new(),
                failures_left: AtomicU32::new(n),
            }
        }

        fn take_failure(&self) -> Result<(), DomainError> {
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(DomainError::storage("transient write failure"));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl AuditRepository for FlakyRepository {
        async fn insert_log(&self, entry: AuditLogEntry) -> Result<(), DomainError> {
            self.take_failure()?;
            self.inner.insert_log(entry).await
        }

        async fn upsert_association(
            &self,
            ip_address: &str,
            api_key_id: Option<Uuid>,
            user_id: Option<Uuid>,
            user_agent: Option<String>,
            seen_at: DateTime<Utc>,
        ) -> Result<(), DomainError> {
            self.inner
                .upsert_association(ip_address, api_key_id, user_id, user_agent, seen_at)
                .await
        }

        async fn recent_logs(&self, limit: i64) -> Result<Vec<AuditLogEntry>, DomainError> {
            self.inner.recent_logs(limit).await
        }

        async fn usage_stats(&self, filter: &UsageStatsFilter) -> Result<UsageStats, DomainError> {
            self.inner.usage_stats(filter).await
        }

        async fn associations(
            &self,
            filter: &AssociationFilter,
        ) -> Result<Vec<Association>, DomainError> {
            self.inner.associations(filter).await
        }

        async fn suspicious_activity(
            &self,
            since: DateTime<Utc>,
            thresholds: &SuspicionThresholds,
        ) -> Result<Vec<SuspiciousIp>, DomainError> {
            self.inner.suspicious_activity(since, thresholds).await
        }

        async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<(u64, u64), DomainError> {
            self.inner.purge_before(cutoff).await
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failure() {
        let service = AuditService::new(Arc::new(FlakyRepository::failing(2)));

        service.record_with_retry(entry("203.0.113.7")).await;

        let stats = service.usage_stats(&UsageStatsFilter::default()).await.unwrap();
        assert_eq!(stats.total_requests, 1);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_bound() {
        let service = AuditService::new(Arc::new(FlakyRepository::failing(10)));

        // Must return (and drop the entry) rather than loop forever
        service.record_with_retry(entry("203.0.113.7")).await;

        let stats = service.usage_stats(&UsageStatsFilter::default()).await.unwrap();
        assert_eq!(stats.total_requests, 0);
    }
}
