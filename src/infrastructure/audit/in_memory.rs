//! In-memory audit repository implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::DomainError;
use crate::domain::audit::{
    Association, AssociationFilter, AuditLogEntry, AuditRepository, EndpointCount, SuspiciousIp,
    SuspicionThresholds, UsageStats, UsageStatsFilter,
};

/// In-memory implementation of AuditRepository
#[derive(Debug, Default)]
pub struct InMemoryAuditRepository {
    logs: Arc<RwLock<Vec<AuditLogEntry>>>,
    associations: Arc<RwLock<Vec<Association>>>,
}

impl InMemoryAuditRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn matches_filter(entry: &AuditLogEntry, filter: &UsageStatsFilter) -> bool {
        if let Some(key_id) = filter.api_key_id {
            if entry.api_key_id != Some(key_id) {
                return false;
            }
        }
        if let Some(user_id) = filter.user_id {
            if entry.user_id != Some(user_id) {
                return false;
            }
        }
        if let Some(since) = filter.since {
            if entry.created_at < since {
                return false;
            }
        }
        if let Some(until) = filter.until {
            if entry.created_at > until {
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl AuditRepository for InMemoryAuditRepository {
    async fn insert_log(&self, entry: AuditLogEntry) -> Result<(), DomainError> {
        self.logs.write().await.push(entry);
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
        let mut associations = self.associations.write().await;

        if let Some(existing) = associations
            .iter_mut()
            .find(|a| a.matches(ip_address, api_key_id, user_id))
        {
            existing.observe(user_agent, seen_at);
        } else {
            associations.push(Association::first_contact(
                ip_address, api_key_id, user_id, user_agent, seen_at,
            ));
        }

        Ok(())
    }

    async fn recent_logs(&self, limit: i64) -> Result<Vec<AuditLogEntry>, DomainError> {
        let logs = self.logs.read().await;
        let mut recent: Vec<AuditLogEntry> = logs.iter().cloned().collect();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        recent.truncate(limit.max(0) as usize);
        Ok(recent)
    }

    async fn usage_stats(&self, filter: &UsageStatsFilter) -> Result<UsageStats, DomainError> {
        let logs = self.logs.read().await;
        let selected: Vec<&AuditLogEntry> = logs
            .iter()
            .filter(|e| Self::matches_filter(e, filter))
            .collect();

        if selected.is_empty() {
            return Ok(UsageStats::default());
        }

        let total = selected.len() as i64;
        let unique_ips = selected
            .iter()
            .map(|e| e.ip_address.as_str())
            .collect::<HashSet<_>>()
            .len() as i64;
        let errors = selected.iter().filter(|e| e.is_error()).count() as i64;
        let avg_response_time_ms =
            selected.iter().map(|e| e.response_time_ms).sum::<i64>() as f64 / total as f64;

        let mut per_endpoint: HashMap<&str, i64> = HashMap::new();
        for entry in &selected {
            *per_endpoint.entry(entry.endpoint.as_str()).or_default() += 1;
        }
        let mut top_endpoints: Vec<EndpointCount> = per_endpoint
            .into_iter()
            .map(|(endpoint, count)| EndpointCount {
                endpoint: endpoint.to_string(),
                count,
            })
            .collect();
        top_endpoints.sort_by(|a, b| b.count.cmp(&a.count).then(a.endpoint.cmp(&b.endpoint)));
        top_endpoints.truncate(10);

        Ok(UsageStats {
            total_requests: total,
            unique_ips,
            avg_response_time_ms,
            error_rate: errors as f64 / total as f64,
            top_endpoints,
        })
    }

    async fn associations(
        &self,
        filter: &AssociationFilter,
    ) -> Result<Vec<Association>, DomainError> {
        let associations = self.associations.read().await;

        let mut selected: Vec<Association> = associations
            .iter()
            .filter(|a| {
                filter
                    .ip_address
                    .as_ref()
                    .is_none_or(|ip| &a.ip_address == ip)
                    && filter.api_key_id.is_none_or(|id| a.api_key_id == Some(id))
                    && filter.user_id.is_none_or(|id| a.user_id == Some(id))
                    && filter.min_hit_count.is_none_or(|min| a.hit_count >= min)
            })
            .cloned()
            .collect();

        selected.sort_by(|a, b| b.hit_count.cmp(&a.hit_count));
        Ok(selected)
    }

    async fn suspicious_activity(
        &self,
        since: DateTime<Utc>,
        thresholds: &SuspicionThresholds,
    ) -> Result<Vec<SuspiciousIp>, DomainError> {
        let logs = self.logs.read().await;

        let mut per_ip: HashMap<&str, (i64, i64)> = HashMap::new();
        for entry in logs.iter().filter(|e| e.created_at >= since) {
            let counts = per_ip.entry(entry.ip_address.as_str()).or_default();
            counts.0 += 1;
            if entry.is_error() {
                counts.1 += 1;
            }
        }

        let mut flagged: Vec<SuspiciousIp> = per_ip
            .into_iter()
            .filter_map(|(ip, (requests, errors))| {
                let error_rate = errors as f64 / requests as f64;
                let suspicious = requests > thresholds.max_requests
                    || error_rate > thresholds.max_error_rate
                    || errors > thresholds.max_errors;

                suspicious.then(|| SuspiciousIp {
                    ip_address: ip.to_string(),
                    request_count: requests,
                    error_count: errors,
                    error_rate,
                })
            })
            .collect();

        flagged.sort_by(|a, b| b.request_count.cmp(&a.request_count));
        Ok(flagged)
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<(u64, u64), DomainError> {
        let mut logs = self.logs.write().await;
        let logs_before = logs.len();
        logs.retain(|e| e.created_at >= cutoff);
        let logs_deleted = (logs_before - logs.len()) as u64;

        let mut associations = self.associations.write().await;
        let assoc_before = associations.len();
        associations.retain(|a| a.last_seen >= cutoff);
        let assoc_deleted = (assoc_before - associations.len()) as u64;

        Ok((logs_deleted, assoc_deleted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(ip: &str, endpoint: &str, status: i32) -> AuditLogEntry {
        AuditLogEntry::new(endpoint, "GET", ip).with_outcome(status, 10)
    }

    #[tokio::test]
    async fn test_empty_stats() {
        let repo = InMemoryAuditRepository::new();
        let stats = repo.usage_stats(&UsageStatsFilter::default()).await.unwrap();
        assert_eq!(stats.total_requests, 0);
        assert_eq!(stats.error_rate, 0.0);
        assert!(stats.top_endpoints.is_empty());
    }

    #[tokio::test]
    async fn test_top_endpoints_capped_at_ten() {
        let repo = InMemoryAuditRepository::new();

        for i in 0..12 {
            repo.insert_log(entry("1.2.3.4", &format!("/api/e{}", i), 200))
                .await
                .unwrap();
        }
        // One endpoint with more traffic floats to the top
        repo.insert_log(entry("1.2.3.4", "/api/e3", 200)).await.unwrap();

        let stats = repo.usage_stats(&UsageStatsFilter::default()).await.unwrap();
        assert_eq!(stats.top_endpoints.len(), 10);
        assert_eq!(stats.top_endpoints[0].endpoint, "/api/e3");
        assert_eq!(stats.top_endpoints[0].count, 2);
    }

    #[tokio::test]
    async fn test_association_filters() {
        let repo = InMemoryAuditRepository::new();
        let key_id = Uuid::new_v4();
        let now = Utc::now();

        repo.upsert_association("1.1.1.1", None, None, None, now)
            .await
            .unwrap();
        repo.upsert_association("1.1.1.1", None, None, None, now)
            .await
            .unwrap();
        repo.upsert_association("2.2.2.2", Some(key_id), None, None, now)
            .await
            .unwrap();

        let by_ip = repo
            .associations(&AssociationFilter {
                ip_address: Some("1.1.1.1".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_ip.len(), 1);
        assert_eq!(by_ip[0].hit_count, 2);

        let by_min_hits = repo
            .associations(&AssociationFilter {
                min_hit_count: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_min_hits.len(), 1);

        let by_key = repo
            .associations(&AssociationFilter {
                api_key_id: Some(key_id),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_key.len(), 1);
        assert_eq!(by_key[0].ip_address, "2.2.2.2");
    }

    #[tokio::test]
    async fn test_associations_sorted_by_hits() {
        let repo = InMemoryAuditRepository::new();
        let now = Utc::now();

        repo.upsert_association("1.1.1.1", None, None, None, now)
            .await
            .unwrap();
        for _ in 0..3 {
            repo.upsert_association("2.2.2.2", None, None, None, now)
                .await
                .unwrap();
        }

        let all = repo.associations(&AssociationFilter::default()).await.unwrap();
        assert_eq!(all[0].ip_address, "2.2.2.2");
        assert_eq!(all[0].hit_count, 3);
    }

    #[tokio::test]
    async fn test_suspicious_ignores_entries_before_window() {
        let repo = InMemoryAuditRepository::new();
        let thresholds = SuspicionThresholds {
            max_requests: 2,
            max_error_rate: 1.1,
            max_errors: 100,
        };

        let mut old = entry("9.9.9.9", "/api/weather", 200);
        old.created_at = Utc::now() - chrono::Duration::hours(2);
        for _ in 0..5 {
            repo.insert_log(old.clone()).await.unwrap();
        }

        let since = Utc::now() - chrono::Duration::hours(1);
        assert!(repo.suspicious_activity(since, &thresholds).await.unwrap().is_empty());
    }
}
