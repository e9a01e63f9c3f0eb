//! In-memory rate limit repository implementation
//!
//! Every write happens under one lock, which makes the conditional
//! operations naturally atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::DomainError;
use crate::domain::rate_limit::{RateLimitRepository, RateLimitWindow};

type PairKey = (String, String);

/// In-memory implementation of RateLimitRepository
#[derive(Debug, Default)]
pub struct InMemoryRateLimitRepository {
    windows: Arc<RwLock<HashMap<PairKey, RateLimitWindow>>>,
}

impl InMemoryRateLimitRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(identifier: &str, endpoint: &str) -> PairKey {
        (identifier.to_string(), endpoint.to_string())
    }
}

#[async_trait]
impl RateLimitRepository for InMemoryRateLimitRepository {
    async fn fetch(
        &self,
        identifier: &str,
        endpoint: &str,
    ) -> Result<Option<RateLimitWindow>, DomainError> {
        let windows = self.windows.read().await;
        Ok(windows.get(&Self::key(identifier, endpoint)).cloned())
    }

    async fn try_increment(
        &self,
        identifier: &str,
        endpoint: &str,
        max_requests: i32,
        now: DateTime<Utc>,
    ) -> Result<Option<(i32, DateTime<Utc>)>, DomainError> {
        let mut windows = self.windows.write().await;

        match windows.get_mut(&Self::key(identifier, endpoint)) {
            Some(window) if now <= window.window_end && window.request_count < max_requests => {
                window.request_count += 1;
                window.last_request = now;
                Ok(Some((window.request_count, window.window_end)))
            }
            _ => Ok(None),
        }
    }

    async fn start_window(&self, window: RateLimitWindow) -> Result<bool, DomainError> {
        let mut windows = self.windows.write().await;
        let key = Self::key(&window.identifier, &window.endpoint);

        if windows.contains_key(&key) {
            return Ok(false);
        }

        windows.insert(key, window);
        Ok(true)
    }

    async fn restart_window(
        &self,
        window: RateLimitWindow,
        now: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        let mut windows = self.windows.write().await;
        let key = Self::key(&window.identifier, &window.endpoint);

        match windows.get(&key) {
            Some(existing) if existing.window_end < now => {
                windows.insert(key, window);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, identifier: &str, endpoint: &str) -> Result<bool, DomainError> {
        let mut windows = self.windows.write().await;
        Ok(windows.remove(&Self::key(identifier, endpoint)).is_some())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, DomainError> {
        let mut windows = self.windows.write().await;
        let before = windows.len();
        windows.retain(|_, w| w.window_end >= now);
        Ok((before - windows.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rate_limit::RateLimitQuota;
    use chrono::Duration;

    fn quota() -> RateLimitQuota {
        RateLimitQuota::new(60_000, 3)
    }

    #[tokio::test]
    async fn test_start_window_once() {
        let repo = InMemoryRateLimitRepository::new();
        let now = Utc::now();
        let window = RateLimitWindow::open("ip:a", "/w", &quota(), now);

        assert!(repo.start_window(window.clone()).await.unwrap());
        assert!(!repo.start_window(window).await.unwrap());
    }

    #[tokio::test]
    async fn test_try_increment_respects_ceiling() {
        let repo = InMemoryRateLimitRepository::new();
        let now = Utc::now();
        repo.start_window(RateLimitWindow::open("ip:a", "/w", &quota(), now))
            .await
            .unwrap();

        assert_eq!(
            repo.try_increment("ip:a", "/w", 3, now).await.unwrap().map(|r| r.0),
            Some(2)
        );
        assert_eq!(
            repo.try_increment("ip:a", "/w", 3, now).await.unwrap().map(|r| r.0),
            Some(3)
        );
        // At the ceiling
        assert!(repo.try_increment("ip:a", "/w", 3, now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_try_increment_ignores_expired_window() {
        let repo = InMemoryRateLimitRepository::new();
        let now = Utc::now();
        repo.start_window(RateLimitWindow::open("ip:a", "/w", &quota(), now))
            .await
            .unwrap();

        let later = now + Duration::milliseconds(60_001);
        assert!(repo.try_increment("ip:a", "/w", 3, later).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_restart_only_when_expired() {
        let repo = InMemoryRateLimitRepository::new();
        let now = Utc::now();
        repo.start_window(RateLimitWindow::open("ip:a", "/w", &quota(), now))
            .await
            .unwrap();

        // Still live: refuse
        let fresh = RateLimitWindow::open("ip:a", "/w", &quota(), now);
        assert!(!repo.restart_window(fresh, now).await.unwrap());

        // Expired: allow
        let later = now + Duration::milliseconds(60_001);
        let fresh = RateLimitWindow::open("ip:a", "/w", &quota(), later);
        assert!(repo.restart_window(fresh, later).await.unwrap());

        let stored = repo.fetch("ip:a", "/w").await.unwrap().unwrap();
        assert_eq!(stored.request_count, 1);
        assert_eq!(stored.window_start, later);
    }

    #[tokio::test]
    async fn test_restart_missing_row() {
        let repo = InMemoryRateLimitRepository::new();
        let now = Utc::now();
        let fresh = RateLimitWindow::open("ip:a", "/w", &quota(), now);
        assert!(!repo.restart_window(fresh, now).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_expired_only() {
        let repo = InMemoryRateLimitRepository::new();
        let now = Utc::now();

        repo.start_window(RateLimitWindow::open("ip:a", "/w", &quota(), now))
            .await
            .unwrap();
        repo.start_window(RateLimitWindow::open(
            "ip:b",
            "/w",
            &RateLimitQuota::new(10, 3),
            now - Duration::seconds(1),
        ))
        .await
        .unwrap();

        assert_eq!(repo.delete_expired(now).await.unwrap(), 1);
        assert!(repo.fetch("ip:a", "/w").await.unwrap().is_some());
        assert!(repo.fetch("ip:b", "/w").await.unwrap().is_none());
    }
}
