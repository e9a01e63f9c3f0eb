//! Rate limit window repository trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Debug;

use super::entity::RateLimitWindow;
use crate::domain::DomainError;

/// Storage for per-(identifier, endpoint) request windows.
///
/// The write operations are deliberately conditional so that two concurrent
/// requests for the same pair cannot both slip under the ceiling: an
/// increment only succeeds against a live window below `max_requests`, an
/// insert only succeeds when no row exists, and a restart only succeeds
/// against a window that has already closed.
#[async_trait]
pub trait RateLimitRepository: Send + Sync + Debug {
    /// Load the window row for a pair, if any
    async fn fetch(
        &self,
        identifier: &str,
        endpoint: &str,
    ) -> Result<Option<RateLimitWindow>, DomainError>;

    /// Atomically add one request to a live window with room left.
    /// Returns the post-increment count and the window end, or `None`
    /// when no row qualifies (missing, expired, or at the ceiling).
    async fn try_increment(
        &self,
        identifier: &str,
        endpoint: &str,
        max_requests: i32,
        now: DateTime<Utc>,
    ) -> Result<Option<(i32, DateTime<Utc>)>, DomainError>;

    /// Insert a fresh window. Returns false if a row already exists
    /// (a concurrent request opened it first).
    async fn start_window(&self, window: RateLimitWindow) -> Result<bool, DomainError>;

    /// Reset an expired window to the given fresh one (count = 1, new
    /// bounds). Returns false if the stored window is still live — a
    /// concurrent request already reset it.
    async fn restart_window(
        &self,
        window: RateLimitWindow,
        now: DateTime<Utc>,
    ) -> Result<bool, DomainError>;

    /// Administrative override: drop the row entirely
    async fn delete(&self, identifier: &str, endpoint: &str) -> Result<bool, DomainError>;

    /// Bulk-delete rows whose window has fully passed
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, DomainError>;
}
