//! Rate limit window and policy types

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How many requests an identifier may make against an endpoint within one
/// window. Recognized policies live here; routes may also carry a custom
/// quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitQuota {
    /// Window length in milliseconds
    pub window_ms: i64,
    /// Maximum requests per window
    pub max_requests: i32,
}

impl RateLimitQuota {
    pub fn new(window_ms: i64, max_requests: i32) -> Self {
        Self {
            window_ms,
            max_requests,
        }
    }

    /// Background-image lookups: 30 requests per minute
    pub fn background_images() -> Self {
        Self::new(60_000, 30)
    }

    /// Forecast and geocoding reads: 100 requests per minute
    pub fn forecast_reads() -> Self {
        Self::new(60_000, 100)
    }

    /// Key issuance and other authentication endpoints: 5 per 5 minutes
    pub fn authentication() -> Self {
        Self::new(300_000, 5)
    }

    pub fn window(&self) -> Duration {
        Duration::milliseconds(self.window_ms)
    }
}

impl Default for RateLimitQuota {
    /// Fallback for routes without a named policy: 50 requests per minute
    fn default() -> Self {
        Self::new(60_000, 50)
    }
}

/// Persistent request counter for one (identifier, endpoint) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitWindow {
    /// `key:<uuid>` for authenticated callers, `ip:<addr>` otherwise
    pub identifier: String,
    pub endpoint: String,
    pub request_count: i32,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub max_requests: i32,
    pub window_ms: i64,
    pub last_request: DateTime<Utc>,
}

impl RateLimitWindow {
    /// Open a fresh window with one request counted
    pub fn open(
        identifier: impl Into<String>,
        endpoint: impl Into<String>,
        quota: &RateLimitQuota,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            endpoint: endpoint.into(),
            request_count: 1,
            window_start: now,
            window_end: now + quota.window(),
            max_requests: quota.max_requests,
            window_ms: quota.window_ms,
            last_request: now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.window_end
    }
}

/// Outcome of an admission check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: i32,
    pub remaining: i32,
    /// When the current window closes and the counter resets
    pub reset_at: DateTime<Utc>,
}

impl RateLimitDecision {
    pub fn admitted(limit: i32, remaining: i32, reset_at: DateTime<Utc>) -> Self {
        Self {
            allowed: true,
            limit,
            remaining: remaining.max(0),
            reset_at,
        }
    }

    pub fn rejected(limit: i32, reset_at: DateTime<Utc>) -> Self {
        Self {
            allowed: false,
            limit,
            remaining: 0,
            reset_at,
        }
    }

    /// Seconds a rejected caller should wait before retrying
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> i64 {
        (self.reset_at - now).num_seconds().max(0)
    }
}
