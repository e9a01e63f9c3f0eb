//! Out-of-band maintenance job
//!
//! Periodically drops fully expired rate-limit windows and audit rows past
//! the retention horizon. Governance stays correct without it (expired
//! windows are reset lazily); this only keeps the tables small.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::domain::audit::AuditRepository;
use crate::domain::rate_limit::RateLimitRepository;
use crate::infrastructure::audit::AuditService;
use crate::infrastructure::rate_limit::RateLimiter;

#[derive(Debug, Clone, Copy)]
pub struct MaintenanceConfig {
    pub interval: Duration,
    pub audit_retention_days: u32,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3600),
            audit_retention_days: 90,
        }
    }
}

/// Spawn the periodic cleanup task
pub fn spawn_maintenance<RL, AU>(
    limiter: Arc<RateLimiter<RL>>,
    audit: Arc<AuditService<AU>>,
    config: MaintenanceConfig,
) -> JoinHandle<()>
where
    RL: RateLimitRepository + 'static,
    AU: AuditRepository + 'static,
{
    info!(
        interval_secs = config.interval.as_secs(),
        retention_days = config.audit_retention_days,
        "Starting maintenance job"
    );

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick fires immediately; skip it so startup stays quiet
        ticker.tick().await;

        loop {
            ticker.tick().await;

            if let Err(e) = limiter.cleanup_expired().await {
                warn!(error = %e, "Rate limit cleanup failed");
            }

            if let Err(e) = audit.purge_older_than(config.audit_retention_days).await {
                warn!(error = %e, "Audit retention purge failed");
            }
        }
    })
}
