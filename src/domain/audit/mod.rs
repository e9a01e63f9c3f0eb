//! Audit trail domain model

mod entity;
mod repository;

pub use entity::{
    Association, AssociationFilter, AuditLogEntry, EndpointCount, SuspiciousIp, UsageStats,
    UsageStatsFilter,
};
pub use repository::{AuditRepository, SuspicionThresholds};
