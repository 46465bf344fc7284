// src/health/status.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable snapshot of one completed health check.
///
/// Serializes as `{"is_healthy": bool, "last_checked": RFC3339 timestamp}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub is_healthy: bool,
    pub last_checked: DateTime<Utc>,
}

impl HealthStatus {
    /// Timestamp a check result with the current time.
    pub fn observe(is_healthy: bool) -> Self {
        Self {
            is_healthy,
            last_checked: Utc::now(),
        }
    }
}
