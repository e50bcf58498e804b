//! Status-driven freshness policy for issues.
//!
//! The budget is derived from the status recorded at the last write, not the
//! live upstream status. An issue that moved from "Done" back to "In Progress"
//! upstream keeps its long budget until the cache next refreshes it.

use chrono::Duration;

use crate::config::{AdaptiveTtlConfig, FreshnessConfig};

#[derive(Debug, Clone)]
pub struct AdaptiveTtl {
    terminal: Duration,
    active: Duration,
    fallback: Duration,
    terminal_statuses: Vec<String>,
    active_statuses: Vec<String>,
}

impl AdaptiveTtl {
    pub fn from_config(ttl: &AdaptiveTtlConfig, freshness: &FreshnessConfig) -> Self {
        let lower = |list: &[String]| list.iter().map(|s| s.trim().to_lowercase()).collect();
        Self {
            terminal: ttl_from_secs(ttl.terminal_secs),
            active: ttl_from_secs(ttl.active_secs),
            fallback: ttl_from_secs(freshness.issue_ttl_secs),
            terminal_statuses: lower(&ttl.terminal_statuses),
            active_statuses: lower(&ttl.active_statuses),
        }
    }

    /// Freshness budget for a cached status. Unknown or missing statuses get
    /// the fixed issue default.
    pub fn for_status(&self, status: Option<&str>) -> Duration {
        let Some(status) = status.map(|s| s.trim().to_lowercase()) else {
            return self.fallback;
        };
        if self.terminal_statuses.contains(&status) {
            self.terminal
        } else if self.active_statuses.contains(&status) {
            self.active
        } else {
            self.fallback
        }
    }

    pub fn fallback(&self) -> Duration {
        self.fallback
    }
}

/// Seconds to a freshness budget. Negative values clamp to zero; values past
/// what [`Duration`] can hold saturate to [`Duration::MAX`] (never expires).
pub fn ttl_from_secs(secs: i64) -> Duration {
    Duration::try_seconds(secs.max(0)).unwrap_or(Duration::MAX)
}

impl Default for AdaptiveTtl {
    fn default() -> Self {
        Self::from_config(&AdaptiveTtlConfig::default(), &FreshnessConfig::default())
    }
}
