//! Cached record definitions.
//!
//! [`CachedIssue`], [`CachedSprint`], and [`CachedSearch`] mirror the `issues`,
//! `sprints`, and `searches` tables. Each carries the noise-stripped upstream
//! record in `raw` and the `cached_at` timestamp that freshness is measured from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A cached issue, keyed by its external key (e.g. `PROJ-123`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedIssue {
    pub key: String,
    pub summary: String,
    pub status: String,
    pub assignee: Option<String>,
    pub issue_type: String,
    pub sprint_id: Option<i64>,
    pub parent_key: Option<String>,
    pub priority: String,
    pub labels: Vec<String>,
    pub start_date: Option<String>,
    pub due_date: Option<String>,
    /// Plain text projected out of the rich-text description, used for indexing.
    #[serde(skip_serializing, default)]
    pub description_text: String,
    /// Upstream record after noise stripping.
    pub raw: serde_json::Value,
    pub cached_at: DateTime<Utc>,
}

/// Cached sprint metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedSprint {
    pub id: i64,
    pub name: String,
    pub state: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub goal: Option<String>,
    pub raw: serde_json::Value,
    pub cached_at: DateTime<Utc>,
}

/// A cached search result set, keyed by the normalized query hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedSearch {
    pub query_hash: String,
    pub query: String,
    pub fields: Vec<String>,
    /// Issue keys in upstream result order.
    pub result_keys: Vec<String>,
    /// Total declared by upstream, which may exceed `result_keys.len()`.
    pub total: i64,
    pub raw: serde_json::Value,
    pub cached_at: DateTime<Utc>,
}

impl CachedIssue {
    /// Seconds elapsed since this record was written.
    pub fn age_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.cached_at).num_seconds()
    }
}
