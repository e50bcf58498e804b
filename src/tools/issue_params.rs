//! Parameters for the issue tools: `get_issue`, `get_issues`, `refresh_issue`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetIssueParams {
    #[schemars(description = "Issue key, e.g. 'PROJ-123'")]
    pub key: String,

    #[schemars(description = "Fields to request from Jira on a cache miss (default: configured field set)")]
    pub fields: Option<Vec<String>>,

    /// Overrides the status-based freshness budget.
    #[schemars(
        description = "Maximum acceptable age of the cached copy in seconds. 0 forces a refetch but keeps the cached copy as a fallback."
    )]
    pub max_age_secs: Option<i64>,

    #[schemars(description = "Skip the cache and fetch from Jira (default: false)")]
    pub force_refresh: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetIssuesParams {
    #[schemars(description = "Issue keys to fetch. Each key reports its own source or error.")]
    pub keys: Vec<String>,

    #[schemars(description = "Fields to request from Jira for cache misses")]
    pub fields: Option<Vec<String>>,

    #[schemars(description = "Maximum acceptable age of cached copies in seconds")]
    pub max_age_secs: Option<i64>,

    #[schemars(description = "Skip the cache for every key (default: false)")]
    pub force_refresh: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RefreshIssueParams {
    #[schemars(description = "Issue key to refetch from Jira")]
    pub key: String,

    #[schemars(description = "Fields to request from Jira")]
    pub fields: Option<Vec<String>>,
}
