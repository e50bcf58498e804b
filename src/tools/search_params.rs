//! Parameters for `search_issues`, `keyword_search`, and `similar_issues`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SearchIssuesParams {
    #[schemars(description = "JQL query")]
    pub jql: String,

    #[schemars(description = "Fields to return (default: configured field set)")]
    pub fields: Option<Vec<String>>,

    #[schemars(description = "Maximum issues per page (1-100). Defaults to 50.")]
    pub limit: Option<usize>,

    #[schemars(description = "Index of the first issue to return. Defaults to 0.")]
    pub offset: Option<usize>,

    #[schemars(description = "Maximum acceptable age of a cached result set in seconds")]
    pub max_age_secs: Option<i64>,

    #[schemars(description = "Skip the cache and query Jira (default: false)")]
    pub force_refresh: Option<bool>,
}

/// Keyword search runs against the local cache only.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct KeywordSearchParams {
    #[schemars(
        description = "Full-text query over cached issue keys, summaries and descriptions. Supports AND/OR/NOT and \"quoted phrases\"."
    )]
    pub query: String,

    #[schemars(description = "Maximum results (1-50). Defaults to 10.")]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SimilarIssuesParams {
    #[schemars(description = "Free text to find similar cached issues for. Required unless 'key' is provided.")]
    pub text: Option<String>,

    #[schemars(description = "Find issues similar to this cached issue. Required unless 'text' is provided.")]
    pub key: Option<String>,

    #[schemars(description = "Maximum results (1-20). Defaults to 5.")]
    pub limit: Option<usize>,

    #[schemars(description = "Issue keys to leave out of the results")]
    pub exclude: Option<Vec<String>>,
}
