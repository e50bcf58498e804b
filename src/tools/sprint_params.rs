use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetSprintParams {
    #[schemars(description = "Sprint id")]
    pub sprint_id: i64,

    #[schemars(description = "Maximum acceptable age of the cached sprint in seconds")]
    pub max_age_secs: Option<i64>,

    #[schemars(description = "Skip the cache and fetch from Jira (default: false)")]
    pub force_refresh: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SprintIssuesParams {
    #[schemars(description = "Sprint id")]
    pub sprint_id: i64,

    #[schemars(description = "Fields to return (default: configured field set)")]
    pub fields: Option<Vec<String>>,

    #[schemars(description = "Maximum issues per page (1-100). Defaults to 50.")]
    pub limit: Option<usize>,

    #[schemars(description = "Index of the first issue to return. Defaults to 0.")]
    pub offset: Option<usize>,

    #[schemars(description = "Maximum acceptable age of a cached page in seconds")]
    pub max_age_secs: Option<i64>,

    #[schemars(description = "Skip the cache and query Jira (default: false)")]
    pub force_refresh: Option<bool>,
}
