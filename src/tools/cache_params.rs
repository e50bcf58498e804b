//! Parameters for the cache maintenance tools.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct InvalidateParams {
    #[schemars(description = "What to drop: 'issue', 'sprint', 'searches', or 'all'")]
    pub scope: String,

    #[schemars(description = "Issue key (scope 'issue')")]
    pub key: Option<String>,

    #[schemars(description = "Sprint id (scope 'sprint')")]
    pub sprint_id: Option<i64>,

    /// Only meaningful for the single-record scopes.
    #[schemars(
        description = "Refetch the issue or sprint immediately after dropping it (default: false)"
    )]
    pub refresh: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct PurgeParams {
    #[schemars(description = "Must be true. Removes issues older than 7 days and searches older than 12 hours.")]
    pub confirm: bool,
}

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct StatsParams {}
