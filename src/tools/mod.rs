pub mod cache_params;
pub mod issue_params;
pub mod search_params;
pub mod sprint_params;

use std::collections::HashSet;
use std::sync::Arc;

use cache_params::{InvalidateParams, PurgeParams, StatsParams};
use issue_params::{GetIssueParams, GetIssuesParams, RefreshIssueParams};
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use search_params::{KeywordSearchParams, SearchIssuesParams, SimilarIssuesParams};
use serde::Serialize;
use sprint_params::{GetSprintParams, SprintIssuesParams};

use jira_cache::degrade::fit_to_budget;
use jira_cache::retrieval::{InvalidateScope, ReadOptions, RetrievalError, Retriever};

const DEFAULT_PAGE: usize = 50;
const MAX_PAGE: usize = 100;

/// The jira-cache MCP tool handler. Every result is passed through the
/// response-size budget before it is returned.
#[derive(Clone)]
pub struct CacheTools {
    tool_router: ToolRouter<Self>,
    retriever: Arc<Retriever>,
    max_chars: usize,
}

#[tool_router]
impl CacheTools {
    pub fn new(retriever: Arc<Retriever>, max_chars: usize) -> Self {
        Self {
            tool_router: Self::tool_router(),
            retriever,
            max_chars,
        }
    }

    #[tool(description = "Get one Jira issue. Served from the local cache when fresh (freshness depends on status: long for Done, short for In Progress); falls back to a stale cached copy, marked source=stale_cache, if Jira is unreachable.")]
    async fn get_issue(
        &self,
        Parameters(params): Parameters<GetIssueParams>,
    ) -> Result<String, String> {
        tracing::info!(key = %params.key, "get_issue called");
        let opts = read_options(params.max_age_secs, params.force_refresh);
        let result = self
            .retriever
            .get_issue(params.key.trim(), params.fields, opts)
            .await;
        self.respond(result)
    }

    #[tool(description = "Get several Jira issues at once. Cached keys are served locally, the rest are fetched in one request; each key reports its own source or error.")]
    async fn get_issues(
        &self,
        Parameters(params): Parameters<GetIssuesParams>,
    ) -> Result<String, String> {
        if params.keys.is_empty() {
            return Err("keys must not be empty".into());
        }
        tracing::info!(count = params.keys.len(), "get_issues called");
        let opts = read_options(params.max_age_secs, params.force_refresh);
        let result = self
            .retriever
            .get_issues(&params.keys, params.fields, opts)
            .await;
        self.respond(result)
    }

    #[tool(description = "Refetch one issue from Jira, bypassing the cache, and update the cache with the result.")]
    async fn refresh_issue(
        &self,
        Parameters(params): Parameters<RefreshIssueParams>,
    ) -> Result<String, String> {
        tracing::info!(key = %params.key, "refresh_issue called");
        let result = self
            .retriever
            .refresh_issue(params.key.trim(), params.fields)
            .await;
        self.respond(result)
    }

    #[tool(description = "Run a JQL search. Result pages are cached by normalized query, fields, limit and offset.")]
    async fn search_issues(
        &self,
        Parameters(params): Parameters<SearchIssuesParams>,
    ) -> Result<String, String> {
        if params.jql.trim().is_empty() {
            return Err("jql must not be empty".into());
        }
        let limit = page_limit(params.limit);
        let offset = params.offset.unwrap_or(0);
        tracing::info!(jql = %params.jql, limit, offset, "search_issues called");
        let opts = read_options(params.max_age_secs, params.force_refresh);
        let result = self
            .retriever
            .search(&params.jql, params.fields, limit, offset, opts)
            .await;
        self.respond(result)
    }

    #[tool(description = "Get sprint metadata (name, state, dates, goal).")]
    async fn get_sprint(
        &self,
        Parameters(params): Parameters<GetSprintParams>,
    ) -> Result<String, String> {
        tracing::info!(sprint_id = params.sprint_id, "get_sprint called");
        let opts = read_options(params.max_age_secs, params.force_refresh);
        let result = self.retriever.get_sprint(params.sprint_id, opts).await;
        self.respond(result)
    }

    #[tool(description = "List the issues in a sprint, one page at a time.")]
    async fn sprint_issues(
        &self,
        Parameters(params): Parameters<SprintIssuesParams>,
    ) -> Result<String, String> {
        let limit = page_limit(params.limit);
        let offset = params.offset.unwrap_or(0);
        tracing::info!(sprint_id = params.sprint_id, limit, offset, "sprint_issues called");
        let opts = read_options(params.max_age_secs, params.force_refresh);
        let result = self
            .retriever
            .sprint_issues(params.sprint_id, params.fields, limit, offset, opts)
            .await;
        self.respond(result)
    }

    #[tool(description = "Keyword search over cached issues only (never calls Jira). Supports AND/OR/NOT and quoted phrases; an invalid query returns no results.")]
    async fn keyword_search(
        &self,
        Parameters(params): Parameters<KeywordSearchParams>,
    ) -> Result<String, String> {
        let limit = params.limit.unwrap_or(10).clamp(1, 50);
        tracing::info!(query = %params.query, limit, "keyword_search called");
        let result = self
            .retriever
            .keyword_search(&params.query, limit)
            .map(|issues| serde_json::json!({ "count": issues.len(), "issues": issues }));
        self.respond(result)
    }

    #[tool(description = "Find cached issues similar in meaning to a piece of text or to another cached issue. Returns available=false when the embedding model is not installed.")]
    async fn similar_issues(
        &self,
        Parameters(params): Parameters<SimilarIssuesParams>,
    ) -> Result<String, String> {
        let limit = params.limit.unwrap_or(5).clamp(1, 20);
        let exclude: HashSet<String> = params.exclude.unwrap_or_default().into_iter().collect();

        let result = match (params.text, params.key) {
            (Some(text), _) if !text.trim().is_empty() => {
                tracing::info!(text_len = text.len(), limit, "similar_issues called");
                self.retriever.similar_issues(&text, limit, exclude).await
            }
            (_, Some(key)) => {
                tracing::info!(key = %key, limit, "similar_issues called");
                self.retriever
                    .similar_to_issue(key.trim(), limit, exclude)
                    .await
            }
            _ => return Err("provide either 'text' or 'key'".into()),
        };
        self.respond(result)
    }

    #[tool(description = "Drop cached data. scope='issue' (with key), 'sprint' (with sprint_id), 'searches', or 'all'. With refresh=true a single issue or sprint is refetched immediately.")]
    async fn cache_invalidate(
        &self,
        Parameters(params): Parameters<InvalidateParams>,
    ) -> Result<String, String> {
        let scope = match params.scope.trim().to_lowercase().as_str() {
            "issue" => InvalidateScope::Issue(
                params
                    .key
                    .map(|k| k.trim().to_string())
                    .filter(|k| !k.is_empty())
                    .ok_or("scope 'issue' requires 'key'")?,
            ),
            "sprint" => InvalidateScope::Sprint(
                params.sprint_id.ok_or("scope 'sprint' requires 'sprint_id'")?,
            ),
            "searches" => InvalidateScope::Searches,
            "all" => InvalidateScope::All,
            other => {
                return Err(format!(
                    "unknown scope '{other}'. Expected: issue, sprint, searches, all"
                ))
            }
        };
        tracing::info!(scope = ?scope, "cache_invalidate called");
        let result = self
            .retriever
            .invalidate(scope, params.refresh.unwrap_or(false))
            .await;
        self.respond(result)
    }

    #[tool(description = "Remove issues cached more than 7 days ago and searches cached more than 12 hours ago. Requires confirm=true.")]
    async fn cache_purge(
        &self,
        Parameters(params): Parameters<PurgeParams>,
    ) -> Result<String, String> {
        if !params.confirm {
            return Err("purge requires confirm=true".into());
        }
        tracing::info!("cache_purge called");
        self.respond(self.retriever.purge())
    }

    #[tool(description = "Cache statistics: record counts, hit/miss totals, stale fallbacks, purge totals, store size and schema version.")]
    async fn cache_stats(
        &self,
        Parameters(_params): Parameters<StatsParams>,
    ) -> Result<String, String> {
        tracing::info!("cache_stats called");
        self.respond(self.retriever.stats())
    }

    /// Upstream failures become a structured `{"error": ..}` result; storage
    /// failures end the call.
    fn respond<T: Serialize>(&self, result: Result<T, RetrievalError>) -> Result<String, String> {
        let value = match result {
            Ok(data) => {
                serde_json::to_value(&data).map_err(|e| format!("serialization failed: {e}"))?
            }
            Err(RetrievalError::Upstream(e)) => serde_json::json!({
                "error": e.to_string(),
                "kind": "upstream_unavailable",
            }),
            Err(RetrievalError::Storage(e)) => {
                tracing::error!(error = %format!("{e:#}"), "storage failure");
                return Err(format!("storage error: {e:#}"));
            }
        };
        Ok(fit_to_budget(&value, self.max_chars))
    }
}

fn read_options(max_age_secs: Option<i64>, force_refresh: Option<bool>) -> ReadOptions {
    ReadOptions {
        max_age_secs,
        force_refresh: force_refresh.unwrap_or(false),
    }
}

fn page_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE)
}

#[tool_handler]
impl ServerHandler for CacheTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "jira-cache serves Jira issues, sprints and JQL searches from a local cache. \
                 Use get_issue / search_issues for reads, keyword_search and similar_issues \
                 to search what is already cached, and cache_invalidate after changing an \
                 issue in Jira."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jira_cache::upstream::{Unconfigured, UpstreamError};

    #[test]
    fn page_limit_is_clamped() {
        assert_eq!(page_limit(None), DEFAULT_PAGE);
        assert_eq!(page_limit(Some(0)), 1);
        assert_eq!(page_limit(Some(1000)), MAX_PAGE);
    }

    fn tools(max_chars: usize) -> CacheTools {
        let store = jira_cache::cache::CacheStore::open_in_memory(
            jira_cache::cache::FlushPolicy::immediate(),
        )
        .unwrap();
        let similarity = jira_cache::similarity::SimilarityIndex::disabled(store.connection());
        let retriever = Retriever::new(
            Arc::new(store),
            Arc::new(similarity),
            Arc::new(Unconfigured::new("no credentials")),
            jira_cache::config::FreshnessConfig::default(),
            Vec::new(),
        );
        CacheTools::new(Arc::new(retriever), max_chars)
    }

    #[test]
    fn upstream_errors_become_structured_results() {
        let tools = tools(50_000);
        let result: Result<serde_json::Value, RetrievalError> =
            Err(RetrievalError::Upstream(UpstreamError::Status {
                status: 503,
                body: "service unavailable".into(),
            }));
        let out = tools.respond(result).unwrap();
        let json: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(json["kind"], "upstream_unavailable");
        assert!(json["error"].as_str().unwrap().contains("503"));
    }

    #[test]
    fn storage_errors_fail_the_call() {
        let tools = tools(50_000);
        let result: Result<serde_json::Value, RetrievalError> =
            Err(RetrievalError::Storage(anyhow::anyhow!("disk full")));
        assert!(tools.respond(result).unwrap_err().contains("disk full"));
    }

    #[test]
    fn oversized_results_are_fitted_to_the_budget() {
        let tools = tools(2_000);
        let issues: Vec<_> = (0..50)
            .map(|i| serde_json::json!({"key": format!("PROJ-{i}"), "summary": "x".repeat(500)}))
            .collect();
        let out = tools
            .respond(Ok::<_, RetrievalError>(serde_json::json!({ "issues": issues })))
            .unwrap();
        assert!(out.len() <= 2_000);
        let json: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(json["pagination"]["has_more"], true);
    }

    #[test]
    fn read_options_default_to_cached_reads() {
        let opts = read_options(None, None);
        assert!(!opts.force_refresh);
        assert!(opts.max_age_secs.is_none());
    }
}
