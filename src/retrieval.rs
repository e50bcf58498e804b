//! Cache-aside retrieval.
//!
//! Every read follows the same path: check the store (unless a refresh is
//! forced), fetch from upstream on a miss, write the result through to the
//! store and both indexes, and respond. When upstream fails, the last cached
//! copy is served regardless of age with [`Source::StaleCache`] and a warning.
//! Only when there is no cached copy at all does the upstream failure reach the
//! caller, as [`RetrievalError::Upstream`].
//!
//! Storage failures are never recovered here; they surface as
//! [`RetrievalError::Storage`].

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::cache::counters::{STALE_SERVED, UPSTREAM_ERRORS};
use crate::cache::extract::project_issue;
use crate::cache::noise::strip_noise;
use crate::cache::search_key::search_key;
use crate::cache::stats::StatsResponse;
use crate::cache::ttl::ttl_from_secs;
use crate::cache::{CacheStore, CachedIssue, CachedSearch, NewSearch};
use crate::config::FreshnessConfig;
use crate::similarity::SimilarityIndex;
use crate::upstream::{IssueTracker, SearchPage, UpstreamError};

/// Keys per upstream `key in (...)` search; Jira caps `maxResults` at 100.
pub const MAX_BATCH_KEYS: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

pub type Result<T, E = RetrievalError> = std::result::Result<T, E>;

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Cache,
    Upstream,
    StaleCache,
}

/// A retrieved value tagged with its provenance.
#[derive(Debug, Clone, Serialize)]
pub struct Fetched<T> {
    pub source: Source,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<DateTime<Utc>>,
    /// Present whenever `source` is [`Source::StaleCache`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub data: T,
}

impl<T> Fetched<T> {
    fn cache(data: T, cached_at: DateTime<Utc>) -> Self {
        Self {
            source: Source::Cache,
            cached_at: Some(cached_at),
            warning: None,
            data,
        }
    }

    fn upstream(data: T) -> Self {
        Self {
            source: Source::Upstream,
            cached_at: None,
            warning: None,
            data,
        }
    }

    fn stale(data: T, cached_at: DateTime<Utc>, err: &UpstreamError) -> Self {
        Self {
            source: Source::StaleCache,
            cached_at: Some(cached_at),
            warning: Some(format!(
                "upstream unavailable ({err}); serving cached copy from {} which may be outdated",
                cached_at.to_rfc3339()
            )),
            data,
        }
    }
}

/// Per-call freshness controls shared by every read operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOptions {
    /// Overrides the entity's default (or adaptive) TTL. Zero forces a miss.
    pub max_age_secs: Option<i64>,
    pub force_refresh: bool,
}

impl ReadOptions {
    pub fn refresh() -> Self {
        Self {
            max_age_secs: None,
            force_refresh: true,
        }
    }

    fn max_age_or(&self, default: Duration) -> Duration {
        self.max_age_secs.map(ttl_from_secs).unwrap_or(default)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub query: String,
    pub total: i64,
    pub offset: usize,
    pub limit: usize,
    pub issues: Vec<Value>,
}

/// Outcome for one key of a batched issue read.
#[derive(Debug, Clone, Serialize)]
pub struct BatchEntry {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchResult {
    pub from_cache: usize,
    pub from_upstream: usize,
    pub from_stale_cache: usize,
    pub failed: usize,
    pub issues: Vec<BatchEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimilarResult {
    pub available: bool,
    pub issues: Vec<CachedIssue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidateScope {
    Issue(String),
    Sprint(i64),
    Searches,
    All,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvalidateOutcome {
    pub scope: String,
    pub removed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embeddings_removed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refreshed: Option<Fetched<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_error: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PurgeOutcome {
    pub issues_removed: usize,
    pub searches_removed: usize,
    pub embeddings_pruned: usize,
}

pub struct Retriever {
    store: Arc<CacheStore>,
    similarity: Arc<SimilarityIndex>,
    upstream: Arc<dyn IssueTracker>,
    freshness: FreshnessConfig,
    default_fields: Vec<String>,
}

impl Retriever {
    pub fn new(
        store: Arc<CacheStore>,
        similarity: Arc<SimilarityIndex>,
        upstream: Arc<dyn IssueTracker>,
        freshness: FreshnessConfig,
        default_fields: Vec<String>,
    ) -> Self {
        Self {
            store,
            similarity,
            upstream,
            freshness,
            default_fields,
        }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn similarity(&self) -> &SimilarityIndex {
        &self.similarity
    }

    fn fields(&self, requested: Option<Vec<String>>) -> Vec<String> {
        match requested {
            Some(fields) if !fields.is_empty() => fields,
            _ => self.default_fields.clone(),
        }
    }

    // ── Issues ───────────────────────────────────────────────────────────────

    pub async fn get_issue(
        &self,
        key: &str,
        fields: Option<Vec<String>>,
        opts: ReadOptions,
    ) -> Result<Fetched<Value>> {
        if !opts.force_refresh {
            let max_age = match opts.max_age_secs {
                Some(_) => opts.max_age_or(Duration::zero()),
                None => self.store.adaptive_ttl(key)?,
            };
            if let Some(hit) = self.store.get_issue(key, max_age)? {
                return Ok(Fetched::cache(hit.raw, hit.cached_at));
            }
        }

        let fields = self.fields(fields);
        match self.upstream.fetch_issue(key, &fields).await {
            Ok(raw) => {
                self.store.put_issue(&raw)?;
                self.index_issues(std::slice::from_ref(&raw)).await;
                Ok(Fetched::upstream(strip_noise(&raw)))
            }
            Err(err) => {
                let stale = self
                    .store
                    .get_issue_stale(key)?
                    .map(|issue| (issue.raw, issue.cached_at));
                self.fall_back(key, err, stale)
            }
        }
    }

    /// Force-refresh one issue from upstream.
    pub async fn refresh_issue(&self, key: &str, fields: Option<Vec<String>>) -> Result<Fetched<Value>> {
        self.get_issue(key, fields, ReadOptions::refresh()).await
    }

    /// Batched read. Cache hits are served directly; misses go upstream as
    /// `key in (...)` searches of at most [`MAX_BATCH_KEYS`] keys each. Each key
    /// reports its own outcome.
    pub async fn get_issues(
        &self,
        keys: &[String],
        fields: Option<Vec<String>>,
        opts: ReadOptions,
    ) -> Result<BatchResult> {
        let mut seen = HashSet::new();
        let keys: Vec<&str> = keys
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty() && seen.insert(k.to_string()))
            .collect();

        let mut entries: HashMap<&str, BatchEntry> = HashMap::new();
        let mut misses = Vec::new();
        for &key in &keys {
            if !opts.force_refresh {
                let max_age = match opts.max_age_secs {
                    Some(_) => opts.max_age_or(Duration::zero()),
                    None => self.store.adaptive_ttl(key)?,
                };
                if let Some(hit) = self.store.get_issue(key, max_age)? {
                    entries.insert(key, entry(key, Fetched::cache(hit.raw, hit.cached_at)));
                    continue;
                }
            }
            misses.push(key);
        }

        let fields = self.fields(fields);
        for chunk in misses.chunks(MAX_BATCH_KEYS) {
            let jql = format!(
                "key in ({})",
                chunk
                    .iter()
                    .map(|k| format!("\"{}\"", k.replace('"', "\\\"")))
                    .collect::<Vec<_>>()
                    .join(",")
            );
            match self.upstream.search(&jql, &fields, chunk.len(), 0).await {
                Ok(page) => {
                    self.store.put_issues(&page.issues)?;
                    self.index_issues(&page.issues).await;
                    let mut fetched: HashMap<String, Value> = page
                        .issues
                        .iter()
                        .filter_map(|raw| project_issue(raw).map(|p| (p.key, strip_noise(raw))))
                        .collect();
                    for &key in chunk {
                        let outcome = match fetched.remove(key) {
                            Some(raw) => entry(key, Fetched::upstream(raw)),
                            None => failure(key, &UpstreamError::NotFound(format!("issue {key}"))),
                        };
                        entries.insert(key, outcome);
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, keys = chunk.len(), "batched upstream fetch failed");
                    for &key in chunk {
                        let stale = self
                            .store
                            .get_issue_stale(key)?
                            .map(|issue| (issue.raw, issue.cached_at));
                        let outcome = match stale {
                            Some((raw, cached_at)) => {
                                self.store.bump(STALE_SERVED)?;
                                entry(key, Fetched::stale(raw, cached_at, &err))
                            }
                            None => failure(key, &err),
                        };
                        entries.insert(key, outcome);
                    }
                    self.store.bump(UPSTREAM_ERRORS)?;
                }
            }
        }

        let mut result = BatchResult::default();
        for key in keys {
            let Some(e) = entries.remove(key) else { continue };
            match e.source {
                Some(Source::Cache) => result.from_cache += 1,
                Some(Source::Upstream) => result.from_upstream += 1,
                Some(Source::StaleCache) => result.from_stale_cache += 1,
                None => result.failed += 1,
            }
            result.issues.push(e);
        }
        Ok(result)
    }

    // ── Searches ─────────────────────────────────────────────────────────────

    pub async fn search(
        &self,
        query: &str,
        fields: Option<Vec<String>>,
        limit: usize,
        offset: usize,
        opts: ReadOptions,
    ) -> Result<Fetched<SearchResult>> {
        let fields = self.fields(fields);
        let upstream = Arc::clone(&self.upstream);
        let (q, f) = (query.to_string(), fields.clone());
        self.cached_search(query, &fields, limit, offset, opts, async move {
            upstream.search(&q, &f, limit, offset).await
        })
        .await
    }

    /// Issues in a sprint. Pages are cached as searches keyed `sprint:<id>`.
    pub async fn sprint_issues(
        &self,
        sprint_id: i64,
        fields: Option<Vec<String>>,
        limit: usize,
        offset: usize,
        opts: ReadOptions,
    ) -> Result<Fetched<SearchResult>> {
        let fields = self.fields(fields);
        let upstream = Arc::clone(&self.upstream);
        let f = fields.clone();
        let label = format!("sprint:{sprint_id}");
        self.cached_search(&label, &fields, limit, offset, opts, async move {
            upstream.fetch_sprint_issues(sprint_id, &f, limit, offset).await
        })
        .await
    }

    async fn cached_search<F>(
        &self,
        query: &str,
        fields: &[String],
        limit: usize,
        offset: usize,
        opts: ReadOptions,
        fetch: F,
    ) -> Result<Fetched<SearchResult>>
    where
        F: Future<Output = Result<SearchPage, UpstreamError>>,
    {
        let hash = search_key(query, fields, limit, offset);

        if !opts.force_refresh {
            let max_age = opts.max_age_or(ttl_from_secs(self.freshness.search_ttl_secs));
            if let Some(hit) = self.store.get_search(&hash, max_age)? {
                // A result set whose issues were purged is treated as a miss.
                if let Some(issues) = self.load_all(&hit.result_keys)? {
                    let cached_at = hit.cached_at;
                    return Ok(Fetched::cache(search_result(hit, issues, limit, offset), cached_at));
                }
            }
        }

        match fetch.await {
            Ok(page) => {
                self.store.put_search(NewSearch {
                    query,
                    fields,
                    limit,
                    offset,
                    total: page.total,
                    issues: &page.issues,
                })?;
                self.index_issues(&page.issues).await;
                Ok(Fetched::upstream(SearchResult {
                    query: query.to_string(),
                    total: page.total,
                    offset,
                    limit,
                    issues: page.issues.iter().map(strip_noise).collect(),
                }))
            }
            Err(err) => {
                let stale = match self.store.get_search_stale(&hash)? {
                    Some(hit) => {
                        let issues = self.load_available(&hit.result_keys)?;
                        let cached_at = hit.cached_at;
                        Some((search_result(hit, issues, limit, offset), cached_at))
                    }
                    None => None,
                };
                self.fall_back(query, err, stale)
            }
        }
    }

    /// Every issue for `keys`, or `None` if any one is missing.
    fn load_all(&self, keys: &[String]) -> Result<Option<Vec<Value>>> {
        let mut issues = Vec::with_capacity(keys.len());
        for key in keys {
            match self.store.get_issue_stale(key)? {
                Some(issue) => issues.push(issue.raw),
                None => return Ok(None),
            }
        }
        Ok(Some(issues))
    }

    fn load_available(&self, keys: &[String]) -> Result<Vec<Value>> {
        let mut issues = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(issue) = self.store.get_issue_stale(key)? {
                issues.push(issue.raw);
            }
        }
        Ok(issues)
    }

    // ── Sprints ──────────────────────────────────────────────────────────────

    pub async fn get_sprint(&self, sprint_id: i64, opts: ReadOptions) -> Result<Fetched<Value>> {
        if !opts.force_refresh {
            let max_age = opts.max_age_or(ttl_from_secs(self.freshness.sprint_ttl_secs));
            if let Some(hit) = self.store.get_sprint(sprint_id, max_age)? {
                return Ok(Fetched::cache(hit.raw, hit.cached_at));
            }
        }

        match self.upstream.fetch_sprint(sprint_id).await {
            Ok(raw) => {
                self.store.put_sprint(&raw)?;
                Ok(Fetched::upstream(strip_noise(&raw)))
            }
            Err(err) => {
                let stale = self
                    .store
                    .get_sprint_stale(sprint_id)?
                    .map(|sprint| (sprint.raw, sprint.cached_at));
                self.fall_back(&format!("sprint {sprint_id}"), err, stale)
            }
        }
    }

    // ── Local search ─────────────────────────────────────────────────────────

    /// Ranked keyword search over the cache. Never calls upstream.
    pub fn keyword_search(&self, query: &str, limit: usize) -> Result<Vec<CachedIssue>> {
        Ok(self.store.keyword_search(query, limit)?)
    }

    /// Cached issues closest in meaning to `text`.
    pub async fn similar_issues(
        &self,
        text: &str,
        limit: usize,
        exclude: HashSet<String>,
    ) -> Result<SimilarResult> {
        if !self.similarity.is_available() {
            return Ok(SimilarResult {
                available: false,
                issues: Vec::new(),
            });
        }

        let similarity = Arc::clone(&self.similarity);
        let text = text.to_string();
        let keys = match tokio::task::spawn_blocking(move || similarity.query(&text, limit, &exclude))
            .await
        {
            Ok(Ok(keys)) => keys,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "similarity query failed");
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(error = %e, "similarity task panicked");
                Vec::new()
            }
        };

        let mut issues = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(issue) = self.store.get_issue_stale(&key)? {
                issues.push(issue);
            }
        }
        Ok(SimilarResult {
            available: true,
            issues,
        })
    }

    /// Cached issues similar to the cached issue `key`, excluding itself.
    pub async fn similar_to_issue(
        &self,
        key: &str,
        limit: usize,
        mut exclude: HashSet<String>,
    ) -> Result<SimilarResult> {
        let Some(issue) = self.store.get_issue_stale(key)? else {
            return Ok(SimilarResult {
                available: self.similarity.is_available(),
                issues: Vec::new(),
            });
        };
        exclude.insert(issue.key.clone());
        let text = crate::similarity::issue_text(&issue.summary, &issue.description_text);
        self.similar_issues(&text, limit, exclude).await
    }

    // ── Invalidation and maintenance ─────────────────────────────────────────

    /// Drop cached records for `scope`. With `refresh`, a single issue or
    /// sprint is re-fetched immediately; a failed re-fetch is reported, not raised.
    pub async fn invalidate(&self, scope: InvalidateScope, refresh: bool) -> Result<InvalidateOutcome> {
        let mut outcome = InvalidateOutcome {
            scope: String::new(),
            removed: 0,
            embeddings_removed: None,
            refreshed: None,
            refresh_error: None,
        };

        match scope {
            InvalidateScope::Issue(key) => {
                outcome.scope = format!("issue {key}");
                outcome.removed = usize::from(self.store.invalidate_issue(&key)?);
                if self.similarity.is_available() {
                    outcome.embeddings_removed = Some(usize::from(self.similarity.remove(&key)?));
                }
                if refresh {
                    match self.refresh_issue(&key, None).await {
                        Ok(fetched) => outcome.refreshed = Some(fetched),
                        Err(RetrievalError::Upstream(e)) => outcome.refresh_error = Some(e.to_string()),
                        Err(e) => return Err(e),
                    }
                }
            }
            InvalidateScope::Sprint(id) => {
                outcome.scope = format!("sprint {id}");
                outcome.removed = usize::from(self.store.invalidate_sprint(id)?);
                if refresh {
                    match self.get_sprint(id, ReadOptions::refresh()).await {
                        Ok(fetched) => outcome.refreshed = Some(fetched),
                        Err(RetrievalError::Upstream(e)) => outcome.refresh_error = Some(e.to_string()),
                        Err(e) => return Err(e),
                    }
                }
            }
            InvalidateScope::Searches => {
                outcome.scope = "searches".into();
                outcome.removed = self.store.invalidate_searches()?;
            }
            InvalidateScope::All => {
                outcome.scope = "all".into();
                let removed = self.store.invalidate_all()?;
                outcome.removed = removed.issues + removed.sprints + removed.searches;
                if self.similarity.is_available() {
                    outcome.embeddings_removed = Some(self.similarity.clear()?);
                }
            }
        }

        tracing::info!(scope = %outcome.scope, removed = outcome.removed, "cache invalidated");
        Ok(outcome)
    }

    /// Age-based purge, then drop embeddings whose issue is gone.
    pub fn purge(&self) -> Result<PurgeOutcome> {
        let purged = self.store.purge_stale()?;
        let embeddings_pruned = self.similarity.prune_orphans()?;
        Ok(PurgeOutcome {
            issues_removed: purged.issues_removed,
            searches_removed: purged.searches_removed,
            embeddings_pruned,
        })
    }

    pub fn stats(&self) -> Result<StatsResponse> {
        let mut stats = self.store.stats()?;
        if self.similarity.is_available() {
            stats.embeddings = Some(self.similarity.count()?);
        }
        Ok(stats)
    }

    // ── Internals ────────────────────────────────────────────────────────────

    fn fall_back<T>(
        &self,
        what: &str,
        err: UpstreamError,
        stale: Option<(T, DateTime<Utc>)>,
    ) -> Result<Fetched<T>> {
        self.store.bump(UPSTREAM_ERRORS)?;
        match stale {
            Some((data, cached_at)) => {
                self.store.bump(STALE_SERVED)?;
                tracing::warn!(what, error = %err, cached_at = %cached_at, "upstream failed, serving stale cache");
                Ok(Fetched::stale(data, cached_at, &err))
            }
            None => {
                tracing::warn!(what, error = %err, "upstream failed with nothing cached");
                Err(err.into())
            }
        }
    }

    /// Embed freshly written issues. Failures are logged and swallowed.
    async fn index_issues(&self, raws: &[Value]) {
        if !self.similarity.is_available() || raws.is_empty() {
            return;
        }
        let items: Vec<(String, String, String)> = raws
            .iter()
            .filter_map(project_issue)
            .map(|p| (p.key, p.summary, p.description_text))
            .collect();
        let similarity = Arc::clone(&self.similarity);
        match tokio::task::spawn_blocking(move || similarity.upsert_issues(&items)).await {
            Ok(Ok(n)) => tracing::debug!(embedded = n, "similarity index updated"),
            Ok(Err(e)) => tracing::warn!(error = %e, "failed to embed issues"),
            Err(e) => tracing::warn!(error = %e, "embedding task panicked"),
        }
    }
}

fn search_result(hit: CachedSearch, issues: Vec<Value>, limit: usize, offset: usize) -> SearchResult {
    SearchResult {
        query: hit.query,
        total: hit.total,
        offset,
        limit,
        issues,
    }
}

fn entry(key: &str, fetched: Fetched<Value>) -> BatchEntry {
    BatchEntry {
        key: key.to_string(),
        source: Some(fetched.source),
        warning: fetched.warning,
        error: None,
        issue: Some(fetched.data),
    }
}

fn failure(key: &str, err: &UpstreamError) -> BatchEntry {
    BatchEntry {
        key: key.to_string(),
        source: None,
        warning: None,
        error: Some(err.to_string()),
        issue: None,
    }
}
