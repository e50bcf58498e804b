#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use jira_cache::cache::{CacheStore, FlushPolicy};
use jira_cache::config::FreshnessConfig;
use jira_cache::embedding::{normalize, EmbeddingProvider, EMBEDDING_DIM};
use jira_cache::retrieval::Retriever;
use jira_cache::similarity::SimilarityIndex;
use jira_cache::upstream::{IssueTracker, SearchPage, UpstreamError};

/// In-memory store that flushes counters on every increment.
pub fn test_store() -> Arc<CacheStore> {
    Arc::new(CacheStore::open_in_memory(FlushPolicy::immediate()).unwrap())
}

/// A Jira-shaped issue record, including some upstream noise.
pub fn issue(key: &str, summary: &str, status: &str) -> Value {
    json!({
        "key": key,
        "self": format!("https://example.atlassian.net/rest/api/3/issue/{key}"),
        "expand": "renderedFields",
        "fields": {
            "summary": summary,
            "status": {
                "name": status,
                "iconUrl": "https://example.atlassian.net/icon.png",
                "statusCategory": { "key": "indeterminate" }
            },
            "issuetype": { "name": "Story" },
            "priority": { "name": "Medium" },
            "assignee": {
                "displayName": "Ada",
                "avatarUrls": { "48x48": "https://example/avatar.png" }
            },
            "labels": ["backend"],
            "description": format!("Details about {summary}")
        }
    })
}

pub fn sprint(id: i64, name: &str) -> Value {
    json!({
        "id": id,
        "self": format!("https://example.atlassian.net/rest/agile/1.0/sprint/{id}"),
        "name": name,
        "state": "active",
        "startDate": "2026-10-01T00:00:00.000Z",
        "endDate": "2026-10-14T00:00:00.000Z",
        "goal": "Ship it"
    })
}

/// Bag-of-words embedding: each lower-cased word sets one hashed dimension.
/// Texts sharing words land close together.
pub struct HashEmbedding;

impl EmbeddingProvider for HashEmbedding {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0.0f32; EMBEDDING_DIM];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            let h = word
                .to_lowercase()
                .bytes()
                .fold(7usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
            v[h % EMBEDDING_DIM] += 1.0;
        }
        normalize(&mut v);
        Ok(v)
    }
}

pub fn test_similarity(store: &CacheStore) -> Arc<SimilarityIndex> {
    Arc::new(SimilarityIndex::with_provider(
        store.connection(),
        Arc::new(HashEmbedding),
    ))
}

/// Scripted upstream. Serves records from its maps; `fail_next(n)` makes the
/// next `n` calls fail with a transport-like status error.
#[derive(Default)]
pub struct FakeTracker {
    pub issues: Mutex<HashMap<String, Value>>,
    pub sprints: Mutex<HashMap<i64, Value>>,
    pub sprint_members: Mutex<HashMap<i64, Vec<String>>>,
    pub search_results: Mutex<HashMap<String, Vec<String>>>,
    failures: Mutex<usize>,
    /// Upstream cap on page size, like Jira's `maxResults` limit.
    max_results: Mutex<Option<usize>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_issue(&self, raw: Value) {
        let key = raw["key"].as_str().unwrap().to_string();
        self.issues.lock().unwrap().insert(key, raw);
    }

    pub fn add_sprint(&self, raw: Value, members: &[&str]) {
        let id = raw["id"].as_i64().unwrap();
        self.sprints.lock().unwrap().insert(id, raw);
        self.sprint_members
            .lock()
            .unwrap()
            .insert(id, members.iter().map(|s| s.to_string()).collect());
    }

    pub fn add_search(&self, jql: &str, keys: &[&str]) {
        self.search_results
            .lock()
            .unwrap()
            .insert(jql.to_string(), keys.iter().map(|s| s.to_string()).collect());
    }

    pub fn fail_next(&self, n: usize) {
        *self.failures.lock().unwrap() += n;
    }

    pub fn cap_page_size(&self, max: usize) {
        *self.max_results.lock().unwrap() = Some(max);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn record(&self, call: String) -> Result<(), UpstreamError> {
        self.calls.lock().unwrap().push(call);
        let mut failures = self.failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(UpstreamError::Status {
                status: 503,
                body: "service unavailable".into(),
            });
        }
        Ok(())
    }

    fn page(&self, keys: &[String], limit: usize, offset: usize) -> SearchPage {
        let issues = self.issues.lock().unwrap();
        let found: Vec<Value> = keys.iter().filter_map(|k| issues.get(k).cloned()).collect();
        let total = found.len() as i64;
        let limit = match *self.max_results.lock().unwrap() {
            Some(cap) => limit.min(cap),
            None => limit,
        };
        SearchPage {
            issues: found.into_iter().skip(offset).take(limit).collect(),
            total,
        }
    }
}

#[async_trait]
impl IssueTracker for FakeTracker {
    async fn fetch_issue(&self, key: &str, _fields: &[String]) -> Result<Value, UpstreamError> {
        self.record(format!("issue:{key}"))?;
        self.issues
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| UpstreamError::NotFound(format!("issue {key}")))
    }

    async fn search(
        &self,
        query: &str,
        _fields: &[String],
        limit: usize,
        offset: usize,
    ) -> Result<SearchPage, UpstreamError> {
        self.record(format!("search:{query}"))?;
        // Batched reads arrive as `key in ("A-1","A-2")`.
        let keys: Vec<String> = match query.strip_prefix("key in (") {
            Some(rest) => rest
                .trim_end_matches(')')
                .split(',')
                .map(|k| k.trim().trim_matches('"').to_string())
                .collect(),
            None => self
                .search_results
                .lock()
                .unwrap()
                .get(query)
                .cloned()
                .unwrap_or_default(),
        };
        Ok(self.page(&keys, limit, offset))
    }

    async fn fetch_sprint_issues(
        &self,
        sprint_id: i64,
        _fields: &[String],
        limit: usize,
        offset: usize,
    ) -> Result<SearchPage, UpstreamError> {
        self.record(format!("sprint_issues:{sprint_id}"))?;
        let keys = self
            .sprint_members
            .lock()
            .unwrap()
            .get(&sprint_id)
            .cloned()
            .ok_or_else(|| UpstreamError::NotFound(format!("sprint {sprint_id}")))?;
        Ok(self.page(&keys, limit, offset))
    }

    async fn fetch_sprint(&self, sprint_id: i64) -> Result<Value, UpstreamError> {
        self.record(format!("sprint:{sprint_id}"))?;
        self.sprints
            .lock()
            .unwrap()
            .get(&sprint_id)
            .cloned()
            .ok_or_else(|| UpstreamError::NotFound(format!("sprint {sprint_id}")))
    }
}

/// Retriever over an in-memory store, the fake tracker, and the hashing embedder.
pub fn test_retriever(tracker: Arc<FakeTracker>) -> Arc<Retriever> {
    retriever_with(tracker)
}

/// Retriever over an in-memory store and any upstream.
pub fn retriever_with(upstream: Arc<dyn IssueTracker>) -> Arc<Retriever> {
    let store = test_store();
    let similarity = test_similarity(&store);
    Arc::new(Retriever::new(
        store,
        similarity,
        upstream,
        FreshnessConfig::default(),
        vec!["summary".into(), "status".into()],
    ))
}
