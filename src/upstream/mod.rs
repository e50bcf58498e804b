//! The remote issue tracker, seen from the cache.
//!
//! [`IssueTracker`] is everything the retrieval layer needs from upstream.
//! [`rest::JiraRestClient`] implements it over the Jira Cloud REST API; tests
//! substitute scripted fakes.

pub mod rest;

use async_trait::async_trait;
use serde_json::Value;

/// One page of issues plus the upstream's declared total.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
    pub issues: Vec<Value>,
    pub total: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream is not configured: {0}")]
    NotConfigured(String),
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upstream returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("upstream response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{0} not found upstream")]
    NotFound(String),
}

#[async_trait]
pub trait IssueTracker: Send + Sync {
    async fn fetch_issue(&self, key: &str, fields: &[String]) -> Result<Value, UpstreamError>;

    async fn search(
        &self,
        query: &str,
        fields: &[String],
        limit: usize,
        offset: usize,
    ) -> Result<SearchPage, UpstreamError>;

    async fn fetch_sprint_issues(
        &self,
        sprint_id: i64,
        fields: &[String],
        limit: usize,
        offset: usize,
    ) -> Result<SearchPage, UpstreamError>;

    async fn fetch_sprint(&self, sprint_id: i64) -> Result<Value, UpstreamError>;
}

/// Stand-in used when no Jira credentials are configured. Every call fails
/// with [`UpstreamError::NotConfigured`], so reads fall back to the cache.
#[derive(Debug, Clone)]
pub struct Unconfigured {
    reason: String,
}

impl Unconfigured {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn err(&self) -> UpstreamError {
        UpstreamError::NotConfigured(self.reason.clone())
    }
}

#[async_trait]
impl IssueTracker for Unconfigured {
    async fn fetch_issue(&self, _key: &str, _fields: &[String]) -> Result<Value, UpstreamError> {
        Err(self.err())
    }

    async fn search(
        &self,
        _query: &str,
        _fields: &[String],
        _limit: usize,
        _offset: usize,
    ) -> Result<SearchPage, UpstreamError> {
        Err(self.err())
    }

    async fn fetch_sprint_issues(
        &self,
        _sprint_id: i64,
        _fields: &[String],
        _limit: usize,
        _offset: usize,
    ) -> Result<SearchPage, UpstreamError> {
        Err(self.err())
    }

    async fn fetch_sprint(&self, _sprint_id: i64) -> Result<Value, UpstreamError> {
        Err(self.err())
    }
}
