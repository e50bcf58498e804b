//! Jira Cloud REST client: basic auth, JSON in and out, nothing else.
//!
//! No retries and no upstream pagination. The retrieval layer owns failure
//! handling and asks for exactly one page at a time.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};

use super::{IssueTracker, SearchPage, UpstreamError};
use crate::config::UpstreamConfig;

/// Error bodies are clipped to this many characters in [`UpstreamError::Status`].
const MAX_ERROR_BODY: usize = 500;

pub struct JiraRestClient {
    client: Client,
    base_url: String,
    email: String,
    api_token: String,
}

impl JiraRestClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        if config.base_url.trim().is_empty() {
            return Err(UpstreamError::NotConfigured(
                "set upstream.base_url or JIRA_BASE_URL".into(),
            ));
        }
        if config.email.is_empty() || config.api_token.is_empty() {
            return Err(UpstreamError::NotConfigured(
                "set JIRA_EMAIL and JIRA_API_TOKEN".into(),
            ));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            email: config.email.clone(),
            api_token: config.api_token.clone(),
        })
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client
            .get(format!("{}{path}", self.base_url))
            .basic_auth(&self.email, Some(&self.api_token))
    }

    fn post(&self, path: &str, body: &Value) -> RequestBuilder {
        self.client
            .post(format!("{}{path}", self.base_url))
            .basic_auth(&self.email, Some(&self.api_token))
            .json(body)
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Value, UpstreamError> {
        let response = request.header("Accept", "application/json").send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::NOT_FOUND {
            return Err(UpstreamError::NotFound(what.to_string()));
        }
        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl IssueTracker for JiraRestClient {
    async fn fetch_issue(&self, key: &str, fields: &[String]) -> Result<Value, UpstreamError> {
        let path = format!("/rest/api/3/issue/{key}{}", fields_query(fields, '?'));
        tracing::debug!(key, "fetching issue upstream");
        self.send(self.get(&path), &format!("issue {key}")).await
    }

    async fn search(
        &self,
        query: &str,
        fields: &[String],
        limit: usize,
        offset: usize,
    ) -> Result<SearchPage, UpstreamError> {
        let body = json!({
            "jql": query,
            "fields": fields,
            "maxResults": limit,
            "startAt": offset,
        });
        tracing::debug!(query, limit, offset, "searching upstream");
        let value = self.send(self.post("/rest/api/3/search", &body), "search").await?;
        Ok(page_from(value))
    }

    async fn fetch_sprint_issues(
        &self,
        sprint_id: i64,
        fields: &[String],
        limit: usize,
        offset: usize,
    ) -> Result<SearchPage, UpstreamError> {
        let path = format!(
            "/rest/agile/1.0/sprint/{sprint_id}/issue?startAt={offset}&maxResults={limit}{}",
            fields_query(fields, '&')
        );
        tracing::debug!(sprint_id, limit, offset, "fetching sprint issues upstream");
        let value = self.send(self.get(&path), &format!("sprint {sprint_id}")).await?;
        Ok(page_from(value))
    }

    async fn fetch_sprint(&self, sprint_id: i64) -> Result<Value, UpstreamError> {
        let path = format!("/rest/agile/1.0/sprint/{sprint_id}");
        self.send(self.get(&path), &format!("sprint {sprint_id}")).await
    }
}

fn fields_query(fields: &[String], separator: char) -> String {
    if fields.is_empty() {
        String::new()
    } else {
        format!("{separator}fields={}", fields.join(","))
    }
}

fn page_from(mut value: Value) -> SearchPage {
    let issues = match value.get_mut("issues").map(Value::take) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    };
    let total = value
        .get("total")
        .and_then(Value::as_i64)
        .unwrap_or(issues.len() as i64);
    SearchPage { issues, total }
}
