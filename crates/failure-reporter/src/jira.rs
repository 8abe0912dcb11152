//! JIRA REST (v2) implementation of [`IssueTracker`].

use crate::config::JiraConfig;
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use triage::{
    IssueTracker, NewIssue, Priority, TrackerIssue, TrackerUser, TriageError, TriageResult,
};
use tracing::debug;

/// Longest response body quoted in an error message
const MAX_ERROR_BODY: usize = 512;

/// Default number of retry attempts for transient failures
const DEFAULT_MAX_RETRIES: u32 = 2;

/// Base delay between retries in milliseconds
const RETRY_BASE_DELAY_MS: u64 = 100;

/// Fields requested from the search endpoint
const SEARCH_FIELDS: &str = "summary,priority,resolution";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    issues: Vec<IssueDto>,
}

#[derive(Debug, Deserialize)]
struct IssueDto {
    key: String,
    fields: IssueFields,
}

#[derive(Debug, Deserialize)]
struct IssueFields {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    priority: Option<PriorityDto>,
    #[serde(default)]
    resolution: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct PriorityDto {
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct CreatedIssue {
    key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserDto {
    name: Option<String>,
    account_id: Option<String>,
    email_address: Option<String>,
    display_name: Option<String>,
}

impl From<PriorityDto> for Priority {
    fn from(dto: PriorityDto) -> Self {
        Priority {
            id: dto.id,
            name: dto.name,
        }
    }
}

impl From<IssueDto> for TrackerIssue {
    fn from(dto: IssueDto) -> Self {
        TrackerIssue {
            key: dto.key,
            summary: dto.fields.summary,
            priority: dto.fields.priority.map(Priority::from),
            resolved: dto.fields.resolution.is_some(),
        }
    }
}

/// Request body for `POST /issue`
pub fn issue_fields(issue: &NewIssue) -> serde_json::Value {
    let mut fields = serde_json::json!({
        "project": { "key": issue.project_key },
        "summary": issue.summary,
        "issuetype": { "name": issue.issue_type },
        "priority": { "id": issue.priority_id },
        "description": issue.description,
    });
    if let Some(assignee) = &issue.assignee {
        fields["assignee"] = serde_json::json!({ "name": assignee });
    }
    serde_json::json!({ "fields": fields })
}

/// JIRA client over basic auth
pub struct JiraClient {
    base_url: String,
    username: Option<String>,
    api_token: Option<String>,
    max_retries: u32,
    client: reqwest::Client,
}

impl JiraClient {
    /// Build a client for `config.server`. Failures here are configuration errors.
    pub fn new(config: &JiraConfig) -> TriageResult<Self> {
        let base_url = config.server.trim_end_matches('/').to_string();
        reqwest::Url::parse(&base_url).map_err(|e| {
            TriageError::config(format!("Invalid JIRA server URL \"{}\": {}", base_url, e))
        })?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TriageError::config(format!("Failed to build JIRA HTTP client: {}", e)))?;
        Ok(Self {
            base_url,
            username: config.username.clone(),
            api_token: config.api_token.clone(),
            max_retries: DEFAULT_MAX_RETRIES,
            client,
        })
    }

    /// Retry transient failures (429, 502, 503, client timeouts) this many times
    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/rest/api/2/{}", self.base_url, path);
        debug!(%method, %url, "jira request");
        let request = self.client.request(method, url);
        match (&self.username, &self.api_token) {
            (Some(user), Some(token)) => request.basic_auth(user, Some(token)),
            _ => request,
        }
    }

    /// Send with exponential backoff on retryable errors: 100ms, 200ms, ...
    async fn send(&self, operation: &str, request: RequestBuilder) -> TriageResult<reqwest::Response> {
        let mut attempt = 0;
        loop {
            let Some(current) = request.try_clone() else {
                return self.send_once(operation, request).await;
            };
            match self.send_once(operation, current).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = RETRY_BASE_DELAY_MS * (1 << attempt);
                    debug!(attempt, delay_ms = delay, error = %e, "retrying jira request");
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(
        &self,
        operation: &str,
        request: RequestBuilder,
    ) -> TriageResult<reqwest::Response> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TriageError::tracker(operation, format!("request timed out: {}", e))
            } else {
                TriageError::tracker(operation, e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body = match body.char_indices().nth(MAX_ERROR_BODY) {
                Some((idx, _)) => format!("{}...", &body[..idx]),
                None => body,
            };
            return Err(TriageError::tracker(
                operation,
                format!("HTTP {}: {}", status.as_u16(), body),
            ));
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: RequestBuilder,
    ) -> TriageResult<T> {
        let body = self
            .send(operation, request)
            .await?
            .text()
            .await
            .map_err(|e| TriageError::tracker(operation, e.to_string()))?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl IssueTracker for JiraClient {
    async fn search_issues(
        &self,
        query: &str,
        max_results: u32,
    ) -> TriageResult<Vec<TrackerIssue>> {
        let max_results = max_results.to_string();
        let request = self.request(Method::GET, "search").query(&[
            ("jql", query),
            ("maxResults", max_results.as_str()),
            ("fields", SEARCH_FIELDS),
        ]);
        let response: SearchResponse = self.send_json("search", request).await?;
        Ok(response.issues.into_iter().map(TrackerIssue::from).collect())
    }

    async fn update_priority(&self, key: &str, priority_id: &str) -> TriageResult<()> {
        let body = serde_json::json!({ "fields": { "priority": { "id": priority_id } } });
        let request = self
            .request(Method::PUT, &format!("issue/{}", key))
            .json(&body);
        self.send("update issue", request).await?;
        Ok(())
    }

    async fn create_issue(&self, issue: &NewIssue) -> TriageResult<String> {
        let request = self.request(Method::POST, "issue").json(&issue_fields(issue));
        let created: CreatedIssue = self.send_json("create issue", request).await?;
        Ok(created.key)
    }

    async fn priorities(&self) -> TriageResult<Vec<Priority>> {
        let request = self.request(Method::GET, "priority");
        let priorities: Vec<PriorityDto> = self.send_json("list priorities", request).await?;
        Ok(priorities.into_iter().map(Priority::from).collect())
    }

    async fn find_users(&self, email: &str, max_results: u32) -> TriageResult<Vec<TrackerUser>> {
        let max_results = max_results.to_string();
        let request = self
            .request(Method::GET, "user/search")
            .query(&[("username", email), ("maxResults", max_results.as_str())]);
        let users: Vec<UserDto> = self.send_json("user search", request).await?;
        Ok(users
            .into_iter()
            .filter_map(|user| {
                Some(TrackerUser {
                    name: user.name.or(user.account_id)?,
                    email: user.email_address,
                    display_name: user.display_name,
                })
            })
            .collect())
    }
}
