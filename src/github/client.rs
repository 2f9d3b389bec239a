//! Blocking GitHub API client.
//!
//! Pages every list endpoint to completion and maps HTTP status codes onto
//! the crate error taxonomy. No retry or backoff happens here - exhaustion
//! and throttling surface to the caller, which decides policy.

use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::models::{
    AccountProfile, CommentRecord, GistRecord, IssueRecord, ReleaseRecord, RepositorySummary,
    SshKeyRecord,
};
use super::GitHubApi;
use crate::error::{Error, Result};

const DEFAULT_BASE_URL: &str = "https://api.github.com";
const PER_PAGE: usize = 100;

/// Authenticated client for api.github.com.
pub struct GitHubClient {
    http: Client,
    base_url: String,
    token: String,
}

impl GitHubClient {
    /// Build a client with a 30s per-request timeout.
    pub fn new(token: &str) -> Result<Self> {
        Self::with_base_url(token, DEFAULT_BASE_URL)
    }

    /// Build a client against a custom API root (used by tests).
    pub fn with_base_url(token: &str, base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("HubVault")
            .build()
            .map_err(Error::from_transport)?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn get(&self, path: &str) -> Result<Response> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "GET");
        let response = self
            .http
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .send()
            .map_err(Error::from_transport)?;
        check_status(response, path)
    }

    /// Fetch a paged list endpoint to completion. `path` must not already
    /// carry a query string.
    fn get_paged(&self, path: &str, extra_query: &str) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        let mut page = 1usize;

        loop {
            let sep = if extra_query.is_empty() { "" } else { "&" };
            let paged_path = format!(
                "{}?per_page={}&page={}{}{}",
                path, PER_PAGE, page, sep, extra_query
            );
            let batch: Vec<Value> = self
                .get(&paged_path)?
                .json()
                .map_err(Error::from_transport)?;

            let batch_len = batch.len();
            items.extend(batch);

            if batch_len < PER_PAGE {
                break;
            }
            page += 1;
        }

        Ok(items)
    }
}

/// Map a non-success status onto the error taxonomy.
fn check_status(response: Response, context: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let rate_limited = status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN
            && response
                .headers()
                .get("x-ratelimit-remaining")
                .and_then(|v| v.to_str().ok())
                == Some("0"));

    let body = response.text().unwrap_or_default();
    let detail = body.lines().next().unwrap_or("").to_string();

    Err(match status {
        StatusCode::UNAUTHORIZED => {
            Error::Authentication(format!("GitHub rejected the token ({})", context))
        }
        StatusCode::NOT_FOUND => Error::NotFound(context.to_string()),
        _ if rate_limited => Error::RateLimit(format!("{} ({})", status, context)),
        StatusCode::FORBIDDEN => {
            Error::Authentication(format!("access forbidden ({}): {}", context, detail))
        }
        _ => Error::Network(format!("GitHub API error {} ({}): {}", status, context, detail)),
    })
}

impl GitHubApi for GitHubClient {
    fn authenticated_user(&self) -> Result<AccountProfile> {
        self.get("/user")?.json().map_err(Error::from_transport)
    }

    fn list_repositories(&self) -> Result<Vec<RepositorySummary>> {
        let raw = self.get_paged("/user/repos", "type=all")?;
        let mut repos = Vec::with_capacity(raw.len());
        for item in raw {
            repos.push(serde_json::from_value(item)?);
        }
        debug!(count = repos.len(), "enumerated repositories");
        Ok(repos)
    }

    fn repository(&self, full_name: &str) -> Result<RepositorySummary> {
        self.get(&format!("/repos/{}", full_name))?
            .json()
            .map_err(Error::from_transport)
    }

    fn issues(&self, full_name: &str) -> Result<Vec<IssueRecord>> {
        let raw = self.get_paged(&format!("/repos/{}/issues", full_name), "state=all")?;

        let mut issues = Vec::with_capacity(raw.len());
        for item in raw {
            let comment_count = item
                .get("comments")
                .and_then(Value::as_u64)
                .unwrap_or_default();
            let mut issue: IssueRecord = serde_json::from_value(item)?;

            if comment_count > 0 {
                let comments_raw = self.get_paged(
                    &format!("/repos/{}/issues/{}/comments", full_name, issue.number),
                    "",
                )?;
                let mut comments: Vec<CommentRecord> = Vec::with_capacity(comments_raw.len());
                for comment in comments_raw {
                    comments.push(serde_json::from_value(comment)?);
                }
                issue.comments = comments;
            }

            issues.push(issue);
        }
        Ok(issues)
    }

    fn releases(&self, full_name: &str) -> Result<Vec<ReleaseRecord>> {
        let raw = self.get_paged(&format!("/repos/{}/releases", full_name), "")?;
        let mut releases = Vec::with_capacity(raw.len());
        for item in raw {
            releases.push(serde_json::from_value(item)?);
        }
        Ok(releases)
    }

    fn gists(&self) -> Result<Vec<GistRecord>> {
        // The list endpoint omits file contents, so each gist is re-fetched
        // through its detail endpoint.
        let raw = self.get_paged("/gists", "")?;
        let mut gists = Vec::with_capacity(raw.len());
        for item in raw {
            let id = item
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::Network("gist without id in API response".to_string()))?
                .to_string();
            let detail: GistRecord = self
                .get(&format!("/gists/{}", id))?
                .json()
                .map_err(Error::from_transport)?;
            gists.push(detail);
        }
        Ok(gists)
    }

    fn ssh_keys(&self) -> Result<Vec<SshKeyRecord>> {
        let raw = self.get_paged("/user/keys", "")?;
        let mut keys = Vec::with_capacity(raw.len());
        for item in raw {
            keys.push(serde_json::from_value(item)?);
        }
        Ok(keys)
    }
}
