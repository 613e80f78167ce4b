use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{self, HeaderMap};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::instrument;

use crate::tracker::{ApiError, IssueApi, IssuePage, NewIssue, TrackedIssue};

pub const GITHUB_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const PER_PAGE: u32 = 100;

#[derive(Clone)]
pub struct GitHubClient {
    client: reqwest::Client,
    api_base: String,
    repo: String,
    token: String,
}

impl GitHubClient {
    /// Client for the issues of `repo` (`owner/name`).
    pub fn new(api_base: &str, repo: &str, token: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("auditsync/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            repo: repo.to_string(),
            token: token.to_string(),
        })
    }

    fn issues_url(&self) -> String {
        format!("{}/repos/{}/issues", self.api_base, self.repo)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .bearer_auth(&self.token)
    }

    async fn send(&self, url: &str, request: RequestBuilder) -> Result<Response, ApiError> {
        self.authorized(request)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.to_string(),
                source,
            })
    }

    async fn expect_json<T: DeserializeOwned>(url: &str, response: Response) -> Result<T, ApiError> {
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response.json().await.map_err(|source| ApiError::Decode {
            url: url.to_string(),
            source,
        })
    }
}

#[async_trait]
impl IssueApi for GitHubClient {
    #[instrument(skip(self))]
    async fn list_open_issues(&self, page_url: Option<&str>) -> Result<IssuePage, ApiError> {
        let url = match page_url {
            Some(url) => url.to_string(),
            None => format!("{}?state=open&per_page={PER_PAGE}", self.issues_url()),
        };
        let response = self.send(&url, self.client.get(&url)).await?;
        let next = next_page_link(response.headers());
        let issues = Self::expect_json(&url, response).await?;
        Ok(IssuePage { issues, next })
    }

    #[instrument(skip(self, issue), fields(title = %issue.title))]
    async fn create_issue(&self, issue: &NewIssue) -> Result<TrackedIssue, ApiError> {
        let url = self.issues_url();
        let response = self.send(&url, self.client.post(&url).json(issue)).await?;
        Self::expect_json(&url, response).await
    }

    #[instrument(skip(self, issue, body), fields(number = issue.number))]
    async fn update_issue(
        &self,
        issue: &TrackedIssue,
        title: &str,
        body: &str,
    ) -> Result<TrackedIssue, ApiError> {
        let payload = serde_json::json!({ "title": title, "body": body });
        let response = self
            .send(&issue.url, self.client.patch(&issue.url).json(&payload))
            .await?;
        Self::expect_json(&issue.url, response).await
    }

    #[instrument(skip(self, issue), fields(number = issue.number))]
    async fn close_issue(&self, issue: &TrackedIssue) -> Result<(), ApiError> {
        let payload = serde_json::json!({ "state": "closed" });
        let response = self
            .send(&issue.url, self.client.patch(&issue.url).json(&payload))
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                url: issue.url.clone(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn assignee_exists(&self, login: &str) -> Result<bool, ApiError> {
        let url = format!("{}/repos/{}/assignees/{login}", self.api_base, self.repo);
        let response = self.send(&url, self.client.get(&url)).await?;
        match response.status() {
            StatusCode::NO_CONTENT => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(ApiError::Status {
                url,
                status: status.as_u16(),
            }),
        }
    }
}

/// Extract the `rel="next"` target from a `Link` header.
pub fn next_page_link(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(header::LINK)?.to_str().ok()?;
    link.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        let is_next = params
            .split(';')
            .any(|p| matches!(p.trim(), "rel=\"next\"" | "rel=next"));
        if !is_next {
            return None;
        }
        let target = target.trim();
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_string)
    })
}
