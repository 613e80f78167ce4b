use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::entry::Issue;

/// Title prefixes of issues this tool manages.
pub const MANAGED_TITLE_PREFIXES: &[&str] = &["RUSTSEC-", "Crate "];

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to decode response from {url}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ApiError {
    /// Status errors are reported and skipped; transport and decode
    /// failures abort the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ApiError::Status { .. })
    }
}

/// An open issue as returned by the tracker.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrackedIssue {
    pub number: u64,
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub body: String,
    /// API URL of the issue; updates are sent here.
    pub url: String,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub pull_request: Option<serde_json::Value>,
}

fn null_as_empty<'de, D: serde::Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

impl TrackedIssue {
    /// Browser link when the tracker provides one, else the API URL.
    pub fn link(&self) -> &str {
        self.html_url.as_deref().unwrap_or(&self.url)
    }

    pub fn is_managed(&self) -> bool {
        self.pull_request.is_none()
            && MANAGED_TITLE_PREFIXES
                .iter()
                .any(|prefix| self.title.starts_with(prefix))
    }

    /// Whether this issue tracks the finding with the given identity.
    ///
    /// The identity must be followed by a separator (or end the title), so
    /// `Crate foo 1.0.0` does not claim `Crate foo 1.0.0-rc.1 is yanked`.
    /// This is deliberately stricter than a plain title prefix match: a title
    /// such as `RUSTSEC-2024-0001(dup)` is not tracked by `RUSTSEC-2024-0001`.
    pub fn tracks(&self, identity: &str) -> bool {
        match self.title.strip_prefix(identity) {
            Some(rest) => rest.is_empty() || rest.starts_with([':', ' ']),
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewIssue {
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct IssuePage {
    pub issues: Vec<TrackedIssue>,
    pub next: Option<String>,
}

/// The issue tracking REST surface.
#[async_trait]
pub trait IssueApi: Send + Sync {
    /// Fetch one page of open issues. `None` requests the first page.
    async fn list_open_issues(&self, page_url: Option<&str>) -> Result<IssuePage, ApiError>;
    async fn create_issue(&self, issue: &NewIssue) -> Result<TrackedIssue, ApiError>;
    async fn update_issue(
        &self,
        issue: &TrackedIssue,
        title: &str,
        body: &str,
    ) -> Result<TrackedIssue, ApiError>;
    async fn close_issue(&self, issue: &TrackedIssue) -> Result<(), ApiError>;
    async fn assignee_exists(&self, login: &str) -> Result<bool, ApiError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    Created,
    Updated,
    Unchanged,
    Failed,
}

/// Open managed issues of one repository, reconciled against findings.
pub struct IssueTracker {
    api: Box<dyn IssueApi>,
    existing: Vec<TrackedIssue>,
}

impl IssueTracker {
    /// Load every open managed issue, following pagination.
    pub async fn connect(api: Box<dyn IssueApi>) -> Result<Self> {
        let mut existing = Vec::new();
        let mut next: Option<String> = None;
        loop {
            let page = match api.list_open_issues(next.as_deref()).await {
                Ok(page) => page,
                Err(e) if e.is_recoverable() => {
                    warn!(error = %e, "failed to list open issues; continuing with partial list");
                    break;
                }
                Err(e) => return Err(e.into()),
            };
            existing.extend(page.issues.into_iter().filter(TrackedIssue::is_managed));
            match page.next {
                Some(url) => next = Some(url),
                None => break,
            }
        }
        info!(count = existing.len(), "loaded open advisory issues");
        Ok(Self { api, existing })
    }

    pub fn existing(&self) -> &[TrackedIssue] {
        &self.existing
    }

    pub async fn create_or_update(&mut self, issue: &Issue) -> Result<SyncAction> {
        if let Some(pos) = self.existing.iter().position(|t| t.tracks(&issue.identity)) {
            let tracked = &self.existing[pos];
            if tracked.title == issue.title && tracked.body == issue.body {
                debug!(id = %issue.identity, number = tracked.number, "issue up to date");
                return Ok(SyncAction::Unchanged);
            }

            info!(id = %issue.identity, number = tracked.number, "updating issue");
            let result = self.api.update_issue(tracked, &issue.title, &issue.body).await;
            return match result {
                Ok(updated) => {
                    self.existing[pos] = updated;
                    Ok(SyncAction::Updated)
                }
                Err(e) => recover(e, &issue.identity, "failed to update issue"),
            };
        }

        let assignees = self.valid_assignees(&issue.assignees).await?;
        let new_issue = NewIssue {
            title: issue.title.clone(),
            body: issue.body.clone(),
            labels: issue.labels.clone(),
            assignees,
        };

        info!(id = %issue.identity, "creating issue");
        match self.api.create_issue(&new_issue).await {
            Ok(created) => {
                info!(id = %issue.identity, url = %created.link(), "created issue");
                self.existing.push(created);
                Ok(SyncAction::Created)
            }
            Err(e) => recover(e, &issue.identity, "failed to create issue"),
        }
    }

    async fn valid_assignees(&self, assignees: &[String]) -> Result<Vec<String>> {
        let mut valid = Vec::with_capacity(assignees.len());
        for login in assignees {
            match self.api.assignee_exists(login).await {
                Ok(true) => valid.push(login.clone()),
                Ok(false) => warn!(assignee = %login, "assignee does not exist; dropping"),
                Err(e) if e.is_recoverable() => {
                    warn!(assignee = %login, error = %e, "failed to check assignee; dropping");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(valid)
    }

    pub async fn close(&self, issue: &TrackedIssue) -> Result<(), ApiError> {
        info!(number = issue.number, title = %issue.title, url = %issue.link(), "closing issue");
        self.api.close_issue(issue).await
    }

    /// Issues in the working set that track none of `identities`.
    pub fn stale<'a>(&'a self, identities: &'a [String]) -> impl Iterator<Item = &'a TrackedIssue> {
        self.existing
            .iter()
            .filter(move |issue| !identities.iter().any(|id| issue.tracks(id)))
    }

    /// Close every stale issue. Returns how many were closed.
    pub async fn close_stale(&mut self, identities: &[String]) -> Result<usize> {
        let stale: Vec<TrackedIssue> = self.stale(identities).cloned().collect();
        info!(
            existing = self.existing.len(),
            current = identities.len(),
            stale = stale.len(),
            "closing resolved issues"
        );

        let mut closed = 0;
        for issue in stale {
            match self.close(&issue).await {
                Ok(()) => {
                    self.existing.retain(|t| t.number != issue.number);
                    closed += 1;
                }
                Err(e) if e.is_recoverable() => {
                    warn!(number = issue.number, error = %e, "failed to close issue");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(closed)
    }
}

fn recover(e: ApiError, identity: &str, msg: &str) -> Result<SyncAction> {
    if e.is_recoverable() {
        warn!(id = %identity, error = %e, "{msg}");
        Ok(SyncAction::Failed)
    } else {
        Err(anyhow::Error::new(e).context(format!("{msg} for {identity}")))
    }
}
