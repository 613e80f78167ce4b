use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::builder::FalseyValueParser;
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};

use auditsync::github::{DEFAULT_TIMEOUT, GITHUB_API_BASE};
use auditsync::scanner::ScanOptions;
use auditsync::IssueOptions;

/// Run cargo-audit, summarize its findings and sync them with GitHub issues
#[derive(Parser, Debug)]
#[command(name = "auditsync", version)]
pub struct Cli {
    /// Repository (owner/name) whose issues are synced
    #[arg(long, env = "GITHUB_REPOSITORY")]
    pub repo: Option<String>,

    /// GitHub token used for the issues API
    #[arg(long, env = "INPUT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Comma-separated advisory ids to ignore
    #[arg(long, env = "INPUT_IGNORE", value_delimiter = ',')]
    pub ignore: Vec<String>,

    /// Treat warnings (unmaintained, yanked, ...) as errors
    #[arg(long, env = "INPUT_DENY_WARNINGS", value_parser = FalseyValueParser::new())]
    pub deny_warnings: bool,

    /// Alternate Cargo.lock to audit
    #[arg(long, env = "INPUT_FILE")]
    pub file: Option<String>,

    /// Create, update and close GitHub issues for the findings
    #[arg(long, env = "INPUT_CREATE_ISSUES", value_parser = FalseyValueParser::new())]
    pub create_issues: bool,

    /// Comma-separated labels for new issues
    #[arg(long, env = "INPUT_ISSUE_LABELS", value_delimiter = ',')]
    pub issue_labels: Vec<String>,

    /// Comma-separated assignees for new issues; unknown users are dropped
    #[arg(long, env = "INPUT_ISSUE_ASSIGNEES", value_delimiter = ',')]
    pub issue_assignees: Vec<String>,

    /// File the markdown summary is appended to (stdout when unset)
    #[arg(long, env = "GITHUB_STEP_SUMMARY")]
    pub step_summary: Option<String>,

    /// GitHub REST API base URL
    #[arg(long, env = "GITHUB_API_URL", default_value = GITHUB_API_BASE)]
    pub api_url: String,

    /// Timeout in seconds for each GitHub request
    #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs())]
    pub http_timeout: u64,

    /// Read a saved `cargo audit --json` report instead of running the scanner
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Cargo executable used to run `cargo audit`
    #[arg(long, env = "CARGO", default_value = "cargo")]
    pub cargo: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,

    #[command(flatten)]
    pub verbose: Verbosity<InfoLevel>,
}

/// Drop blank items left by empty inputs and trailing commas.
fn non_blank(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// GitHub passes unset inputs as empty strings.
fn non_empty_path(path: &Option<String>) -> Option<PathBuf> {
    path.as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
}

impl Cli {
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            ignore: non_blank(&self.ignore),
            deny_warnings: self.deny_warnings,
            file: non_empty_path(&self.file),
        }
    }

    pub fn issue_options(&self) -> IssueOptions {
        IssueOptions {
            labels: non_blank(&self.issue_labels),
            assignees: non_blank(&self.issue_assignees),
        }
    }

    pub fn step_summary_path(&self) -> Option<PathBuf> {
        non_empty_path(&self.step_summary)
    }

    /// Repository and token, both required once issues are enabled.
    pub fn issue_credentials(&self) -> Result<(&str, &str)> {
        let repo = self
            .repo
            .as_deref()
            .filter(|r| !r.is_empty())
            .context("--repo or GITHUB_REPOSITORY is required with --create-issues")?;
        let token = self
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .context("--token or INPUT_TOKEN is required with --create-issues")?;
        Ok((repo, token))
    }
}
