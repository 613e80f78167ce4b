mod cli;

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use auditsync::entry::SeverityPolicy;
use auditsync::github::GitHubClient;
use auditsync::output::{append_step_summary, write_step_summary};
use auditsync::report::{parse_report, Report};
use auditsync::scanner::run_scanner;
use auditsync::summary::create_summary;
use auditsync::tracker::IssueTracker;
use auditsync::{has_errors, sync_issues};

use cli::Cli;

/// Exit status when a run aborts before producing a verdict.
const FATAL: u8 = 2;

fn init_tracing(args: &Cli) {
    let builder = tracing_subscriber::fmt()
        .with_max_level(args.verbose.tracing_level_filter())
        .with_writer(std::io::stderr);
    if args.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn load_report(args: &Cli) -> Result<Report> {
    match &args.report {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read report {}", path.display()))?;
            parse_report(&raw)
        }
        None => run_scanner(&args.cargo, &args.scan_options()).await,
    }
}

/// Returns whether any finding is an error.
async fn run(args: &Cli) -> Result<bool> {
    let credentials = if args.create_issues {
        Some(args.issue_credentials()?)
    } else {
        None
    };

    let report = load_report(args).await?;
    let entries = report.entries(SeverityPolicy {
        deny_warnings: args.deny_warnings,
    });
    info!(count = entries.len(), "entries found");

    let summary = create_summary(&report);
    match args.step_summary_path() {
        Some(path) => append_step_summary(&path, &summary, &entries)?,
        None => write_step_summary(&mut std::io::stdout().lock(), &summary, &entries)
            .context("failed to write summary to stdout")?,
    }
    info!("posted step summary");

    if let Some((repo, token)) = credentials {
        let client = GitHubClient::new(
            &args.api_url,
            repo,
            token,
            Duration::from_secs(args.http_timeout),
        )?;
        let mut tracker = IssueTracker::connect(Box::new(client)).await?;
        sync_issues(&mut tracker, &entries, &args.issue_options()).await?;
    }

    Ok(has_errors(&entries))
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();
    init_tracing(&args);

    match run(&args).await {
        Ok(true) => ExitCode::FAILURE,
        Ok(false) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(FATAL)
        }
    }
}
