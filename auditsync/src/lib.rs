pub mod entry;
pub mod github;
pub mod output;
pub mod report;
pub mod scanner;
pub mod summary;
pub mod tracker;

use std::collections::HashSet;

use anyhow::Result;
use tracing::{debug, info};

use entry::{Entry, Severity};
use tracker::{IssueTracker, SyncAction};

/// Labels and assignees applied to newly created issues.
#[derive(Debug, Clone, Default)]
pub struct IssueOptions {
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub closed: usize,
}

/// Create or update one issue per finding, then close the issues whose
/// finding has disappeared.
///
/// An advisory that matches several locked versions of a crate yields
/// several entries with the same id; only the first one is synced.
pub async fn sync_issues(
    tracker: &mut IssueTracker,
    entries: &[Entry],
    options: &IssueOptions,
) -> Result<SyncStats> {
    let mut stats = SyncStats::default();
    let mut seen = HashSet::new();
    let mut identities = Vec::new();

    for entry in entries {
        let id = entry.id();
        if !seen.insert(id.clone()) {
            debug!(id = %id, "already synced in this run");
            continue;
        }
        let issue = entry.render_issue(&options.labels, &options.assignees);
        match tracker.create_or_update(&issue).await? {
            SyncAction::Created => stats.created += 1,
            SyncAction::Updated => stats.updated += 1,
            SyncAction::Unchanged => stats.unchanged += 1,
            SyncAction::Failed => stats.failed += 1,
        }
        identities.push(id);
    }

    stats.closed = tracker.close_stale(&identities).await?;
    info!(
        created = stats.created,
        updated = stats.updated,
        unchanged = stats.unchanged,
        failed = stats.failed,
        closed = stats.closed,
        "issue sync complete"
    );
    Ok(stats)
}

/// True when the run must fail.
pub fn has_errors(entries: &[Entry]) -> bool {
    entries.iter().any(|e| e.severity() == Severity::Error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use entry::SeverityPolicy;
    use report::parse_report;

    const REPORT: &str = r#"{
        "vulnerabilities": {"count": 0, "list": []},
        "warnings": {"unmaintained": [{
            "package": {"name": "bar", "version": "0.3.0"},
            "advisory": {"id": "RUSTSEC-2023-0050", "title": "bar is unmaintained"}
        }]}
    }"#;

    #[test]
    fn warnings_alone_do_not_fail() {
        let entries = parse_report(REPORT).unwrap().entries(SeverityPolicy::default());
        assert!(!has_errors(&entries));
    }

    #[test]
    fn deny_warnings_fails() {
        let entries = parse_report(REPORT)
            .unwrap()
            .entries(SeverityPolicy { deny_warnings: true });
        assert!(has_errors(&entries));
        assert!(entries.iter().all(|e| e.severity() != Severity::Warning));
    }

    #[test]
    fn empty_report_passes() {
        assert!(!has_errors(&[]));
    }
}
