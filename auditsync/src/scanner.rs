use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::process::Command;
use tracing::{debug, info, instrument};

use crate::report::{parse_report, Report};

#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Advisory ids passed to `--ignore`; blank ids are skipped.
    pub ignore: Vec<String>,
    pub deny_warnings: bool,
    /// Alternate `Cargo.lock`.
    pub file: Option<PathBuf>,
}

impl ScanOptions {
    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["audit".to_string(), "--json".to_string()];
        if self.deny_warnings {
            args.extend(["--deny".to_string(), "warnings".to_string()]);
        }
        if let Some(file) = &self.file {
            args.push("--file".to_string());
            args.push(file.display().to_string());
        }
        for id in self.ignore.iter().map(|id| id.trim()).filter(|id| !id.is_empty()) {
            args.push("--ignore".to_string());
            args.push(id.to_string());
        }
        args
    }
}

/// Run `<cargo> audit --json ...` and parse the report it prints.
///
/// cargo-audit exits non-zero whenever it finds something, so the exit
/// status is only logged; a missing or malformed report is the failure.
#[instrument(skip(options))]
pub async fn run_scanner(cargo: &str, options: &ScanOptions) -> Result<Report> {
    let args = options.args();
    info!(command = %format!("{cargo} {}", args.join(" ")), "running scanner");

    let output = Command::new(cargo)
        .args(&args)
        .output()
        .await
        .with_context(|| format!("failed to run `{cargo} audit`"))?;

    debug!(status = %output.status, "scanner finished");
    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_report(&stdout).with_context(|| {
        format!(
            "scanner exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )
    })
}
