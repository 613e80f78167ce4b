use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use crate::entry::Entry;

pub const STEP_SUMMARY_HEADER: &str = "# Rustsec Advisories";

/// Render the header, the digest and one block per entry.
pub fn write_step_summary(
    writer: &mut dyn Write,
    summary: &str,
    entries: &[Entry],
) -> std::io::Result<()> {
    write!(writer, "{STEP_SUMMARY_HEADER}\n\n")?;
    writeln!(writer, "{summary}")?;
    for entry in entries {
        writeln!(writer, "{}", entry.render_markdown())?;
    }
    Ok(())
}

/// Append the step summary to `path`, creating the file if needed.
pub fn append_step_summary(path: &Path, summary: &str, entries: &[Entry]) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open step summary {}", path.display()))?;
    write_step_summary(&mut file, summary, entries)
        .with_context(|| format!("failed to write step summary {}", path.display()))
}
