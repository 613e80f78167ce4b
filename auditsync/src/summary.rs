use crate::report::Report;

/// One-line digest of a report, e.g.
/// `2 vulnerabilities found. 3 warnings found (2x unmaintained, 1x yanked).`
pub fn create_summary(report: &Report) -> String {
    let vulns = match report.vulnerabilities.count {
        0 => "No vulnerabilities found.".to_string(),
        1 => "1 vulnerability found.".to_string(),
        n => format!("{n} vulnerabilities found."),
    };

    let warnings = match report.warnings.total() {
        0 => "No warnings found.".to_string(),
        1 => "1 warning found.".to_string(),
        n => {
            let breakdown = report
                .warnings
                .iter()
                .map(|(kind, list)| format!("{}x {kind}", list.len()))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{n} warnings found ({breakdown}).")
        }
    };

    format!("{vulns} {warnings}")
}
