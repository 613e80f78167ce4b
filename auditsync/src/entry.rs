use crate::report::{Advisory, Finding, Package, Versions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    pub fn icon(self) -> &'static str {
        match self {
            Severity::Error => "🛑",
            Severity::Warning => "⚠️",
        }
    }
}

/// How warning findings are classified when entries are built.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeverityPolicy {
    pub deny_warnings: bool,
}

impl SeverityPolicy {
    pub fn warning_severity(self) -> Severity {
        if self.deny_warnings {
            Severity::Error
        } else {
            Severity::Warning
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryKind {
    Advisory(Advisory),
    /// The crate version was yanked from the registry; there is no advisory.
    Yanked,
}

/// Issue payload derived from an [`Entry`].
#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
    pub identity: String,
}

#[derive(Debug, Clone)]
pub struct Entry {
    package: Package,
    versions: Versions,
    kind: EntryKind,
    severity: Severity,
    warning_kind: Option<String>,
}

impl Entry {
    pub fn new(finding: Finding, severity: Severity, warning_kind: Option<String>) -> Self {
        let kind = match finding.advisory {
            Some(advisory) => EntryKind::Advisory(advisory),
            None => EntryKind::Yanked,
        };
        Self {
            package: finding.package,
            versions: finding.versions.unwrap_or_default(),
            kind,
            severity,
            warning_kind,
        }
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn warning_kind(&self) -> Option<&str> {
        self.warning_kind.as_deref()
    }

    pub fn kind(&self) -> &EntryKind {
        &self.kind
    }

    /// Reconciliation key. Tracked issue titles start with it.
    pub fn id(&self) -> String {
        match &self.kind {
            EntryKind::Advisory(advisory) => advisory.id.clone(),
            EntryKind::Yanked => {
                format!("Crate {} {}", self.package.name, self.package.version)
            }
        }
    }

    pub fn render_markdown(&self) -> String {
        let icon = self.severity.icon();
        match &self.kind {
            EntryKind::Advisory(advisory) => format!(
                "## {icon} {}: {}\n\n{}\n",
                advisory.id,
                advisory.title,
                self.advisory_body(advisory)
            ),
            EntryKind::Yanked => format!(
                "## {icon} {} is yanked.\n\n{}\n",
                self.id(),
                self.yanked_body()
            ),
        }
    }

    pub fn render_issue(&self, labels: &[String], assignees: &[String]) -> Issue {
        let identity = self.id();
        let (title, body) = match &self.kind {
            EntryKind::Advisory(advisory) => (
                format!("{identity}: {}", advisory.title),
                self.advisory_body(advisory),
            ),
            EntryKind::Yanked => (format!("{identity} is yanked"), self.yanked_body()),
        };
        Issue {
            title,
            body,
            labels: labels.to_vec(),
            assignees: assignees.to_vec(),
            identity,
        }
    }

    fn advisory_body(&self, advisory: &Advisory) -> String {
        format!(
            "{}\n\n{}",
            self.details_table(advisory),
            escape_mentions(&advisory.description)
        )
    }

    fn yanked_body(&self) -> String {
        format!(
            "Switch to a different version of `{}`.",
            self.package.name
        )
    }

    fn details_table(&self, advisory: &Advisory) -> String {
        let mut rows = vec![
            "| Details | |".to_string(),
            "| --- | --- |".to_string(),
            format!("| Package | `{}` |", self.package.name),
            format!("| Version | `{}` |", self.package.version),
        ];

        if let Some(kind) = &self.warning_kind {
            rows.push(format!("| Warning | {kind} |"));
        }

        let url = advisory
            .url
            .clone()
            .unwrap_or_else(|| rustsec_url(&advisory.id));
        rows.push(format!("| URL | <{url}> |"));

        let patched = if self.versions.patched.is_empty() {
            "n/a".to_string()
        } else {
            format!("`{}`", self.versions.patched.join(" OR "))
        };
        rows.push(format!("| Patched Versions | {patched} |"));

        if !self.versions.unaffected.is_empty() {
            rows.push(format!(
                "| Unaffected Versions | `{}` |",
                self.versions.unaffected.join(" OR ")
            ));
        }
        if !advisory.aliases.is_empty() {
            rows.push(format!("| Aliases | {} |", link_ids(&advisory.aliases)));
        }
        if !advisory.related.is_empty() {
            rows.push(format!(
                "| Related Advisories | {} |",
                link_ids(&advisory.related)
            ));
        }

        rows.join("\n")
    }
}

fn rustsec_url(id: &str) -> String {
    format!("https://rustsec.org/advisories/{id}.html")
}

/// Advisory URL for ids from a known database, if any.
pub fn advisory_link(id: &str) -> Option<String> {
    if id.starts_with("GHSA-") {
        Some(format!("https://github.com/advisories/{id}"))
    } else if id.starts_with("CVE-") {
        Some(format!("https://nvd.nist.gov/vuln/detail/{id}"))
    } else if id.starts_with("RUSTSEC-") {
        Some(rustsec_url(id))
    } else {
        None
    }
}

fn link_ids(ids: &[String]) -> String {
    ids.iter()
        .map(|id| match advisory_link(id) {
            Some(url) => format!("[{id}]({url})"),
            None => id.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Prefix each `@` with a zero-width joiner so GitHub does not turn
/// addresses and handles in advisory text into mentions.
pub fn escape_mentions(text: &str) -> String {
    text.replace('@', "\u{200d}@")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_advisory(id: &str) -> Advisory {
        Advisory {
            id: id.to_string(),
            title: "Use after free in foo".to_string(),
            description: "Reported by user@example.com.".to_string(),
            url: Some(format!("https://example.com/{id}")),
            aliases: vec![],
            related: vec![],
        }
    }

    fn make_finding(advisory: Option<Advisory>) -> Finding {
        Finding {
            package: Package {
                name: "foo".to_string(),
                version: "1.0.0".to_string(),
            },
            versions: Some(Versions {
                patched: vec![">=1.0.1".to_string()],
                unaffected: vec![],
            }),
            advisory,
        }
    }

    fn vuln_entry(advisory: Advisory) -> Entry {
        Entry::new(make_finding(Some(advisory)), Severity::Error, None)
    }

    #[test]
    fn id_is_advisory_id() {
        let entry = vuln_entry(make_advisory("RUSTSEC-2024-0001"));
        assert_eq!(entry.id(), "RUSTSEC-2024-0001");
    }

    #[test]
    fn id_for_yanked_crate() {
        let entry = Entry::new(make_finding(None), Severity::Warning, Some("yanked".into()));
        assert_eq!(entry.id(), "Crate foo 1.0.0");
        assert_eq!(entry.kind(), &EntryKind::Yanked);
    }

    #[test]
    fn markdown_header_uses_severity_icon() {
        let md = vuln_entry(make_advisory("RUSTSEC-2024-0001")).render_markdown();
        assert!(md.starts_with("## 🛑 RUSTSEC-2024-0001: Use after free in foo\n"));

        let warn = Entry::new(
            make_finding(Some(make_advisory("RUSTSEC-2024-0001"))),
            Severity::Warning,
            Some("unsound".into()),
        );
        let md = warn.render_markdown();
        assert!(md.starts_with("## ⚠️ RUSTSEC-2024-0001"));
        assert!(md.contains("| Warning | unsound |"));
    }

    #[test]
    fn markdown_table_rows() {
        let md = vuln_entry(make_advisory("RUSTSEC-2024-0001")).render_markdown();
        assert!(md.contains("| Package | `foo` |"));
        assert!(md.contains("| Version | `1.0.0` |"));
        assert!(md.contains("| URL | <https://example.com/RUSTSEC-2024-0001> |"));
        assert!(md.contains("| Patched Versions | `>=1.0.1` |"));
        assert!(!md.contains("Unaffected Versions"));
        assert!(!md.contains("Aliases"));
        assert!(!md.contains("Related Advisories"));
        assert!(!md.contains("| Warning |"));
    }

    #[test]
    fn patched_versions_na_when_empty() {
        let mut finding = make_finding(Some(make_advisory("RUSTSEC-2024-0001")));
        finding.versions = Some(Versions {
            patched: vec![],
            unaffected: vec!["<0.5".to_string(), ">=2.0".to_string()],
        });
        let md = Entry::new(finding, Severity::Error, None).render_markdown();
        assert!(md.contains("| Patched Versions | n/a |"));
        assert!(md.contains("| Unaffected Versions | `<0.5 OR >=2.0` |"));
    }

    #[test]
    fn missing_url_falls_back_to_rustsec() {
        let mut advisory = make_advisory("RUSTSEC-2024-0001");
        advisory.url = None;
        let md = vuln_entry(advisory).render_markdown();
        assert!(md.contains("| URL | <https://rustsec.org/advisories/RUSTSEC-2024-0001.html> |"));
    }

    #[test]
    fn aliases_link_known_prefixes() {
        let mut advisory = make_advisory("RUSTSEC-2024-0001");
        advisory.aliases = vec![
            "GHSA-abcd-efgh-ijkl".to_string(),
            "CVE-2024-1234".to_string(),
            "OSV-9999".to_string(),
        ];
        advisory.related = vec!["RUSTSEC-2023-0002".to_string()];
        let md = vuln_entry(advisory).render_markdown();
        assert!(md.contains(
            "| Aliases | [GHSA-abcd-efgh-ijkl](https://github.com/advisories/GHSA-abcd-efgh-ijkl), \
             [CVE-2024-1234](https://nvd.nist.gov/vuln/detail/CVE-2024-1234), OSV-9999 |"
        ));
        assert!(md.contains(
            "| Related Advisories | [RUSTSEC-2023-0002](https://rustsec.org/advisories/RUSTSEC-2023-0002.html) |"
        ));
    }

    #[test]
    fn advisory_link_unknown_prefix() {
        assert_eq!(advisory_link("PYSEC-2021-1"), None);
        assert_eq!(
            advisory_link("GHSA-xxxx").as_deref(),
            Some("https://github.com/advisories/GHSA-xxxx")
        );
    }

    #[test]
    fn description_mentions_are_escaped() {
        let md = vuln_entry(make_advisory("RUSTSEC-2024-0001")).render_markdown();
        assert!(md.contains("user\u{200d}@example.com"));
        assert!(!md.contains("user@example.com"));
    }

    #[test]
    fn yanked_markdown() {
        let entry = Entry::new(make_finding(None), Severity::Warning, Some("yanked".into()));
        let md = entry.render_markdown();
        assert_eq!(
            md,
            "## ⚠️ Crate foo 1.0.0 is yanked.\n\nSwitch to a different version of `foo`.\n"
        );
    }

    #[test]
    fn issue_for_advisory() {
        let entry = vuln_entry(make_advisory("RUSTSEC-2024-0001"));
        let issue = entry.render_issue(&["security".to_string()], &["octocat".to_string()]);
        assert_eq!(issue.title, "RUSTSEC-2024-0001: Use after free in foo");
        assert_eq!(issue.identity, "RUSTSEC-2024-0001");
        assert_eq!(issue.labels, vec!["security"]);
        assert_eq!(issue.assignees, vec!["octocat"]);
        assert!(issue.body.starts_with("| Details | |"));
        assert!(!issue.body.contains("🛑"));
        assert!(issue.body.ends_with("Reported by user\u{200d}@example.com."));
    }

    #[test]
    fn issue_for_yanked_crate() {
        let entry = Entry::new(make_finding(None), Severity::Warning, Some("yanked".into()));
        let issue = entry.render_issue(&[], &[]);
        assert_eq!(issue.title, "Crate foo 1.0.0 is yanked");
        assert_eq!(issue.body, "Switch to a different version of `foo`.");
        assert!(issue.title.starts_with(&issue.identity));
    }

    #[test]
    fn policy_promotes_warnings() {
        assert_eq!(SeverityPolicy::default().warning_severity(), Severity::Warning);
        let deny = SeverityPolicy { deny_warnings: true };
        assert_eq!(deny.warning_severity(), Severity::Error);
    }
}
