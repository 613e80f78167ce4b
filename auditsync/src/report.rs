use std::fmt;

use anyhow::{Context, Result};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

use crate::entry::{Entry, Severity, SeverityPolicy};

/// A `cargo audit --json` report.
#[derive(Debug, Clone, Deserialize)]
pub struct Report {
    pub vulnerabilities: Vulnerabilities,
    pub warnings: Warnings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Vulnerabilities {
    pub count: usize,
    pub list: Vec<Finding>,
}

/// Warning findings grouped by kind ("unmaintained", "yanked", ...), in the
/// order the kinds appear in the report.
#[derive(Debug, Clone, Default)]
pub struct Warnings(Vec<(String, Vec<Finding>)>);

impl Warnings {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Finding])> {
        self.0.iter().map(|(kind, list)| (kind.as_str(), list.as_slice()))
    }

    pub fn total(&self) -> usize {
        self.0.iter().map(|(_, list)| list.len()).sum()
    }
}

impl<'de> Deserialize<'de> for Warnings {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct WarningsVisitor;

        impl<'de> Visitor<'de> for WarningsVisitor {
            type Value = Warnings;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of warning kind to findings")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Warnings, A::Error> {
                let mut kinds = Vec::new();
                while let Some((kind, list)) = map.next_entry::<String, Vec<Finding>>()? {
                    kinds.push((kind, list));
                }
                Ok(Warnings(kinds))
            }
        }

        deserializer.deserialize_map(WarningsVisitor)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Finding {
    pub package: Package,
    #[serde(default)]
    pub versions: Option<Versions>,
    #[serde(default)]
    pub advisory: Option<Advisory>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Package {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Versions {
    #[serde(default)]
    pub patched: Vec<String>,
    #[serde(default)]
    pub unaffected: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Advisory {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub related: Vec<String>,
}

impl Report {
    /// Classify every finding. Vulnerabilities come first, then warnings
    /// grouped by kind in report order.
    pub fn entries(&self, policy: SeverityPolicy) -> Vec<Entry> {
        let vulnerabilities = self
            .vulnerabilities
            .list
            .iter()
            .map(|finding| Entry::new(finding.clone(), Severity::Error, None));

        let warnings = self.warnings.iter().flat_map(move |(kind, list)| {
            list.iter().map(move |finding| {
                Entry::new(
                    finding.clone(),
                    policy.warning_severity(),
                    Some(kind.to_string()),
                )
            })
        });

        vulnerabilities.chain(warnings).collect()
    }
}

pub fn parse_report(raw: &str) -> Result<Report> {
    serde_json::from_str(raw).context("failed to parse cargo-audit report")
}
