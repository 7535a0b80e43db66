use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::FlowInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
    Note,
}

impl Severity {
    pub const ALL: [Severity; 4] = [Severity::Error, Severity::Warning, Severity::Info, Severity::Note];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
            Severity::Note => "note",
        }
    }

    /// Parses an engine-supplied severity. Anything unrecognised is treated
    /// as a warning.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "error" | "critical" | "high" => Severity::Error,
            "info" | "information" | "low" => Severity::Info,
            "note" => Severity::Note,
            _ => Severity::Warning,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// One rule violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub rule: String,
    pub description: String,
    pub severity: Severity,
    pub details: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta_type: Option<String>,
}

impl Finding {
    pub fn new(
        rule: impl Into<String>,
        description: impl Into<String>,
        severity: Severity,
        details: impl Into<String>,
    ) -> Self {
        Self {
            rule: rule.into(),
            description: description.into(),
            severity,
            details: details.into(),
            element_name: None,
            element_type: None,
            meta_type: None,
        }
    }

    pub fn with_element(
        mut self,
        name: Option<String>,
        element_type: Option<String>,
        meta_type: Option<String>,
    ) -> Self {
        self.element_name = name;
        self.element_type = element_type;
        self.meta_type = meta_type;
        self
    }
}

/// The exportable outcome of scanning one flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub flow: FlowInfo,
    pub scan_results: Vec<Finding>,
    pub scan_date: DateTime<Utc>,
    pub total_issues: usize,
    pub scanner_version: String,
}

impl ScanReport {
    pub fn new(flow: FlowInfo, findings: Vec<Finding>, scanner_version: impl Into<String>) -> Self {
        Self {
            flow,
            total_issues: findings.len(),
            scan_results: findings,
            scan_date: Utc::now(),
            scanner_version: scanner_version.into(),
        }
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.scan_results
            .iter()
            .filter(|f| f.severity == severity)
            .count()
    }

    /// Highest severity present, if any.
    pub fn worst_severity(&self) -> Option<Severity> {
        self.scan_results.iter().map(|f| f.severity).min()
    }

    /// Findings grouped by severity (rank order), then by rule in the order
    /// each rule first appears.
    pub fn grouped(&self) -> Vec<SeverityGroup<'_>> {
        let mut groups = Vec::new();

        for severity in Severity::ALL {
            let mut rules: Vec<RuleGroup<'_>> = Vec::new();
            for finding in self.scan_results.iter().filter(|f| f.severity == severity) {
                match rules.iter().position(|g| g.rule == finding.rule) {
                    Some(i) => rules[i].findings.push(finding),
                    None => rules.push(RuleGroup {
                        rule: &finding.rule,
                        description: &finding.description,
                        findings: vec![finding],
                    }),
                }
            }

            if !rules.is_empty() {
                groups.push(SeverityGroup { severity, rules });
            }
        }

        groups
    }
}

#[derive(Debug)]
pub struct SeverityGroup<'a> {
    pub severity: Severity,
    pub rules: Vec<RuleGroup<'a>>,
}

impl SeverityGroup<'_> {
    pub fn count(&self) -> usize {
        self.rules.iter().map(|r| r.findings.len()).sum()
    }
}

#[derive(Debug)]
pub struct RuleGroup<'a> {
    pub rule: &'a str,
    pub description: &'a str,
    pub findings: Vec<&'a Finding>,
}
