//! Built-in heuristic checks used when no rule engine is available.

use crate::model::{Finding, FlowInfo, Severity};

/// Default minimum metadata API version before the `API Version` rule fires.
pub const DEFAULT_MIN_API_VERSION: f64 = 58.0;

pub struct BasicRule {
    pub name: &'static str,
    pub description: &'static str,
    pub severity: Severity,
    check: fn(&FlowInfo, &BasicRules) -> bool,
}

impl BasicRule {
    pub fn matches(&self, flow: &FlowInfo, rules: &BasicRules) -> bool {
        (self.check)(flow, rules)
    }
}

pub const BASIC_RULES: [BasicRule; 5] = [
    BasicRule {
        name: "Flow Description",
        description: "Flow should have a description for better documentation",
        severity: Severity::Warning,
        check: |flow, _| flow.description().is_none(),
    },
    BasicRule {
        name: "API Version",
        description: "Flow should use a recent API version",
        severity: Severity::Info,
        check: |flow, rules| match flow.api_version() {
            Some(version) => version < rules.min_api_version,
            None => !flow.declares_api_version(),
        },
    },
    BasicRule {
        name: "Flow Status",
        description: "Active flows should be thoroughly tested",
        severity: Severity::Info,
        check: |flow, _| flow.status == "Active",
    },
    BasicRule {
        name: "Flow Type Check",
        description: "Consider using Flow instead of Process Builder for new automation",
        severity: Severity::Warning,
        check: |flow, _| flow.flow_type == "Workflow",
    },
    BasicRule {
        name: "Flow Name Convention",
        description: "Flow names should follow naming conventions",
        severity: Severity::Info,
        check: |flow, _| !flow.name.contains('_') && !flow.name.contains(' '),
    },
];

#[derive(Debug, Clone, Copy)]
pub struct BasicRules {
    pub min_api_version: f64,
}

impl BasicRules {
    pub fn new(min_api_version: f64) -> Self {
        Self { min_api_version }
    }

    /// Runs every rule in order, producing one finding per match.
    pub fn analyze(&self, flow: &FlowInfo) -> Vec<Finding> {
        BASIC_RULES
            .iter()
            .filter(|rule| rule.matches(flow, self))
            .map(|rule| {
                Finding::new(
                    rule.name,
                    rule.description,
                    rule.severity,
                    format!("Flow: {}", flow.name),
                )
            })
            .collect()
    }
}

impl Default for BasicRules {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_API_VERSION)
    }
}
