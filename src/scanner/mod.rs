//! Flow scanning.
//!
//! A [`Dispatcher`] runs an optional external [`RuleEngine`] (the Lightning
//! Flow Scanner, via [`CommandEngine`]) and falls back to the built-in
//! [`BasicRules`] when the engine is missing or fails.
//!
//! # Example
//!
//! ```no_run
//! use flowscan::scanner::{BasicRules, Dispatcher};
//! use flowscan::FlowInfo;
//!
//! #[tokio::main]
//! async fn main() {
//!     let flow = FlowInfo::new("301000000000001AAA", "300000000000001AAA", "Case_Router")
//!         .with_status("Active");
//!     let report = Dispatcher::new(BasicRules::default()).scan(&flow).await;
//!
//!     for finding in &report.scan_results {
//!         println!("{}: {}", finding.rule, finding.description);
//!     }
//! }
//! ```

mod basic;
mod elements;
mod engine;

pub use self::basic::{BasicRule, BasicRules, BASIC_RULES};
pub use self::elements::extract_elements;
pub use self::engine::CommandEngine;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{Config, IgnoreConfig};
use crate::model::{Finding, FlowInfo, ScanReport, Severity};

pub const CORE_SCANNER_VERSION: &str = "Flow Scanner Core";
pub const BASIC_SCANNER_VERSION: &str = "Basic Scanner";

/// An external rule engine that scans parsed flows.
#[async_trait]
pub trait RuleEngine: Send + Sync {
    /// Returns the human-readable name of this engine.
    fn name(&self) -> &'static str;

    /// Returns true if the engine can be invoked on this machine.
    fn is_available(&self) -> bool;

    /// Scans the given flows and returns the engine's nested results.
    async fn scan(&self, flows: &[ParsedFlow]) -> Result<Vec<EngineScanResult>>;
}

/// One flow as handed to the engine.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedFlow {
    pub uri: String,
    pub flow: EngineFlow,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineFlow {
    pub name: String,
    #[serde(rename = "type")]
    pub flow_type: String,
    pub xmldata: Option<Value>,
    pub elements: Vec<FlowElement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowElement {
    pub name: String,
    #[serde(rename = "type")]
    pub element_type: String,
    pub meta_type: String,
}

impl ParsedFlow {
    pub fn from_flow(flow: &FlowInfo) -> Self {
        Self {
            uri: flow.id.clone(),
            flow: EngineFlow {
                name: flow.name.clone(),
                flow_type: flow.flow_type.clone(),
                xmldata: flow.xml_data.clone(),
                elements: flow.xml_data.as_ref().map(extract_elements).unwrap_or_default(),
            },
            error_message: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineScanResult {
    #[serde(default)]
    pub rule_results: Vec<RuleResult>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleResult {
    pub rule_name: String,
    #[serde(default)]
    pub rule_definition: Option<RuleDefinition>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub occurs: bool,
    #[serde(default)]
    pub details: Vec<ResultDetail>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleDefinition {
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultDetail {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub element_type: Option<String>,
    #[serde(default)]
    pub meta_type: Option<String>,
}

/// Turns the engine's nested results into one finding per reported element.
pub fn flatten_results(flow_name: &str, results: &[EngineScanResult]) -> Vec<Finding> {
    let mut findings = Vec::new();

    for result in results {
        for rule in &result.rule_results {
            if !rule.occurs || rule.details.is_empty() {
                continue;
            }

            let description = rule
                .rule_definition
                .as_ref()
                .and_then(|d| d.description.clone())
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| rule.rule_name.clone());
            let severity = rule
                .severity
                .as_deref()
                .map(Severity::parse_lenient)
                .unwrap_or(Severity::Warning);

            for detail in &rule.details {
                let element = detail.name.as_deref().unwrap_or("Unknown element");
                findings.push(
                    Finding::new(
                        &rule.rule_name,
                        description.clone(),
                        severity,
                        format!("Flow: {} - {}", flow_name, element),
                    )
                    .with_element(
                        detail.name.clone(),
                        detail.element_type.clone(),
                        detail.meta_type.clone(),
                    ),
                );
            }
        }
    }

    findings
}

/// Chooses between the external engine and the basic rules.
pub struct Dispatcher {
    engine: Option<Box<dyn RuleEngine>>,
    basic: BasicRules,
    ignore: IgnoreConfig,
}

impl Dispatcher {
    pub fn new(basic: BasicRules) -> Self {
        Self {
            engine: None,
            basic,
            ignore: IgnoreConfig::default(),
        }
    }

    pub fn from_config(config: &Config, use_core: bool) -> Self {
        let dispatcher = Self::new(BasicRules::new(config.min_api_version))
            .with_ignore(config.ignore.clone());

        if use_core && config.use_core && !config.core_command.is_empty() {
            let engine = CommandEngine::new(config.core_command.clone())
                .with_timeout(Duration::from_secs(config.engine_timeout_secs));
            dispatcher.with_engine(Box::new(engine))
        } else {
            dispatcher
        }
    }

    pub fn with_engine(mut self, engine: Box<dyn RuleEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn with_ignore(mut self, ignore: IgnoreConfig) -> Self {
        self.ignore = ignore;
        self
    }

    /// The engine that will be tried first, if it is available.
    pub fn core(&self) -> Option<&dyn RuleEngine> {
        self.engine.as_deref().filter(|e| e.is_available())
    }

    pub async fn scan(&self, flow: &FlowInfo) -> ScanReport {
        let (findings, version) = match self.core() {
            Some(engine) => match self.scan_with_core(engine, flow).await {
                Ok(findings) => (findings, CORE_SCANNER_VERSION),
                Err(e) => {
                    warn!(engine = engine.name(), error = %e, "Rule engine failed, using basic analysis");
                    (self.basic.analyze(flow), BASIC_SCANNER_VERSION)
                }
            },
            None => {
                if self.engine.is_some() {
                    warn!("Flow Scanner Core not available, using basic analysis");
                }
                (self.basic.analyze(flow), BASIC_SCANNER_VERSION)
            }
        };

        let findings: Vec<Finding> = findings
            .into_iter()
            .filter(|f| !self.ignore.should_ignore_rule(&f.rule))
            .collect();

        ScanReport::new(flow.clone(), findings, version)
    }

    async fn scan_with_core(&self, engine: &dyn RuleEngine, flow: &FlowInfo) -> Result<Vec<Finding>> {
        let parsed = [ParsedFlow::from_flow(flow)];
        let results = engine.scan(&parsed).await?;
        let findings = flatten_results(&flow.name, &results);
        info!(engine = engine.name(), count = findings.len(), "Rule engine scan complete");
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct StubEngine {
        available: bool,
        output: Option<Value>,
    }

    #[async_trait]
    impl RuleEngine for StubEngine {
        fn name(&self) -> &'static str {
            "stub"
        }

        fn is_available(&self) -> bool {
            self.available
        }

        async fn scan(&self, flows: &[ParsedFlow]) -> Result<Vec<EngineScanResult>> {
            assert_eq!(flows.len(), 1);
            match &self.output {
                Some(v) => Ok(serde_json::from_value(v.clone())?),
                None => anyhow::bail!("engine crashed"),
            }
        }
    }

    fn engine_output() -> Value {
        json!([{
            "ruleResults": [
                {
                    "ruleName": "MissingFaultPath",
                    "ruleDefinition": {"description": "Add fault paths to DML elements"},
                    "severity": "error",
                    "occurs": true,
                    "details": [
                        {"name": "Create_Case", "type": "recordCreates", "metaType": "node"},
                        {"type": "recordUpdates"}
                    ]
                },
                {
                    "ruleName": "HardcodedId",
                    "occurs": true,
                    "details": [{"name": "Owner_Id", "type": "variables", "metaType": "variable"}]
                },
                {"ruleName": "DMLStatementInLoop", "occurs": false, "details": []},
                {"ruleName": "UnusedVariable", "occurs": true, "details": []}
            ]
        }])
    }

    fn flow() -> FlowInfo {
        FlowInfo::new("301000000000001AAA", "300000000000001AAA", "Case_Router").with_status("Draft")
    }

    #[test]
    fn test_flatten_results() {
        let results: Vec<EngineScanResult> = serde_json::from_value(engine_output()).unwrap();
        let findings = flatten_results("Case_Router", &results);

        assert_eq!(findings.len(), 3);
        assert_eq!(findings[0].rule, "MissingFaultPath");
        assert_eq!(findings[0].description, "Add fault paths to DML elements");
        assert_eq!(findings[0].severity, Severity::Error);
        assert_eq!(findings[0].details, "Flow: Case_Router - Create_Case");
        assert_eq!(findings[0].element_type.as_deref(), Some("recordCreates"));
        assert_eq!(findings[1].details, "Flow: Case_Router - Unknown element");
        assert_eq!(findings[2].description, "HardcodedId");
        assert_eq!(findings[2].severity, Severity::Warning);
    }

    #[tokio::test]
    async fn test_dispatch_uses_core_when_available() {
        let dispatcher = Dispatcher::new(BasicRules::default()).with_engine(Box::new(StubEngine {
            available: true,
            output: Some(engine_output()),
        }));

        let report = dispatcher.scan(&flow()).await;
        assert_eq!(report.scanner_version, CORE_SCANNER_VERSION);
        assert_eq!(report.total_issues, 3);
    }

    #[tokio::test]
    async fn test_dispatch_falls_back_when_core_fails() {
        let dispatcher = Dispatcher::new(BasicRules::default()).with_engine(Box::new(StubEngine {
            available: true,
            output: None,
        }));

        let report = dispatcher.scan(&flow()).await;
        assert_eq!(report.scanner_version, BASIC_SCANNER_VERSION);
        assert!(report.scan_results.iter().any(|f| f.rule == "Flow Description"));
    }

    #[tokio::test]
    async fn test_dispatch_skips_unavailable_core() {
        let dispatcher = Dispatcher::new(BasicRules::default()).with_engine(Box::new(StubEngine {
            available: false,
            output: Some(engine_output()),
        }));

        assert!(dispatcher.core().is_none());
        let report = dispatcher.scan(&flow()).await;
        assert_eq!(report.scanner_version, BASIC_SCANNER_VERSION);
    }

    #[tokio::test]
    async fn test_ignored_rules_are_dropped() {
        let dispatcher = Dispatcher::new(BasicRules::default()).with_ignore(IgnoreConfig {
            rules: vec!["Flow *".to_string()],
        });

        let report = dispatcher.scan(&flow()).await;
        let rules: Vec<_> = report.scan_results.iter().map(|f| f.rule.as_str()).collect();
        assert_eq!(rules, vec!["API Version"]);
    }

    #[test]
    fn test_parsed_flow_shape() {
        let flow = flow().with_xml_data(json!({
            "decisions": [{"name": "Is_Urgent"}],
            "variables": [{"name": "recordId"}]
        }));
        let value = serde_json::to_value(ParsedFlow::from_flow(&flow)).unwrap();

        assert_eq!(value["uri"], "301000000000001AAA");
        assert!(value["errorMessage"].is_null());
        assert_eq!(value["flow"]["type"], "Unknown");
        assert_eq!(value["flow"]["elements"].as_array().unwrap().len(), 2);
        assert_eq!(value["flow"]["xmldata"]["decisions"][0]["name"], "Is_Urgent");
    }
}
