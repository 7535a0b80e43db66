//! Core data types for flows, findings, and scan reports.
//!
//! - [`FlowInfo`] - A snapshot of one Flow version's metadata
//! - [`Finding`] - A single rule violation
//! - [`Severity`] - How serious a finding is
//! - [`ScanReport`] - The exportable result of one scan
//!
//! # Example
//!
//! ```
//! use flowscan::{FlowInfo, Finding, ScanReport, Severity};
//!
//! let flow = FlowInfo::new("301000000000001AAA", "300000000000001AAA", "Case_Router");
//! let finding = Finding::new("Flow Status", "Active flows should be thoroughly tested", Severity::Info, "Flow: Case_Router");
//! let report = ScanReport::new(flow, vec![finding], "Basic Scanner");
//!
//! assert_eq!(report.total_issues, 1);
//! ```

mod finding;
mod flow;

pub use finding::*;
pub use flow::*;
