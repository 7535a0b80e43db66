//! Writing scan reports to downloadable files.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use super::csv::generate_csv_string;
use crate::model::ScanReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            _ => Err(format!("Unknown export format: {}. Use 'json' or 'csv'", s)),
        }
    }
}

/// `flow-scan-<name>-<YYYY-MM-DD>.<ext>`, with characters that are unsafe
/// in file names replaced by `_`.
pub fn export_file_name(report: &ScanReport, format: ExportFormat) -> String {
    let name: String = report
        .flow
        .name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();

    format!(
        "flow-scan-{}-{}.{}",
        name.trim(),
        report.scan_date.format("%Y-%m-%d"),
        format.extension()
    )
}

/// Writes the report into `dir` and returns the path of the new file.
///
/// # Errors
///
/// Fails when the report has no findings, or the file cannot be written.
pub fn export_report(report: &ScanReport, format: ExportFormat, dir: &Path) -> Result<PathBuf> {
    if report.scan_results.is_empty() {
        bail!("Nothing to export: the scan found no issues");
    }

    let content = match format {
        ExportFormat::Json => serde_json::to_string_pretty(report)?,
        ExportFormat::Csv => generate_csv_string(report),
    };

    if !dir.exists() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create export directory: {:?}", dir))?;
    }

    let path = dir.join(export_file_name(report, format));
    fs::write(&path, content).with_context(|| format!("Failed to write {:?}", path))?;
    info!(path = %path.display(), "Exported scan results");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Finding, FlowInfo, Severity};
    use chrono::TimeZone;

    fn report(name: &str, findings: Vec<Finding>) -> ScanReport {
        let mut report = ScanReport::new(FlowInfo::new("301A", "300A", name), findings, "Basic Scanner");
        report.scan_date = chrono::Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap();
        report
    }

    fn finding() -> Finding {
        Finding::new("Flow Status", "Active flows should be thoroughly tested", Severity::Info, "Flow: x")
    }

    #[test]
    fn test_export_file_name() {
        let r = report("Case_Router", vec![finding()]);
        assert_eq!(
            export_file_name(&r, ExportFormat::Json),
            "flow-scan-Case_Router-2026-03-14.json"
        );

        let r = report("Sales/Ops: Intake", vec![finding()]);
        assert_eq!(
            export_file_name(&r, ExportFormat::Csv),
            "flow-scan-Sales_Ops_ Intake-2026-03-14.csv"
        );
    }

    #[test]
    fn test_export_json_document() {
        let dir = tempfile::tempdir().unwrap();
        let r = report("Case_Router", vec![finding()]);

        let path = export_report(&r, ExportFormat::Json, dir.path()).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();

        assert_eq!(value["totalIssues"], 1);
        assert_eq!(value["scannerVersion"], "Basic Scanner");
        assert_eq!(value["flow"]["name"], "Case_Router");
        assert_eq!(value["scanResults"][0]["rule"], "Flow Status");
        assert!(value["scanDate"].as_str().unwrap().starts_with("2026-03-14T09:30:00"));
    }

    #[test]
    fn test_export_csv_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("exports");
        let r = report("Case_Router", vec![finding()]);

        let path = export_report(&r, ExportFormat::Csv, &nested).unwrap();
        let content = fs::read_to_string(path).unwrap();
        assert!(content.starts_with("Rule,Description,Severity"));
    }

    #[test]
    fn test_export_refuses_empty_report() {
        let dir = tempfile::tempdir().unwrap();
        let r = report("Case_Router", vec![]);
        assert!(export_report(&r, ExportFormat::Json, dir.path()).is_err());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
