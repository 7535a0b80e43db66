mod cli;
mod csv;
mod export;
mod html;
mod json;

pub use cli::{print_cli_table, print_flow_info};
pub use csv::generate_csv_string;
pub use export::{export_file_name, export_report, ExportFormat};
pub use html::{generate_html_string, print_html};
pub use json::print_json;

use crate::model::ScanReport;
use anyhow::Result;

/// Output format for scan results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Grouped tables for the terminal
    Table,
    /// The export document as JSON
    Json,
    /// One row per finding
    Csv,
    /// Self-contained HTML report with collapsible groups
    Html,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            "html" => Ok(OutputFormat::Html),
            _ => Err(format!(
                "Unknown format: {}. Use 'table', 'json', 'csv', or 'html'",
                s
            )),
        }
    }
}

pub fn print_report(report: &ScanReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => print_cli_table(report),
        OutputFormat::Json => print_json(report),
        OutputFormat::Csv => {
            print!("{}", generate_csv_string(report));
            Ok(())
        }
        OutputFormat::Html => print_html(report),
    }
}

/// Format a report to string for file output
pub fn format_report_to_string(report: &ScanReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json | OutputFormat::Table => Ok(serde_json::to_string_pretty(report)?),
        OutputFormat::Csv => Ok(generate_csv_string(report)),
        OutputFormat::Html => Ok(generate_html_string(report)),
    }
}
