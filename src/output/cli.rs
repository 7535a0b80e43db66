use crate::model::{FlowInfo, ScanReport, Severity};
use anyhow::Result;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct FindingRow {
    #[tabled(rename = "Rule")]
    rule: String,
    #[tabled(rename = "Description")]
    description: String,
    #[tabled(rename = "Details")]
    details: String,
}

pub fn print_flow_info(flow: &FlowInfo) {
    println!();
    println!("{}", flow.name);
    println!("  Type: {}", flow.flow_type);
    println!("  Status: {}", flow.status);
    println!("  Flow Id: {}  Definition Id: {}", flow.id, flow.definition_id);
    if let Some(description) = flow.description() {
        println!("  Description: {}", truncate(description, 80));
    }
}

pub fn print_cli_table(report: &ScanReport) -> Result<()> {
    print_flow_info(&report.flow);
    println!();
    println!(
        "Scanned at {} with {}",
        report.scan_date.format("%Y-%m-%d %H:%M:%S UTC"),
        report.scanner_version
    );
    println!();

    if report.scan_results.is_empty() {
        println!("No issues found! Your flow looks good.");
        return Ok(());
    }

    for group in report.grouped() {
        println!(
            "{} ({})",
            format_severity(&group.severity),
            group.count()
        );

        let rows: Vec<FindingRow> = group
            .rules
            .iter()
            .flat_map(|rule| {
                rule.findings.iter().enumerate().map(move |(i, f)| FindingRow {
                    // Repeated rule names are blanked so each rule reads as one block
                    rule: if i == 0 {
                        format!("{} ({})", rule.rule, rule.findings.len())
                    } else {
                        String::new()
                    },
                    description: if i == 0 {
                        truncate(rule.description, 60)
                    } else {
                        String::new()
                    },
                    details: truncate(&f.details, 60),
                })
            })
            .collect();

        let table = Table::new(rows).with(Style::rounded()).to_string();
        println!("{}", table);
        println!();
    }

    print_summary(report);
    Ok(())
}

fn print_summary(report: &ScanReport) {
    let breakdown: Vec<String> = Severity::ALL
        .iter()
        .map(|s| (s, report.count(*s)))
        .filter(|(_, n)| *n > 0)
        .map(|(s, n)| format!("{} {}", n, s))
        .collect();

    println!("Summary:");
    println!("  Total issues: {}", report.total_issues);
    println!("  By severity: {}", breakdown.join(", "));
}

fn format_severity(severity: &Severity) -> String {
    match severity {
        Severity::Error => "\x1b[31mERROR\x1b[0m".to_string(),
        Severity::Warning => "\x1b[33mWARNING\x1b[0m".to_string(),
        Severity::Info => "\x1b[36mINFO\x1b[0m".to_string(),
        Severity::Note => "NOTE".to_string(),
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}
