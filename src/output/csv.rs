use crate::model::ScanReport;

const HEADER: [&str; 7] = [
    "Rule",
    "Description",
    "Severity",
    "Details",
    "Element Name",
    "Element Type",
    "Meta Type",
];

/// One header row plus one row per finding.
pub fn generate_csv_string(report: &ScanReport) -> String {
    let mut out = String::new();
    push_row(&mut out, HEADER.iter().copied());

    for finding in &report.scan_results {
        push_row(
            &mut out,
            [
                finding.rule.as_str(),
                finding.description.as_str(),
                finding.severity.as_str(),
                finding.details.as_str(),
                finding.element_name.as_deref().unwrap_or(""),
                finding.element_type.as_deref().unwrap_or(""),
                finding.meta_type.as_deref().unwrap_or(""),
            ],
        );
    }

    out
}

fn push_row<'a>(out: &mut String, fields: impl IntoIterator<Item = &'a str>) {
    let row: Vec<String> = fields.into_iter().map(csv_escape).collect();
    out.push_str(&row.join(","));
    out.push('\n');
}

fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Finding, FlowInfo, Severity};

    #[test]
    fn test_csv_escape() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_escape("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn test_generate_csv_string() {
        let flow = FlowInfo::new("a", "b", "Case_Router");
        let findings = vec![
            Finding::new("Flow Status", "Active flows should be thoroughly tested", Severity::Info, "Flow: Case_Router"),
            Finding::new("HardcodedId", "Avoid hardcoded ids, please", Severity::Error, "Flow: Case_Router - Owner_Id")
                .with_element(Some("Owner_Id".into()), Some("variables".into()), Some("variable".into())),
        ];
        let report = ScanReport::new(flow, findings, "Basic Scanner");

        let csv = generate_csv_string(&report);
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "Rule,Description,Severity,Details,Element Name,Element Type,Meta Type"
        );
        assert_eq!(
            lines[1],
            "Flow Status,Active flows should be thoroughly tested,info,Flow: Case_Router,,,"
        );
        assert_eq!(
            lines[2],
            "HardcodedId,\"Avoid hardcoded ids, please\",error,Flow: Case_Router - Owner_Id,Owner_Id,variables,variable"
        );
    }
}
