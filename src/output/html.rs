//! HTML report output format.
//!
//! Generates a self-contained report. Findings are grouped by severity and
//! then by rule, each group a `<details>` element so the sections expand and
//! collapse with mouse or keyboard and need no script.

use crate::model::{ScanReport, Severity};
use anyhow::Result;

/// Generate and print HTML report output
pub fn print_html(report: &ScanReport) -> Result<()> {
    println!("{}", generate_html_string(report));
    Ok(())
}

/// Generate HTML as a string (for file output)
pub fn generate_html_string(report: &ScanReport) -> String {
    let flow = &report.flow;
    let mut html = String::new();

    html.push_str(&format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Flow Scan - {}</title>
    <style>
        :root {{
            --bg-color: #f3f3f3;
            --card-bg: #ffffff;
            --text-color: #181818;
            --text-muted: #706e6b;
            --border-color: #dddbda;
            --error: #c62828;
            --warning: #dd7a01;
            --info: #0176d3;
            --note: #706e6b;
        }}
        * {{ box-sizing: border-box; margin: 0; padding: 0; }}
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            background: var(--bg-color);
            color: var(--text-color);
            line-height: 1.5;
            padding: 2rem;
        }}
        .container {{ max-width: 1000px; margin: 0 auto; }}
        header {{
            background: var(--card-bg);
            border: 1px solid var(--border-color);
            border-radius: 8px;
            padding: 1.25rem;
            margin-bottom: 1.5rem;
        }}
        h1 {{ font-size: 1.5rem; font-weight: 600; }}
        .meta {{ color: var(--text-muted); font-size: 0.9rem; }}
        .total {{ font-size: 2rem; font-weight: 700; }}
        details {{
            background: var(--card-bg);
            border: 1px solid var(--border-color);
            border-radius: 8px;
            margin-bottom: 0.75rem;
        }}
        details details {{ margin: 0.5rem 1rem; }}
        summary {{ cursor: pointer; padding: 0.75rem 1rem; font-weight: 600; }}
        summary:focus-visible {{ outline: 2px solid var(--info); }}
        .count {{ color: var(--text-muted); font-weight: 400; }}
        .severity {{ padding: 0.15rem 0.5rem; border-radius: 4px; font-size: 0.75rem; color: white; text-transform: uppercase; }}
        .severity-error {{ background: var(--error); }}
        .severity-warning {{ background: var(--warning); }}
        .severity-info {{ background: var(--info); }}
        .severity-note {{ background: var(--note); }}
        .description {{ padding: 0 1rem 0.5rem; color: var(--text-muted); }}
        ul {{ list-style: none; padding: 0 1rem 0.75rem; }}
        li {{ padding: 0.35rem 0; border-top: 1px solid var(--border-color); }}
        .element {{ color: var(--text-muted); font-size: 0.85rem; }}
        .no-results {{ text-align: center; padding: 2rem; color: var(--text-muted); }}
        footer {{ text-align: center; color: var(--text-muted); font-size: 0.8rem; margin-top: 2rem; }}
    </style>
</head>
<body>
    <div class="container">
        <header>
            <h1>{}</h1>
            <p class="meta">Type: {} &middot; Status: {} &middot; Flow Id: {}</p>
            <p class="meta">Scanned {} with {}</p>
            <p><span class="total">{}</span> issues</p>
        </header>
"#,
        html_escape(&flow.name),
        html_escape(&flow.name),
        html_escape(&flow.flow_type),
        html_escape(&flow.status),
        html_escape(&flow.id),
        report.scan_date.format("%Y-%m-%d %H:%M:%S UTC"),
        html_escape(&report.scanner_version),
        report.total_issues
    ));

    if report.scan_results.is_empty() {
        html.push_str(
            r#"        <div class="no-results">No issues found! Your flow looks good.</div>
"#,
        );
    }

    for group in report.grouped() {
        // Errors start expanded
        let open = if group.severity == Severity::Error { " open" } else { "" };
        html.push_str(&format!(
            r#"        <details class="severity-group"{}>
            <summary><span class="severity severity-{}">{}</span> <span class="count">({})</span></summary>
"#,
            open,
            group.severity.as_str(),
            group.severity.as_str(),
            group.count()
        ));

        for rule in &group.rules {
            html.push_str(&format!(
                r#"            <details class="rule-group">
                <summary>{} <span class="count">({})</span></summary>
                <p class="description">{}</p>
                <ul>
"#,
                html_escape(rule.rule),
                rule.findings.len(),
                html_escape(rule.description)
            ));

            for finding in &rule.findings {
                let element = match (&finding.element_type, &finding.meta_type) {
                    (Some(t), Some(m)) => format!(
                        r#" <span class="element">[{} / {}]</span>"#,
                        html_escape(t),
                        html_escape(m)
                    ),
                    (Some(t), None) => {
                        format!(r#" <span class="element">[{}]</span>"#, html_escape(t))
                    }
                    _ => String::new(),
                };
                html.push_str(&format!(
                    "                    <li>{}{}</li>\n",
                    html_escape(&finding.details),
                    element
                ));
            }

            html.push_str("                </ul>\n            </details>\n");
        }

        html.push_str("        </details>\n");
    }

    html.push_str(
        r#"        <footer>
            Generated by flowscan
        </footer>
    </div>
</body>
</html>
"#,
    );

    html
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
