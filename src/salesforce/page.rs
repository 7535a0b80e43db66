//! Text scraped from a saved Flow Builder page.
//!
//! Used only when the Tooling API cannot be reached. Values are matched by
//! substring and are not validated further.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

const HEADER_TITLE_CLASS: &str = "slds-page-header__title";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageSnapshot {
    pub title: Option<String>,
    pub heading: Option<String>,
    pub body_text: String,
}

impl PageSnapshot {
    pub fn from_file(path: &Path) -> Result<Self> {
        let html = fs::read_to_string(path)
            .with_context(|| format!("Failed to read page snapshot: {:?}", path))?;
        Ok(Self::from_html(&html))
    }

    pub fn from_html(html: &str) -> Self {
        let title = element_text(html, "title").filter(|t| !t.is_empty());
        let heading = first_heading(html).filter(|h| !h.is_empty());

        let body = match find_ci(html, "<body") {
            Some(start) => &html[start..],
            None => html,
        };

        Self {
            title,
            heading,
            body_text: strip_tags(body),
        }
    }

    pub fn flow_name(&self) -> String {
        if let Some(title) = &self.title {
            if title.contains("Flow Builder") {
                return title.replace(" - Flow Builder", "").trim().to_string();
            }
        }

        if let Some(heading) = &self.heading {
            return heading.trim().to_string();
        }

        "Unknown Flow".to_string()
    }

    pub fn flow_type(&self) -> &'static str {
        let body = &self.body_text;
        if body.contains("Auto-launched Flow") {
            "AutoLaunchedFlow"
        } else if body.contains("Screen Flow") {
            "Flow"
        } else if body.contains("Process Builder") {
            "Workflow"
        } else if body.contains("Invocable Process") {
            "InvocableProcess"
        } else {
            "Flow"
        }
    }

    pub fn flow_status(&self) -> &'static str {
        let body = &self.body_text;
        if body.contains("Active") {
            "Active"
        } else if body.contains("Draft") {
            "Draft"
        } else if body.contains("Inactive") {
            "Inactive"
        } else {
            "Unknown"
        }
    }
}

fn find_ci(haystack: &str, needle: &str) -> Option<usize> {
    haystack.to_ascii_lowercase().find(&needle.to_ascii_lowercase())
}

fn starts_with_ci(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len() && s.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

/// Text content of the first `<tag>` element.
fn element_text(html: &str, tag: &str) -> Option<String> {
    let open = find_open_tag(html, tag)?;
    let after_open = &html[open..];
    let content_start = open + after_open.find('>')? + 1;
    let content = &html[content_start..];
    let end = find_ci(content, &format!("</{}", tag)).unwrap_or(content.len());
    Some(strip_tags(&content[..end]))
}

/// Start of the first `<tag` that is followed by `>` or whitespace, so `<h1`
/// does not match `<h10` and `<title` does not match `<titlebar`.
fn find_open_tag(html: &str, tag: &str) -> Option<usize> {
    let lower = html.to_ascii_lowercase();
    let pattern = format!("<{}", tag.to_ascii_lowercase());
    let mut offset = 0;

    while let Some(pos) = lower[offset..].find(&pattern) {
        let start = offset + pos;
        let next = lower[start + pattern.len()..].chars().next();
        if matches!(next, Some(c) if c == '>' || c.is_whitespace()) {
            return Some(start);
        }
        offset = start + pattern.len();
    }

    None
}

/// First `<h1>` or element carrying the page-header title class, whichever
/// comes first in the document.
fn first_heading(html: &str) -> Option<String> {
    let h1 = find_open_tag(html, "h1");
    let by_class = find_tag_with_class(html, HEADER_TITLE_CLASS);

    let start = match (h1, by_class) {
        (Some(a), Some(b)) => a.min(b),
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => return None,
    };

    let rest = &html[start + 1..];
    let tag: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();
    if tag.is_empty() {
        return None;
    }
    element_text(&html[start..], &tag)
}

/// Start of the first opening tag whose `class` attribute lists `class`.
/// Script, style and comment bodies are skipped.
fn find_tag_with_class(html: &str, class: &str) -> Option<usize> {
    let mut offset = 0;

    while let Some(pos) = html[offset..].find('<') {
        let start = offset + pos;
        let tag = &html[start..];

        let skip_to = if tag.starts_with("<!--") {
            find_ci(tag, "-->").map(|i| i + "-->".len())
        } else if starts_with_ci(tag, "<script") {
            find_ci(tag, "</script>").map(|i| i + "</script>".len())
        } else if starts_with_ci(tag, "<style") {
            find_ci(tag, "</style>").map(|i| i + "</style>".len())
        } else {
            let end = tag.find('>')?;
            let is_opening = tag[1..].starts_with(|c: char| c.is_ascii_alphabetic());
            let has_class = class_attr(&tag[..end])
                .is_some_and(|value| value.split_whitespace().any(|c| c == class));
            if is_opening && has_class {
                return Some(start);
            }
            Some(end + 1)
        };

        offset = start + skip_to?;
    }

    None
}

/// Value of the `class` attribute inside an opening tag's text.
fn class_attr(tag: &str) -> Option<&str> {
    let lower = tag.to_ascii_lowercase();
    let mut offset = 0;

    while let Some(pos) = lower[offset..].find("class") {
        let at = offset + pos;
        offset = at + "class".len();
        let preceded_by_space = lower[..at].ends_with(|c: char| c.is_whitespace());
        let rest = lower[offset..].trim_start();
        if !preceded_by_space || !rest.starts_with('=') {
            continue;
        }

        let value_start = tag.len() - rest.len() + 1;
        let value = tag[value_start..].trim_start();
        let value_start = tag.len() - value.len();
        return match value.chars().next() {
            Some(q @ ('"' | '\'')) => {
                let inner = &tag[value_start + 1..];
                Some(&inner[..inner.find(q).unwrap_or(inner.len())])
            }
            _ => Some(value.split_whitespace().next().unwrap_or("")),
        };
    }

    None
}

/// Visible text with tags, scripts, and styles removed and whitespace
/// collapsed.
fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        out.push(' ');
        let tag = &rest[start..];

        let skip = if starts_with_ci(tag, "<script") {
            find_ci(tag, "</script>").map(|i| i + "</script>".len())
        } else if starts_with_ci(tag, "<style") {
            find_ci(tag, "</style>").map(|i| i + "</style>".len())
        } else {
            tag.find('>').map(|i| i + 1)
        };

        rest = match skip {
            Some(n) => &tag[n..],
            None => "",
        };
    }
    out.push_str(rest);

    decode_entities(&out)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
