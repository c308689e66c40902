// src/replay/exporter.rs
//! Export replay reports
//!
//! Supports:
//! - JSON (for analysis and tooling)
//! - JUnit XML (for CI integration)

use super::report::ReplayReport;
use crate::utils::errors::{EngineError, Result};
use std::fmt::Write;
use std::str::FromStr;
use tracing::debug;

/// Export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    JUnit,
}

impl FromStr for ExportFormat {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "junit" | "xml" => Ok(ExportFormat::JUnit),
            other => Err(EngineError::ExportFailed(format!(
                "Unknown export format: {}",
                other
            ))),
        }
    }
}

/// Renders replay reports
pub struct Exporter {
    format: ExportFormat,
}

impl Exporter {
    pub fn new(format: ExportFormat) -> Self {
        Self { format }
    }

    pub fn export(&self, reports: &[ReplayReport]) -> Result<String> {
        debug!("Exporting {} reports to {:?}", reports.len(), self.format);

        match self.format {
            ExportFormat::Json => export_json(reports),
            ExportFormat::JUnit => export_junit(reports),
        }
    }
}

fn export_json(reports: &[ReplayReport]) -> Result<String> {
    serde_json::to_string_pretty(reports)
        .map_err(|e| EngineError::ExportFailed(format!("JSON serialization error: {}", e)))
}

fn export_junit(reports: &[ReplayReport]) -> Result<String> {
    let failures = reports.iter().filter(|r| !r.passed).count();
    let skipped = reports.iter().filter(|r| !r.compared).count();
    let total_secs: f64 = reports.iter().map(|r| r.elapsed_ms as f64 / 1000.0).sum();

    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(
        xml,
        r#"<testsuite name="traffic-replay" tests="{}" failures="{}" skipped="{}" time="{:.3}">"#,
        reports.len(),
        failures,
        skipped,
        total_secs
    );

    for report in reports {
        let _ = write!(
            xml,
            r#"  <testcase name="{}" classname="{}" time="{:.3}""#,
            escape(&report.record_id),
            report.protocol,
            report.elapsed_ms as f64 / 1000.0
        );

        if !report.compared {
            xml.push_str(">\n    <skipped message=\"no response to compare\"/>\n  </testcase>\n");
        } else if report.passed {
            xml.push_str("/>\n");
        } else {
            let details: Vec<String> = report.diffs.iter().map(|d| escape(&d.to_string())).collect();
            let _ = write!(
                xml,
                ">\n    <failure message=\"{} differences\">{}</failure>\n  </testcase>\n",
                report.diffs.len(),
                details.join("\n")
            );
        }
    }

    xml.push_str("</testsuite>\n");
    Ok(xml)
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(c),
            // Not representable in XML 1.0
            c if c < '\u{20}' => out.push(char::REPLACEMENT_CHARACTER),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::DiffDetail;
    use crate::model::ProtocolTag;
    use serde_json::json;
    use std::time::Duration;

    fn reports() -> Vec<ReplayReport> {
        vec![
            ReplayReport::compared("ok-1", ProtocolTag::Http, vec![], Duration::from_millis(12)),
            ReplayReport::compared(
                "bad<1>",
                ProtocolTag::Http,
                vec![DiffDetail::modify("/body/total", &json!(10), &json!(12))],
                Duration::from_millis(30),
            ),
            ReplayReport::not_compared("evt-1", ProtocolTag::EventStream, Duration::ZERO),
        ]
    }

    #[test]
    fn test_json_export() {
        let json = Exporter::new(ExportFormat::Json).export(&reports()).unwrap();
        let parsed: Vec<ReplayReport> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[1].record_id, "bad<1>");
    }

    #[test]
    fn test_junit_export() {
        let xml = Exporter::new(ExportFormat::JUnit).export(&reports()).unwrap();

        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains(r#"tests="3" failures="1" skipped="1""#));
        assert!(xml.contains(r#"name="bad&lt;1&gt;""#));
        assert!(xml.contains("MODIFY /body/total: 10 -&gt; 12"));
        assert!(xml.contains("<skipped"));
    }

    #[test]
    fn test_junit_replaces_control_characters() {
        let report = ReplayReport::compared(
            "ctl-1",
            ProtocolTag::Http,
            vec![DiffDetail::modify("/body/note", &json!("a\u{1}b\u{1b}"), &json!("ok\tdone"))],
            Duration::ZERO,
        );

        let xml = Exporter::new(ExportFormat::JUnit).export(&[report]).unwrap();
        assert!(!xml.chars().any(|c| c < '\u{20}' && !matches!(c, '\t' | '\n' | '\r')));
        assert!(xml.contains("a\u{FFFD}b\u{FFFD}"));
        assert!(xml.contains("ok\tdone"));
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!("junit".parse::<ExportFormat>().unwrap(), ExportFormat::JUnit);
        assert!("har".parse::<ExportFormat>().is_err());
    }
}
