//! JSON output formatter.

use super::ClassificationReport;

#[derive(serde::Serialize)]
struct JsonOutput<'a> {
    #[serde(flatten)]
    report: &'a ClassificationReport,
    summary: Summary,
}

#[derive(serde::Serialize)]
struct Summary {
    lines: usize,
    gated: usize,
    passed_through: usize,
}

/// Formats a [`ClassificationReport`] as pretty-printed JSON with a summary
/// object.
///
/// # Panics
///
/// Panics if the report cannot be serialized (should not happen with valid data).
pub fn format(report: &ClassificationReport) -> String {
    let output = JsonOutput {
        report,
        summary: Summary {
            lines: report.lines.len(),
            gated: report.gated,
            passed_through: report.lines.len() - report.gated,
        },
    };

    serde_json::to_string_pretty(&output).expect("JSON serialization failed")
}
