//! Human-readable colored text formatter.

use super::ClassificationReport;
use crate::dryrun::LineClassification;
use colored::Colorize;

/// Formats a [`ClassificationReport`] as ANSI-colored text: a header, one
/// row per line, and a one-line summary.
pub fn format(report: &ClassificationReport) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "\n{}\n\n",
        format!("  Dry-run classification: {}  ", report.script)
            .bold()
            .on_blue()
            .white()
    ));

    for entry in &report.lines {
        let tag = match entry.classification {
            LineClassification::AtomicCommand { .. } => " GATE".red().bold().to_string(),
            LineClassification::Blank => "     ".to_string(),
            LineClassification::Comment => "  REM".dimmed().to_string(),
            LineClassification::PlainStatement => " PASS".green().to_string(),
            _ => " KEEP".yellow().to_string(),
        };

        out.push_str(&format!(
            "  {num:>4} [{tag}] {text}\n",
            num = entry.line.to_string().dimmed(),
            text = entry.text,
        ));
        let detail = entry.classification.detail();
        if !detail.is_empty() && !matches!(entry.classification, LineClassification::Comment) {
            out.push_str(&format!("              {}\n", detail.dimmed()));
        }
    }
    out.push('\n');

    out.push_str(&format!(
        "Result: {} of {} lines gated\n",
        report.gated.to_string().bold(),
        report.lines.len(),
    ));

    out
}
