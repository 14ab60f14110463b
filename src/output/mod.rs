//! Output formatting for the `classify` command.
//!
//! | Format | Module | Use case |
//! |--------|--------|----------|
//! | [`Pretty`](OutputFormat::Pretty) | [`pretty`] | Terminal / human review |
//! | [`Json`](OutputFormat::Json)     | [`json`]   | Automation / scripting  |

pub mod json;
pub mod pretty;

use crate::dryrun::{Classifier, LineClassification};

/// Supported output formats.
#[derive(Debug, Clone, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable colored text.
    Pretty,
    /// Machine-readable JSON.
    Json,
}

/// Every line of a script with its verdict.
#[derive(Debug, serde::Serialize)]
pub struct ClassificationReport {
    pub script: String,
    pub gated: usize,
    pub lines: Vec<ClassifiedLine>,
}

#[derive(Debug, serde::Serialize)]
pub struct ClassifiedLine {
    /// 1-based line number.
    pub line: usize,
    pub text: String,
    pub classification: LineClassification,
}

impl ClassificationReport {
    pub fn new(name: &str, content: &str, classifier: &Classifier) -> Self {
        let lines: Vec<ClassifiedLine> = classifier
            .classify_script(content)
            .into_iter()
            .enumerate()
            .map(|(i, (line, classification))| ClassifiedLine {
                line: i + 1,
                text: line.raw.to_string(),
                classification,
            })
            .collect();
        let gated = lines.iter().filter(|l| l.classification.is_gated()).count();
        ClassificationReport {
            script: name.to_string(),
            gated,
            lines,
        }
    }
}

/// Formats a [`ClassificationReport`] in the requested [`OutputFormat`].
pub fn format_report(report: &ClassificationReport, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Pretty => pretty::format(report),
        OutputFormat::Json => json::format(report),
    }
}
