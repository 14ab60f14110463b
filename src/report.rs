//! Trivy JSON report model and the filtering applied before it is sent off.
//!
//! Only the fields this crate reads are typed. Everything else Trivy emits is
//! kept in `extra` maps so that a filtered report serializes back with all of
//! its original detail.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Severity {
    #[default]
    Unknown,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Unknown,
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Unknown => "UNKNOWN",
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }

    /// Parses Trivy's upper-case names; anything unrecognized is `Unknown`.
    pub fn parse(s: &str) -> Severity {
        match s.to_ascii_uppercase().as_str() {
            "LOW" => Severity::Low,
            "MEDIUM" => Severity::Medium,
            "HIGH" => Severity::High,
            "CRITICAL" => Severity::Critical,
            _ => Severity::Unknown,
        }
    }

    pub fn is_high_or_critical(&self) -> bool {
        *self >= Severity::High
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl serde::Serialize for Severity {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for Severity {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Severity::parse(&s))
    }
}

/// Which vulnerabilities the remediation should cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum FixLevel {
    /// Every severity.
    #[default]
    All,
    /// HIGH and CRITICAL only.
    High,
}

impl FixLevel {
    pub fn includes(&self, severity: Severity) -> bool {
        match self {
            FixLevel::All => true,
            FixLevel::High => severity.is_high_or_critical(),
        }
    }

    /// Value for trivy's `--severity` flag.
    pub fn severity_arg(&self) -> String {
        Severity::ALL
            .iter()
            .filter(|s| self.includes(**s))
            .map(Severity::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CvssScore {
    #[serde(rename = "V3Score", default, skip_serializing_if = "Option::is_none")]
    pub v3_score: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Vulnerability {
    #[serde(rename = "VulnerabilityID", default)]
    pub id: String,
    #[serde(rename = "PkgName", default)]
    pub pkg_name: String,
    #[serde(rename = "InstalledVersion", default)]
    pub installed_version: String,
    #[serde(rename = "FixedVersion", default, skip_serializing_if = "Option::is_none")]
    pub fixed_version: Option<String>,
    #[serde(rename = "Severity", default)]
    pub severity: Severity,
    #[serde(rename = "Title", default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "CVSS", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cvss: BTreeMap<String, CvssScore>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Vulnerability {
    /// NVD CVSS v3 base score, `0.0` when absent.
    pub fn nvd_v3_score(&self) -> f64 {
        self.cvss
            .get("nvd")
            .and_then(|c| c.v3_score)
            .unwrap_or(0.0)
    }
}

/// One entry of the report's `Results` array.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ScanTarget {
    #[serde(rename = "Target", default)]
    pub target: String,
    #[serde(rename = "Vulnerabilities", default)]
    pub vulnerabilities: Vec<Vulnerability>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrivyReport {
    #[serde(rename = "Results", default)]
    pub results: Vec<ScanTarget>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TrivyReport {
    pub fn from_json(json: &str) -> crate::Result<TrivyReport> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn vulnerabilities(&self) -> impl Iterator<Item = &Vulnerability> {
        self.results.iter().flat_map(|r| r.vulnerabilities.iter())
    }

    pub fn vulnerability_count(&self) -> usize {
        self.results.iter().map(|r| r.vulnerabilities.len()).sum()
    }

    /// Concatenates the `Results` of several reports.
    ///
    /// Top-level fields other than `Results` are taken from the first report.
    pub fn merge(reports: impl IntoIterator<Item = TrivyReport>) -> TrivyReport {
        let mut merged = TrivyReport::default();
        for (i, report) in reports.into_iter().enumerate() {
            if i == 0 {
                merged.extra = report.extra;
            }
            merged.results.extend(report.results);
        }
        merged
    }

    /// Narrows the report to what the remediation should cover.
    ///
    /// Per target: keep only severities included by `level`; with
    /// `top = Some(n)`, keep the `n` vulnerabilities with the highest NVD v3
    /// score. Targets left without vulnerabilities are dropped.
    pub fn filter(&self, level: FixLevel, top: Option<usize>) -> TrivyReport {
        let results = self
            .results
            .iter()
            .filter_map(|result| {
                let mut vulns: Vec<Vulnerability> = result
                    .vulnerabilities
                    .iter()
                    .filter(|v| level.includes(v.severity))
                    .cloned()
                    .collect();
                if let Some(n) = top {
                    vulns.sort_by(|a, b| b.nvd_v3_score().total_cmp(&a.nvd_v3_score()));
                    vulns.truncate(n);
                }
                if vulns.is_empty() {
                    return None;
                }
                Some(ScanTarget {
                    target: result.target.clone(),
                    vulnerabilities: vulns,
                    extra: result.extra.clone(),
                })
            })
            .collect();

        TrivyReport {
            results,
            extra: self.extra.clone(),
        }
    }

    /// Severity breakdown, counted in a single pass.
    pub fn count_by_severity(&self) -> BTreeMap<Severity, usize> {
        self.vulnerabilities().fold(BTreeMap::new(), |mut acc, v| {
            *acc.entry(v.severity).or_insert(0) += 1;
            acc
        })
    }
}

/// Counts shown before the generator is called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ReportStats {
    pub total: usize,
    pub high_or_critical: usize,
    pub included: usize,
}

impl ReportStats {
    pub fn new(original: &TrivyReport, filtered: &TrivyReport) -> Self {
        ReportStats {
            total: original.vulnerability_count(),
            high_or_critical: original
                .vulnerabilities()
                .filter(|v| v.severity.is_high_or_critical())
                .count(),
            included: filtered.vulnerability_count(),
        }
    }
}
