use trivy_autofix::report::{FixLevel, ReportStats, Severity, TrivyReport};

fn load_fixture() -> TrivyReport {
    let json = std::fs::read_to_string("tests/fixtures/trivy-report.json").unwrap();
    TrivyReport::from_json(&json).unwrap()
}

fn ids(report: &TrivyReport) -> Vec<&str> {
    report.vulnerabilities().map(|v| v.id.as_str()).collect()
}

// ── parsing ───────────────────────────────────────────────────────────────────

#[test]
fn fixture_parses_all_targets() {
    let report = load_fixture();
    assert_eq!(report.results.len(), 3);
    assert_eq!(report.vulnerability_count(), 6);
    assert_eq!(report.results[0].target, "opt/app/requirements.txt");

    let urllib3 = &report.results[0].vulnerabilities[2];
    assert_eq!(urllib3.pkg_name, "urllib3");
    assert_eq!(urllib3.fixed_version.as_deref(), Some("1.26.17"));
    assert_eq!(urllib3.severity, Severity::High);
    assert_eq!(urllib3.nvd_v3_score(), 8.1);
}

#[test]
fn missing_nvd_score_counts_as_zero() {
    let report = load_fixture();
    let semver = report
        .vulnerabilities()
        .find(|v| v.pkg_name == "semver")
        .unwrap();
    assert_eq!(semver.nvd_v3_score(), 0.0);
    assert_eq!(semver.fixed_version, None);
}

#[test]
fn report_without_results_is_empty() {
    let report = TrivyReport::from_json(r#"{"SchemaVersion": 2, "ArtifactName": "/"}"#).unwrap();
    assert_eq!(report.vulnerability_count(), 0);

    let report = TrivyReport::from_json(r#"{"Results": [{"Target": "go.sum"}]}"#).unwrap();
    assert_eq!(report.vulnerability_count(), 0);
}

#[test]
fn invalid_json_is_an_error() {
    let err = TrivyReport::from_json("not json").unwrap_err();
    assert!(err.to_string().contains("invalid trivy report JSON"));
}

#[test]
fn unknown_fields_survive_a_round_trip() {
    let report = load_fixture();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["SchemaVersion"], 2);
    assert_eq!(json["ArtifactType"], "filesystem");
    assert_eq!(json["Results"][0]["Type"], "pip");
    assert_eq!(
        json["Results"][0]["Vulnerabilities"][0]["CVSS"]["nvd"]["V3Vector"],
        "CVSS:3.1/AV:N/AC:H/PR:N/UI:R/S:C/C:H/I:N/A:N"
    );

    let again: TrivyReport = serde_json::from_value(json).unwrap();
    assert_eq!(again, report);
}

// ── filtering ─────────────────────────────────────────────────────────────────

#[test]
fn filter_all_keeps_everything() {
    let report = load_fixture();
    assert_eq!(report.filter(FixLevel::All, None), report);
}

#[test]
fn filter_high_keeps_only_high_and_critical() {
    let filtered = load_fixture().filter(FixLevel::High, None);
    assert_eq!(
        ids(&filtered),
        ["CVE-2022-40897", "CVE-2023-43804", "CVE-2021-44906"]
    );
    assert!(filtered
        .vulnerabilities()
        .all(|v| v.severity.is_high_or_critical()));
}

#[test]
fn filter_drops_targets_left_empty() {
    let filtered = load_fixture().filter(FixLevel::High, None);
    let targets: Vec<&str> = filtered.results.iter().map(|r| r.target.as_str()).collect();
    assert_eq!(
        targets,
        ["opt/app/requirements.txt", "opt/app/package-lock.json"]
    );
    assert_eq!(filtered.extra["ArtifactName"], "/opt/app");
}

#[test]
fn top_keeps_highest_scores_per_target() {
    let filtered = load_fixture().filter(FixLevel::All, Some(2));
    assert_eq!(
        ids(&filtered),
        [
            "CVE-2023-43804", // 8.1
            "CVE-2023-32681", // 6.1
            "CVE-2021-44906", // 9.8
            "CVE-2022-25883", // no score
            "CVE-2024-0001",
        ]
    );
}

#[test]
fn top_applies_after_the_level_filter() {
    let filtered = load_fixture().filter(FixLevel::High, Some(1));
    assert_eq!(ids(&filtered), ["CVE-2023-43804", "CVE-2021-44906"]);
}

#[test]
fn top_zero_leaves_nothing() {
    let filtered = load_fixture().filter(FixLevel::All, Some(0));
    assert!(filtered.results.is_empty());
}

#[test]
fn equal_scores_keep_report_order() {
    let json = r#"{"Results": [{"Target": "t", "Vulnerabilities": [
        {"VulnerabilityID": "A", "Severity": "LOW"},
        {"VulnerabilityID": "B", "Severity": "LOW"},
        {"VulnerabilityID": "C", "Severity": "LOW", "CVSS": {"nvd": {"V3Score": 1.0}}}
    ]}]}"#;
    let filtered = TrivyReport::from_json(json).unwrap().filter(FixLevel::All, Some(3));
    assert_eq!(ids(&filtered), ["C", "A", "B"]);
}

// ── merging and stats ─────────────────────────────────────────────────────────

#[test]
fn merge_concatenates_results() {
    let a = load_fixture();
    let b = TrivyReport::from_json(
        r#"{"SchemaVersion": 2, "ArtifactName": "/etc", "Results": [{"Target": "etc/os-release", "Vulnerabilities": [{"VulnerabilityID": "CVE-1", "Severity": "HIGH"}]}]}"#,
    )
    .unwrap();

    let merged = TrivyReport::merge([a, b]);
    assert_eq!(merged.results.len(), 4);
    assert_eq!(merged.vulnerability_count(), 7);
    assert_eq!(merged.extra["ArtifactName"], "/opt/app");
}

#[test]
fn merge_of_nothing_is_empty() {
    assert_eq!(TrivyReport::merge(Vec::new()), TrivyReport::default());
}

#[test]
fn stats_count_original_and_filtered() {
    let report = load_fixture();
    let filtered = report.filter(FixLevel::High, Some(1));
    assert_eq!(
        ReportStats::new(&report, &filtered),
        ReportStats {
            total: 6,
            high_or_critical: 3,
            included: 2,
        }
    );
}

#[test]
fn severity_breakdown() {
    let counts = load_fixture().count_by_severity();
    assert_eq!(counts[&Severity::High], 2);
    assert_eq!(counts[&Severity::Critical], 1);
    assert_eq!(counts[&Severity::Unknown], 1);
    assert_eq!(counts.values().sum::<usize>(), 6);
}

#[test]
fn fix_level_includes() {
    assert!(FixLevel::All.includes(Severity::Low));
    assert!(!FixLevel::High.includes(Severity::Medium));
    assert!(FixLevel::High.includes(Severity::Critical));
}
