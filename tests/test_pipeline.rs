use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};

use trivy_autofix::config::Config;
use trivy_autofix::llm::ScriptGenerator;
use trivy_autofix::remediate::{self, FixOptions, Outcome};
use trivy_autofix::report::{FixLevel, Severity, TrivyReport};
use trivy_autofix::scanner::{ScanMode, VulnScanner};
use trivy_autofix::{Error, Result};

const REPLY: &str = "```bash\napt-get update\npip3 install --upgrade urllib3==1.26.17\necho done\n```";

struct FakeScanner {
    report: TrivyReport,
    calls: RefCell<Vec<(Vec<PathBuf>, FixLevel)>>,
}

impl FakeScanner {
    fn new(report: TrivyReport) -> Self {
        FakeScanner {
            report,
            calls: RefCell::new(Vec::new()),
        }
    }

    fn fixture() -> Self {
        let json = std::fs::read_to_string("tests/fixtures/trivy-report.json").unwrap();
        FakeScanner::new(TrivyReport::from_json(&json).unwrap())
    }
}

impl VulnScanner for FakeScanner {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn scan(&self, dirs: &[PathBuf], level: FixLevel) -> Result<TrivyReport> {
        self.calls.borrow_mut().push((dirs.to_vec(), level));
        Ok(self.report.clone())
    }
}

struct FakeGenerator {
    reply: std::result::Result<String, u16>,
    prompts: RefCell<Vec<String>>,
}

impl FakeGenerator {
    fn replying(text: &str) -> Self {
        FakeGenerator {
            reply: Ok(text.to_string()),
            prompts: RefCell::new(Vec::new()),
        }
    }

    fn failing(status: u16) -> Self {
        FakeGenerator {
            reply: Err(status),
            prompts: RefCell::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.prompts.borrow().len()
    }
}

impl ScriptGenerator for FakeGenerator {
    fn provider(&self) -> &'static str {
        "fake"
    }

    fn model(&self) -> &str {
        "fake-1"
    }

    fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.borrow_mut().push(prompt.to_string());
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(status) => Err(Error::Api {
                provider: "fake".to_string(),
                status: *status,
                body: "rate limited".to_string(),
            }),
        }
    }
}

fn options(dir: &Path) -> FixOptions {
    FixOptions {
        mode: ScanMode::Path(PathBuf::from("/opt/app")),
        level: FixLevel::All,
        top_cves: None,
        dry_run: false,
        output_dir: dir.to_path_buf(),
    }
}

fn files_with_extension(dir: &Path, ext: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.extension().is_some_and(|e| e == ext))
        .collect();
    files.sort();
    files
}

// ── early exits ───────────────────────────────────────────────────────────────

#[test]
fn clean_scan_stops_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let scanner = FakeScanner::new(TrivyReport::default());
    let generator = FakeGenerator::replying(REPLY);

    let outcome = remediate::run(&options(dir.path()), &Config::default(), &scanner, &generator, |_| {
        panic!("approval must not be requested")
    })
    .unwrap();

    assert!(matches!(outcome, Outcome::Clean));
    assert_eq!(generator.calls(), 0);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn nothing_at_selected_level() {
    let dir = tempfile::tempdir().unwrap();
    let report = TrivyReport::from_json(
        r#"{"Results": [{"Target": "t", "Vulnerabilities": [{"VulnerabilityID": "CVE-1", "Severity": "LOW"}]}]}"#,
    )
    .unwrap();
    let scanner = FakeScanner::new(report);
    let generator = FakeGenerator::replying(REPLY);
    let opts = FixOptions {
        level: FixLevel::High,
        ..options(dir.path())
    };

    let outcome = remediate::run(&opts, &Config::default(), &scanner, &generator, |_| true).unwrap();

    match outcome {
        Outcome::NothingToFix { stats } => {
            assert_eq!(stats.total, 1);
            assert_eq!(stats.included, 0);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(generator.calls(), 0);
}

#[test]
fn declined_approval_keeps_report_but_writes_no_script() {
    let dir = tempfile::tempdir().unwrap();
    let scanner = FakeScanner::fixture();
    let generator = FakeGenerator::replying(REPLY);

    let outcome =
        remediate::run(&options(dir.path()), &Config::default(), &scanner, &generator, |_| false)
            .unwrap();

    let Outcome::Aborted { stats, report } = outcome else {
        panic!("expected Aborted");
    };
    assert_eq!(stats.included, 6);
    assert!(report.is_file());
    assert_eq!(generator.calls(), 0);
    assert!(files_with_extension(dir.path(), "sh").is_empty());
}

#[test]
fn oversized_request_never_reaches_generator() {
    let dir = tempfile::tempdir().unwrap();
    let scanner = FakeScanner::fixture();
    let generator = FakeGenerator::replying(REPLY);
    let mut config = Config::default();
    config.llm.max_input_tokens = 100;

    let err = remediate::run(&options(dir.path()), &config, &scanner, &generator, |_| {
        panic!("approval must not be requested")
    })
    .unwrap_err();

    match err {
        Error::RequestTooLarge { tokens, limit } => {
            assert!(tokens > 100);
            assert_eq!(limit, 100);
        }
        other => panic!("unexpected error {other}"),
    }
    assert_eq!(generator.calls(), 0);
}

#[test]
fn generator_failure_propagates() {
    let dir = tempfile::tempdir().unwrap();
    let scanner = FakeScanner::fixture();
    let generator = FakeGenerator::failing(429);

    let err = remediate::run(&options(dir.path()), &Config::default(), &scanner, &generator, |_| true)
        .unwrap_err();

    assert!(matches!(err, Error::Api { status: 429, .. }));
    assert!(files_with_extension(dir.path(), "sh").is_empty());
}

// ── full runs ─────────────────────────────────────────────────────────────────

#[test]
fn scanner_receives_mode_dirs_and_level() {
    let dir = tempfile::tempdir().unwrap();
    let scanner = FakeScanner::fixture();
    let generator = FakeGenerator::replying(REPLY);
    let opts = FixOptions {
        level: FixLevel::High,
        ..options(dir.path())
    };

    remediate::run(&opts, &Config::default(), &scanner, &generator, |_| true).unwrap();

    let calls = scanner.calls.borrow();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, [PathBuf::from("/opt/app")]);
    assert_eq!(calls[0].1, FixLevel::High);
}

#[test]
fn approval_sees_estimate() {
    let dir = tempfile::tempdir().unwrap();
    let scanner = FakeScanner::fixture();
    let generator = FakeGenerator::replying(REPLY);
    let opts = FixOptions {
        top_cves: Some(1),
        ..options(dir.path())
    };
    let seen = Cell::new(None);

    remediate::run(&opts, &Config::default(), &scanner, &generator, |estimate| {
        seen.set(Some((estimate.stats, estimate.tokens, estimate.limit)));
        assert_eq!(estimate.provider, "fake");
        assert_eq!(estimate.model, "fake-1");
        let by_severity: Vec<(Severity, usize)> =
            estimate.by_severity.iter().map(|(s, n)| (*s, *n)).collect();
        assert_eq!(
            by_severity,
            [
                (Severity::Unknown, 1),
                (Severity::High, 1),
                (Severity::Critical, 1)
            ]
        );
        let expected = (estimate.tokens as f64 * 0.10 + 1500.0 * 0.40) / 1_000_000.0;
        assert!((estimate.cost_usd - expected).abs() < 1e-12);
        true
    })
    .unwrap();

    let (stats, tokens, limit) = seen.get().unwrap();
    assert_eq!(stats.total, 6);
    assert_eq!(stats.high_or_critical, 3);
    assert_eq!(stats.included, 3);
    assert!(tokens > 0);
    assert_eq!(limit, 28_000);
}

#[test]
fn prompt_contains_only_filtered_report() {
    let dir = tempfile::tempdir().unwrap();
    let scanner = FakeScanner::fixture();
    let generator = FakeGenerator::replying(REPLY);
    let opts = FixOptions {
        level: FixLevel::High,
        ..options(dir.path())
    };

    remediate::run(&opts, &Config::default(), &scanner, &generator, |_| true).unwrap();

    let prompts = generator.prompts.borrow();
    assert!(prompts[0].contains("CVE-2021-44906"));
    assert!(!prompts[0].contains("CVE-2022-25883"));
}

#[test]
fn written_script_is_unfenced_and_has_shebang() {
    let dir = tempfile::tempdir().unwrap();
    let scanner = FakeScanner::fixture();
    let generator = FakeGenerator::replying(REPLY);

    let outcome =
        remediate::run(&options(dir.path()), &Config::default(), &scanner, &generator, |_| true)
            .unwrap();

    let Outcome::Written(artifacts) = outcome else {
        panic!("expected Written");
    };
    assert_eq!(artifacts.gated, None);
    assert_eq!(
        std::fs::read_to_string(&artifacts.script).unwrap(),
        "#!/bin/bash\napt-get update\npip3 install --upgrade urllib3==1.26.17\necho done\n"
    );

    assert_eq!(
        artifacts.run_command(),
        format!("sudo {}", artifacts.script.display())
    );

    let name = artifacts.script.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("fix_trivy_issues_"), "{name}");
    let report_name = artifacts.report.file_name().unwrap().to_string_lossy().to_string();
    assert!(report_name.starts_with("trivy_report_"), "{report_name}");

    let saved: TrivyReport =
        serde_json::from_str(&std::fs::read_to_string(&artifacts.report).unwrap()).unwrap();
    assert_eq!(saved.vulnerability_count(), 6);
}

#[cfg(unix)]
#[test]
fn written_script_is_executable_and_linked() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let scanner = FakeScanner::fixture();
    let generator = FakeGenerator::replying(REPLY);

    let outcome =
        remediate::run(&options(dir.path()), &Config::default(), &scanner, &generator, |_| true)
            .unwrap();
    let Outcome::Written(artifacts) = outcome else {
        panic!("expected Written");
    };

    let mode = std::fs::metadata(&artifacts.script).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o755);

    let latest = artifacts.latest.unwrap();
    assert_eq!(latest, dir.path().join("fix_trivy_issues_latest.sh"));
    assert_eq!(std::fs::read_link(&latest).unwrap(), artifacts.script);
}

#[test]
fn latest_link_can_be_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let scanner = FakeScanner::fixture();
    let generator = FakeGenerator::replying(REPLY);
    let mut config = Config::default();
    config.output.latest_symlink = false;

    let outcome = remediate::run(&options(dir.path()), &config, &scanner, &generator, |_| true).unwrap();
    let Outcome::Written(artifacts) = outcome else {
        panic!("expected Written");
    };
    assert_eq!(artifacts.latest, None);
    assert!(!dir.path().join("fix_trivy_issues_latest.sh").exists());
}

#[test]
fn dry_run_gates_generated_commands() {
    let dir = tempfile::tempdir().unwrap();
    let scanner = FakeScanner::fixture();
    let generator = FakeGenerator::replying(REPLY);
    let opts = FixOptions {
        dry_run: true,
        ..options(dir.path())
    };

    let outcome = remediate::run(&opts, &Config::default(), &scanner, &generator, |_| true).unwrap();
    let Outcome::Written(artifacts) = outcome else {
        panic!("expected Written");
    };

    assert_eq!(artifacts.gated, Some(2));
    let script = std::fs::read_to_string(&artifacts.script).unwrap();
    assert!(script.starts_with("#!/bin/bash\nread -r -p \"[DRY-RUN] Execute: apt-get update? [y/N] \" confirm\n"));
    assert!(script.contains("\n    pip3 install --upgrade urllib3==1.26.17\nfi\n"));
    assert!(script.ends_with("fi\necho done\n"));
}

#[test]
fn dry_run_replaces_sh_shebang_with_bash() {
    let dir = tempfile::tempdir().unwrap();
    let scanner = FakeScanner::fixture();
    let generator = FakeGenerator::replying("#!/bin/sh\napt-get update\n");
    let opts = FixOptions {
        dry_run: true,
        ..options(dir.path())
    };

    let outcome = remediate::run(&opts, &Config::default(), &scanner, &generator, |_| true).unwrap();
    let Outcome::Written(artifacts) = outcome else {
        panic!("expected Written");
    };
    let script = std::fs::read_to_string(&artifacts.script).unwrap();
    assert!(script.starts_with("#!/bin/bash\nread -r -p "), "{script}");
    assert!(!script.contains("#!/bin/sh"));
}

#[test]
fn sh_shebang_is_kept_without_dry_run() {
    let dir = tempfile::tempdir().unwrap();
    let scanner = FakeScanner::fixture();
    let generator = FakeGenerator::replying("#!/bin/sh\napt-get update\n");

    let outcome =
        remediate::run(&options(dir.path()), &Config::default(), &scanner, &generator, |_| true)
            .unwrap();
    let Outcome::Written(artifacts) = outcome else {
        panic!("expected Written");
    };
    let script = std::fs::read_to_string(&artifacts.script).unwrap();
    assert_eq!(script, "#!/bin/sh\napt-get update\n");
}

#[test]
fn dry_run_respects_gate_config() {
    let dir = tempfile::tempdir().unwrap();
    let scanner = FakeScanner::fixture();
    let generator = FakeGenerator::replying(REPLY);
    let config = Config::from_toml("[gate]\ncommands = [\"pip\"]\n").unwrap();
    let opts = FixOptions {
        dry_run: true,
        ..options(dir.path())
    };

    let outcome = remediate::run(&opts, &config, &scanner, &generator, |_| true).unwrap();
    let Outcome::Written(artifacts) = outcome else {
        panic!("expected Written");
    };
    assert_eq!(artifacts.gated, Some(1));
}
