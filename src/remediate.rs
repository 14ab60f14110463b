//! Scan → filter → generate → wrap → write.
//!
//! [`run`] is the only entry point. Everything it needs arrives as
//! arguments: the [`Config`], the per-run [`FixOptions`], and the two
//! collaborators behind the [`VulnScanner`] and [`ScriptGenerator`] seams.

use crate::config::Config;
use crate::dryrun::Classifier;
use crate::error::{Error, Result};
use crate::llm::{self, ScriptGenerator};
use crate::report::{FixLevel, ReportStats, Severity};
use crate::scanner::{ScanMode, VulnScanner};
use crate::script::{self, ArtifactPaths};
use chrono::Local;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

/// Per-run choices, usually taken from the command line.
#[derive(Debug, Clone)]
pub struct FixOptions {
    pub mode: ScanMode,
    pub level: FixLevel,
    /// Keep at most this many vulnerabilities per target, highest score first.
    pub top_cves: Option<usize>,
    /// Gate the script's commands behind confirmations.
    pub dry_run: bool,
    pub output_dir: PathBuf,
}

/// What the caller is asked to approve before the generator is called.
#[derive(Debug, Clone)]
pub struct Estimate {
    pub stats: ReportStats,
    /// Vulnerabilities in the request, per severity.
    pub by_severity: BTreeMap<Severity, usize>,
    pub tokens: usize,
    pub limit: usize,
    /// Upper bound in USD, assuming a reply of `llm.max_tokens`.
    pub cost_usd: f64,
    pub provider: &'static str,
    pub model: String,
}

/// Files produced by a completed run.
#[derive(Debug, Clone)]
pub struct Artifacts {
    pub stats: ReportStats,
    pub report: PathBuf,
    pub script: PathBuf,
    /// The latest-script symlink, when it was updated.
    pub latest: Option<PathBuf>,
    /// Number of gated commands; `None` without dry-run.
    pub gated: Option<usize>,
}

impl Artifacts {
    /// The command that runs the script.
    pub fn run_command(&self) -> String {
        format!("sudo {}", self.script.display())
    }
}

#[derive(Debug, Clone)]
pub enum Outcome {
    /// The scan found no vulnerabilities at all.
    Clean,
    /// Vulnerabilities exist but none survived the level filter.
    NothingToFix { stats: ReportStats },
    /// The caller declined the generation request.
    Aborted { stats: ReportStats, report: PathBuf },
    Written(Artifacts),
}

/// Runs the whole remediation flow once.
///
/// `approve` sees the token estimate and decides whether the report is sent
/// to the generator; returning `false` stops the run after the report has
/// been saved.
///
/// # Errors
///
/// Propagates scanner, generator and filesystem failures, and refuses with
/// [`Error::RequestTooLarge`] when the estimate exceeds
/// `config.llm.max_input_tokens`.
pub fn run(
    options: &FixOptions,
    config: &Config,
    scanner: &dyn VulnScanner,
    generator: &dyn ScriptGenerator,
    approve: impl FnOnce(&Estimate) -> bool,
) -> Result<Outcome> {
    let dirs = options.mode.dirs(&config.scan);
    info!(
        "running {} scan with {} over {} director(ies)",
        options.mode.describe(),
        scanner.name(),
        dirs.len()
    );
    let report = scanner.scan(&dirs, options.level)?;
    if report.vulnerability_count() == 0 {
        return Ok(Outcome::Clean);
    }

    let filtered = report.filter(options.level, options.top_cves);
    let stats = ReportStats::new(&report, &filtered);
    info!(
        "{} vulnerabilities found, {} HIGH or CRITICAL, {} included",
        stats.total, stats.high_or_critical, stats.included
    );
    if stats.included == 0 {
        return Ok(Outcome::NothingToFix { stats });
    }

    let paths = ArtifactPaths::new(&options.output_dir, Local::now());
    script::write_report(&paths.report, &filtered)?;

    let prompt = llm::build_prompt(&serde_json::to_string(&filtered)?);
    let tokens = llm::estimate_tokens(&prompt);
    let limit = config.llm.max_input_tokens;
    if tokens > limit {
        return Err(Error::RequestTooLarge { tokens, limit });
    }

    let estimate = Estimate {
        stats,
        by_severity: filtered.count_by_severity(),
        tokens,
        limit,
        cost_usd: llm::estimate_cost(
            tokens,
            config.llm.max_tokens,
            config.llm.input_cost_per_mtok,
            config.llm.output_cost_per_mtok,
        ),
        provider: generator.provider(),
        model: generator.model().to_string(),
    };
    if !approve(&estimate) {
        info!("generation declined");
        return Ok(Outcome::Aborted {
            stats,
            report: paths.report,
        });
    }

    info!(
        "requesting script from {} ({})",
        generator.provider(),
        generator.model()
    );
    let mut fix_script = llm::strip_code_fence(&generator.generate(&prompt)?);

    let mut gated = None;
    if options.dry_run {
        let wrapped = Classifier::from_config(&config.gate).wrap(&fix_script);
        info!("dry-run: gated {} command(s)", wrapped.gated());
        gated = Some(wrapped.gated());
        fix_script = wrapped.to_string();
        if wrapped.gated() > 0 {
            fix_script = script::ensure_bash_shebang(&fix_script);
        }
    }

    script::write_script(&paths.script, &fix_script)?;
    let latest = (config.output.latest_symlink
        && script::update_latest_link(&paths.latest, &paths.script))
    .then_some(paths.latest);

    Ok(Outcome::Written(Artifacts {
        stats,
        report: paths.report,
        script: paths.script,
        latest,
        gated,
    }))
}
