//! Filesystem scanning via [Trivy](https://trivy.dev/).
//!
//! # How it works
//!
//! 1. When configured to, and not already root, refreshes `sudo`
//!    credentials up front so the password prompt is not lost behind
//!    captured output.
//! 2. For each directory runs
//!    `[sudo] trivy fs <dir> --scanners vuln --format json --output <tmp>`
//!    with the severity list, timeout and skip list from config.
//! 3. Parses each temp file and merges the `Results` arrays.
//!
//! Directories are scanned one after another; concurrent Trivy processes
//! contend for the same cache lock.

use crate::config::ScanConfig;
use crate::error::{Error, Result};
use crate::report::{FixLevel, TrivyReport};
use crate::scanner::{running_as_root, which_exists, VulnScanner};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;
use tracing::{debug, info, warn};

pub struct TrivyScanner {
    config: ScanConfig,
}

impl TrivyScanner {
    pub fn new(config: ScanConfig) -> Self {
        TrivyScanner { config }
    }

    fn use_sudo(&self) -> bool {
        self.config.sudo && !running_as_root() && which_exists("sudo")
    }

    /// Arguments passed to trivy for one directory, excluding the binary.
    pub fn command_args(&self, dir: &Path, level: FixLevel, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "fs".into(),
            dir.into(),
            "--scanners".into(),
            "vuln".into(),
            "--format".into(),
            "json".into(),
            "--output".into(),
            output.into(),
            "--severity".into(),
            level.severity_arg().into(),
            "--timeout".into(),
            self.config.timeout.clone().into(),
        ];
        if !self.config.skip_dirs.is_empty() {
            let skip = self
                .config
                .skip_dirs
                .iter()
                .map(|d| d.to_string_lossy())
                .collect::<Vec<_>>()
                .join(",");
            args.push("--skip-dirs".into());
            args.push(skip.into());
        }
        args
    }

    fn build_command(&self, dir: &Path, level: FixLevel, output: &Path) -> Command {
        let args = self.command_args(dir, level, output);
        if self.use_sudo() {
            let mut cmd = Command::new("sudo");
            cmd.arg(&self.config.trivy).args(args);
            cmd
        } else {
            let mut cmd = Command::new(&self.config.trivy);
            cmd.args(args);
            cmd
        }
    }

    fn refresh_sudo(&self) -> Result<()> {
        let status = Command::new("sudo")
            .arg("-v")
            .status()
            .map_err(|e| Error::io("failed to run", "sudo", e))?;
        if status.success() {
            Ok(())
        } else {
            Err(Error::SudoFailed)
        }
    }

    fn scan_dir(&self, dir: &Path, level: FixLevel) -> Result<Option<TrivyReport>> {
        let tmp = tempfile::Builder::new()
            .prefix("trivy-autofix-")
            .suffix(".json")
            .tempfile()
            .map_err(|e| Error::io("failed to create temp file in", std::env::temp_dir(), e))?;

        let mut cmd = self.build_command(dir, level, tmp.path());
        debug!("running {:?}", cmd);

        let start = Instant::now();
        let output = cmd
            .output()
            .map_err(|e| Error::io("failed to run", &self.config.trivy, e))?;

        if !output.status.success() {
            return Err(Error::Scan {
                dir: dir.display().to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        info!(
            "scanned {} in {} ms",
            dir.display(),
            start.elapsed().as_millis()
        );

        let content = std::fs::read_to_string(tmp.path())
            .map_err(|e| Error::io("failed to read trivy output", tmp.path(), e))?;
        match TrivyReport::from_json(&content) {
            Ok(report) => Ok(Some(report)),
            Err(e) => {
                warn!("failed to parse scan result from {}: {e}", dir.display());
                Ok(None)
            }
        }
    }
}

impl VulnScanner for TrivyScanner {
    fn name(&self) -> &'static str {
        "trivy"
    }

    fn is_available(&self) -> bool {
        which_exists(&self.config.trivy)
    }

    fn scan(&self, dirs: &[PathBuf], level: FixLevel) -> Result<TrivyReport> {
        if !self.is_available() {
            return Err(Error::ToolMissing(self.config.trivy.clone()));
        }
        if self.use_sudo() {
            self.refresh_sudo()?;
        }

        let mut reports = Vec::with_capacity(dirs.len());
        for dir in dirs {
            info!("scanning {}", dir.display());
            if let Some(report) = self.scan_dir(dir, level)? {
                reports.push(report);
            }
        }
        Ok(TrivyReport::merge(reports))
    }
}
