//! Vulnerability scanning.
//!
//! The pipeline only sees the [`VulnScanner`] trait; [`trivy::TrivyScanner`]
//! is the real implementation and tests substitute their own.

pub mod trivy;

use crate::config::ScanConfig;
use crate::error::Result;
use crate::report::{FixLevel, TrivyReport};
use std::path::{Path, PathBuf};

/// Produces a vulnerability report for a set of directories.
pub trait VulnScanner {
    /// Short identifier, e.g. `"trivy"`.
    fn name(&self) -> &'static str;

    /// Returns `true` if the scanner's binary can be found.
    fn is_available(&self) -> bool;

    /// Scans every directory in `dirs` and returns one merged report.
    ///
    /// `level` lets the scanner drop severities the caller will discard
    /// anyway.
    fn scan(&self, dirs: &[PathBuf], level: FixLevel) -> Result<TrivyReport>;
}

/// What part of the filesystem to scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanMode {
    /// `scan.full_dirs`, `/` by default.
    Full,
    /// `scan.light_dirs`, a handful of system directories.
    Light,
    /// A single user-supplied directory.
    Path(PathBuf),
}

impl ScanMode {
    pub fn dirs(&self, config: &ScanConfig) -> Vec<PathBuf> {
        match self {
            ScanMode::Full => config.full_dirs.clone(),
            ScanMode::Light => config.light_dirs.clone(),
            ScanMode::Path(p) => vec![p.clone()],
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ScanMode::Full => "full system".to_string(),
            ScanMode::Light => "light (system directories)".to_string(),
            ScanMode::Path(p) => format!("custom: {}", p.display()),
        }
    }
}

/// Returns `true` if an executable named `cmd` exists on `PATH`.
///
/// A `cmd` containing a path separator is checked directly instead. On Unix
/// the file must also have an executable permission bit set.
pub fn which_exists(cmd: &str) -> bool {
    if cmd.contains(std::path::MAIN_SEPARATOR) {
        return is_executable(Path::new(cmd));
    }
    std::env::var_os("PATH")
        .map(|path| std::env::split_paths(&path).any(|dir| is_executable(&dir.join(cmd))))
        .unwrap_or(false)
}

fn is_executable(candidate: &Path) -> bool {
    if !candidate.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::metadata(candidate)
            .map(|m| m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        true
    }
}

/// Returns `true` when the current process runs as root.
pub fn running_as_root() -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        if let Ok(meta) = std::fs::metadata("/proc/self") {
            return meta.uid() == 0;
        }
    }
    std::env::var("USER").is_ok_and(|u| u == "root")
}
