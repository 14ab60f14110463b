//! Persisting the filtered report and the generated script.

use crate::error::{Error, Result};
use crate::report::TrivyReport;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Shebang prepended to scripts that lack one.
pub const DEFAULT_SHEBANG: &str = "#!/bin/bash";

/// Name of the symlink pointing at the newest script.
pub const LATEST_LINK: &str = "fix_trivy_issues_latest.sh";

/// Timestamped file names for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub report: PathBuf,
    pub script: PathBuf,
    pub latest: PathBuf,
}

impl ArtifactPaths {
    pub fn new(dir: &Path, at: DateTime<Local>) -> Self {
        let stamp = at.format("%Y-%m-%d_%H-%M-%S");
        ArtifactPaths {
            report: dir.join(format!("trivy_report_{stamp}.json")),
            script: dir.join(format!("fix_trivy_issues_{stamp}.sh")),
            latest: dir.join(LATEST_LINK),
        }
    }
}

/// Prepends [`DEFAULT_SHEBANG`] unless `script` already starts with `#!`.
pub fn ensure_shebang(script: &str) -> String {
    if script.starts_with("#!") {
        script.to_string()
    } else {
        format!("{DEFAULT_SHEBANG}\n{script}")
    }
}

/// Makes `script` start with a shebang that runs it under bash.
///
/// Confirmation gates use `read -p` and `[[ ]]`, which a POSIX `sh` such as
/// dash does not understand. A missing shebang gets [`DEFAULT_SHEBANG`]; one
/// naming another interpreter is replaced by it.
pub fn ensure_bash_shebang(script: &str) -> String {
    if !script.starts_with("#!") {
        return format!("{DEFAULT_SHEBANG}\n{script}");
    }
    let first = script.lines().next().unwrap_or_default();
    if is_bash_shebang(first) {
        return script.to_string();
    }
    warn!("replacing `{first}` with `{DEFAULT_SHEBANG}`: confirmation gates need bash");
    format!("{DEFAULT_SHEBANG}{}", &script[first.len()..])
}

/// `#!/bin/bash`, `#!/usr/local/bin/bash -e` and `#!/usr/bin/env bash` all
/// qualify.
fn is_bash_shebang(line: &str) -> bool {
    let mut words = line.trim_start_matches("#!").split_whitespace();
    let program = |word: &str| word.rsplit('/').next() == Some("bash");
    match words.next() {
        Some(word) if word.rsplit('/').next() == Some("env") => {
            words.find(|w| !w.starts_with('-')).is_some_and(program)
        }
        Some(word) => program(word),
        None => false,
    }
}

/// Writes the report as pretty JSON.
pub fn write_report(path: &Path, report: &TrivyReport) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::io("failed to create directory", parent, e))?;
    }
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json).map_err(|e| Error::io("failed to write report", path, e))?;
    info!("report saved to {}", path.display());
    Ok(())
}

/// Writes an executable script, adding a shebang when it is missing.
pub fn write_script(path: &Path, script: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::io("failed to create directory", parent, e))?;
    }
    let mut content = ensure_shebang(script);
    if !content.ends_with('\n') {
        content.push('\n');
    }
    std::fs::write(path, content).map_err(|e| Error::io("failed to write script", path, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
            .map_err(|e| Error::io("failed to chmod", path, e))?;
    }

    info!("fix script written to {}", path.display());
    Ok(())
}

/// Points `link` at `target`, replacing whatever `link` was.
///
/// Failures are logged and reported as `false`; a missing symlink never
/// fails the run.
pub fn update_latest_link(link: &Path, target: &Path) -> bool {
    if link.symlink_metadata().is_ok() {
        if let Err(e) = std::fs::remove_file(link) {
            warn!("failed to remove {}: {e}", link.display());
            return false;
        }
    }

    #[cfg(unix)]
    let linked = std::os::unix::fs::symlink(target, link);
    #[cfg(not(unix))]
    let linked = std::fs::copy(target, link).map(|_| ());

    match linked {
        Ok(()) => {
            info!("symlink updated at {}", link.display());
            true
        }
        Err(e) => {
            warn!("failed to create symlink {}: {e}", link.display());
            false
        }
    }
}
