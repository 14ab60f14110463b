//! Configuration loading.
//!
//! The default configuration file is `trivy-autofix.toml` in the current
//! working directory. Every field has a default, so the file can be omitted
//! entirely:
//!
//! ```rust,no_run
//! use trivy_autofix::config::Config;
//!
//! let config = Config::load(None).expect("failed to load config");
//! assert_eq!(config.llm.max_input_tokens, 28_000);
//! ```
//!
//! API keys are never stored here directly; [`LlmConfig`] only names the
//! environment variable or file to read them from.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// File name looked up in the current directory by [`Config::load`].
pub const DEFAULT_CONFIG_FILE: &str = "trivy-autofix.toml";

/// Top-level configuration, passed explicitly into the remediation pipeline.
#[derive(Debug, Clone, Default, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct Config {
    pub scan: ScanConfig,
    pub llm: LlmConfig,
    pub output: OutputConfig,
    pub gate: GateConfig,
}

/// How `trivy` is invoked.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Trivy binary name or path.
    pub trivy: String,
    /// Run trivy through `sudo` when not already root.
    pub sudo: bool,
    /// Passed through to `--timeout`.
    pub timeout: String,
    /// Directories scanned one by one in light mode.
    pub light_dirs: Vec<PathBuf>,
    /// Directories scanned in full mode.
    pub full_dirs: Vec<PathBuf>,
    /// Passed through to `--skip-dirs`.
    pub skip_dirs: Vec<PathBuf>,
}

/// Hosted model used to write the remediation script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[value(name = "openai")]
    OpenAi,
    Gemini,
}

impl Provider {
    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Gemini => "gemini",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::OpenAi => "gpt-4.1-nano",
            Provider::Gemini => "gemini-1.5-flash",
        }
    }

    pub fn default_api_key_env(&self) -> &'static str {
        match self {
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Gemini => "GEMINI_API_KEY",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::OpenAi => "https://api.openai.com/v1",
            Provider::Gemini => "https://generativelanguage.googleapis.com/v1beta",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// LLM request settings.
///
/// `model`, `api_key_env` and `base_url` fall back to per-provider defaults
/// when unset; use the `effective_*` accessors rather than the raw fields.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: Provider,
    pub model: Option<String>,
    pub api_key_env: Option<String>,
    pub api_key_file: Option<PathBuf>,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Requests estimated above this many tokens are refused locally.
    pub max_input_tokens: usize,
    pub timeout_secs: u64,
    /// USD per million input tokens, for the pre-request cost estimate.
    pub input_cost_per_mtok: f64,
    /// USD per million output tokens; `max_tokens` is billed as the upper bound.
    pub output_cost_per_mtok: f64,
}

/// Where the report and script are written.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Defaults to `~/Desktop` when it exists, else the home directory.
    pub dir: Option<PathBuf>,
    /// Maintain `fix_trivy_issues_latest.sh` next to the newest script.
    pub latest_symlink: bool,
}

/// Dry-run gate settings.
///
/// # Examples
///
/// ```toml
/// [gate]
/// extra_commands = ["sudo", "snap"]
/// redirects = false
/// ```
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct GateConfig {
    /// Replaces the built-in command allow-list when set.
    pub commands: Option<Vec<String>>,
    /// Appended to the allow-list.
    pub extra_commands: Vec<String>,
    /// Gate lines that overwrite a file with a single `>`.
    pub redirects: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            trivy: "trivy".to_string(),
            sudo: true,
            timeout: "20m".to_string(),
            light_dirs: ["/etc", "/usr/bin", "/usr/lib", "/usr/local/bin"]
                .iter()
                .map(PathBuf::from)
                .collect(),
            full_dirs: vec![PathBuf::from("/")],
            skip_dirs: vec![],
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        LlmConfig {
            provider: Provider::OpenAi,
            model: None,
            api_key_env: None,
            api_key_file: None,
            base_url: None,
            temperature: 0.2,
            max_tokens: 1500,
            max_input_tokens: 28_000,
            timeout_secs: 120,
            input_cost_per_mtok: 0.10,
            output_cost_per_mtok: 0.40,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            dir: None,
            latest_symlink: true,
        }
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        GateConfig {
            commands: None,
            extra_commands: vec![],
            redirects: true,
        }
    }
}

impl LlmConfig {
    pub fn effective_model(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string())
    }

    pub fn effective_api_key_env(&self) -> String {
        self.api_key_env
            .clone()
            .unwrap_or_else(|| self.provider.default_api_key_env().to_string())
    }

    pub fn effective_base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| self.provider.default_base_url().to_string())
            .trim_end_matches('/')
            .to_string()
    }

    /// Resolves the API key: environment variable first, then the key file.
    ///
    /// # Errors
    ///
    /// [`Error::MissingApiKey`] when neither source yields a non-empty key.
    pub fn api_key(&self) -> Result<String> {
        let env = self.effective_api_key_env();
        if let Ok(key) = std::env::var(&env) {
            if !key.trim().is_empty() {
                return Ok(key.trim().to_string());
            }
        }
        if let Some(file) = &self.api_key_file {
            let path = expand_home(file);
            match std::fs::read_to_string(&path) {
                Ok(key) if !key.trim().is_empty() => return Ok(key.trim().to_string()),
                Ok(_) => {}
                Err(e) => tracing::warn!("could not read {}: {e}", path.display()),
            }
        }
        Err(Error::MissingApiKey {
            provider: self.provider.to_string(),
            env,
        })
    }
}

impl OutputConfig {
    /// Directory the report and script land in.
    pub fn resolve_dir(&self) -> PathBuf {
        if let Some(dir) = &self.dir {
            return expand_home(dir);
        }
        if let Some(desktop) = dirs::desktop_dir().filter(|d| d.is_dir()) {
            return desktop;
        }
        dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
    }
}

impl Config {
    /// Loads configuration from a TOML file.
    ///
    /// Resolution order:
    /// 1. If `path` is `Some`, load from that file (error if missing).
    /// 2. If `path` is `None`, try `trivy-autofix.toml` in the current directory.
    /// 3. If that file does not exist either, return [`Config::default()`].
    ///
    /// # Errors
    ///
    /// Returns an error when the explicit path does not exist, the file
    /// cannot be read, or the TOML fails to parse.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let config_path = match path {
            Some(p) if p.exists() => Some(p.to_path_buf()),
            Some(p) => return Err(Error::ConfigNotFound(p.to_path_buf())),
            None => Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.exists()),
        };

        match config_path {
            Some(path) => {
                let content = std::fs::read_to_string(&path)
                    .map_err(|e| Error::io("failed to read config", &path, e))?;
                let config = Config::from_toml(&content)
                    .map_err(|source| Error::ConfigParse { path, source })?;
                Ok(config)
            }
            None => Ok(Config::default()),
        }
    }

    /// Parses a configuration from TOML text.
    ///
    /// # Examples
    ///
    /// ```
    /// use trivy_autofix::config::{Config, Provider};
    ///
    /// let config = Config::from_toml("[llm]\nprovider = \"gemini\"\n").unwrap();
    /// assert_eq!(config.llm.provider, Provider::Gemini);
    /// assert_eq!(config.llm.effective_api_key_env(), "GEMINI_API_KEY");
    /// assert!(config.gate.redirects);
    /// ```
    pub fn from_toml(content: &str) -> std::result::Result<Config, toml::de::Error> {
        toml::from_str(content)
    }
}

/// Expands a leading `~/` to the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}
