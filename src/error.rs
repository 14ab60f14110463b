//! Error type shared by the scan, generate, and write stages.
//!
//! The dry-run classifier is a total function and never produces one of
//! these; everything around it returns [`Result`].

use std::path::PathBuf;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{0} not found on PATH")]
    ToolMissing(String),

    #[error("sudo authentication failed")]
    SudoFailed,

    #[error("trivy scan of {dir} failed ({status}): {stderr}")]
    Scan {
        dir: String,
        status: String,
        stderr: String,
    },

    #[error("invalid trivy report JSON: {0}")]
    Report(#[from] serde_json::Error),

    #[error("{context} {path}: {source}")]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no {provider} API key: set {env} or configure llm.api_key_file")]
    MissingApiKey { provider: String, env: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} API error {status}: {body}")]
    Api {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("failed to parse {provider} response: {source}")]
    ResponseParse {
        provider: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0} returned an empty response")]
    EmptyResponse(String),

    #[error("request too large ({tokens} estimated tokens, limit {limit}); try --top-cves or --light-scan")]
    RequestTooLarge { tokens: usize, limit: usize },
}

impl Error {
    /// Wraps an I/O error with the path it concerns.
    pub fn io(context: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            context,
            path: path.into(),
            source,
        }
    }
}
