use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use trivy_autofix::config::Provider;
use trivy_autofix::output::OutputFormat;
use trivy_autofix::report::FixLevel;

#[derive(Parser)]
#[command(
    name = "trivy-autofix",
    version,
    about = "Turn a trivy scan into a reviewed remediation script"
)]
pub struct Cli {
    /// Log debug details to stderr
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Custom config file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan, ask the LLM for a fix script, and write it to disk
    Fix(FixArgs),

    /// Add dry-run confirmations to an existing script
    Wrap {
        /// Script to rewrite
        script: PathBuf,

        /// Write the result here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Show how each line of a script would be treated in dry-run mode
    Classify {
        /// Script to inspect
        script: PathBuf,

        /// Output format
        #[arg(long, short, default_value = "pretty", value_enum)]
        format: OutputFormat,
    },

    /// List the commands and markers the dry-run gate uses
    ListGates,

    /// Check which external tools and API keys are available
    CheckTools,
}

#[derive(Args)]
pub struct FixArgs {
    /// Scan only this directory
    #[arg(long, conflicts_with = "light_scan")]
    pub path: Option<PathBuf>,

    /// Scan a few system directories instead of the whole filesystem
    #[arg(long)]
    pub light_scan: bool,

    /// Gate every command of the generated script behind a [y/N] prompt
    #[arg(long)]
    pub dry_run: bool,

    /// Severities to fix; asked interactively when omitted
    #[arg(long, value_enum)]
    pub level: Option<FixLevel>,

    /// Keep at most N vulnerabilities per target, highest CVSS first
    #[arg(long = "top-cves", value_name = "N")]
    pub top_cves: Option<usize>,

    /// LLM provider (overrides config)
    #[arg(long, value_enum)]
    pub provider: Option<Provider>,

    /// Model name (overrides config)
    #[arg(long)]
    pub model: Option<String>,

    /// Directory for the report and script (overrides config)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Send the report without asking for confirmation
    #[arg(long, short)]
    pub yes: bool,
}
