//! # trivy-autofix
//!
//! Turns a [Trivy] filesystem scan into a shell script that remediates the
//! findings, written by an LLM and optionally made safe to rehearse.
//!
//! ## Quick start
//!
//! ```rust
//! use trivy_autofix::dryrun::Classifier;
//!
//! let wrapped = Classifier::default().wrap("#!/bin/bash\napt-get upgrade -y openssl\n");
//! assert_eq!(wrapped.gated(), 1);
//! print!("{wrapped}");
//! ```
//!
//! ## Architecture
//!
//! The crate is organized around a pipeline:
//!
//! 1. **[`config`]**: load settings from `trivy-autofix.toml`.
//! 2. **[`scanner`]**: the [`scanner::VulnScanner`] seam and the Trivy
//!    implementation.
//! 3. **[`report`]**: Trivy JSON types, severity filtering and top-N
//!    selection.
//! 4. **[`llm`]**: the [`llm::ScriptGenerator`] seam with OpenAI and Gemini
//!    backends.
//! 5. **[`dryrun`]**: line classification and confirmation gates.
//! 6. **[`script`]**: timestamped artifacts and the latest-script link.
//! 7. **[`remediate`]**: runs the steps above in order.
//!
//! [`output`] renders classification reports for the `classify` command.
//!
//! [Trivy]: https://trivy.dev/

pub mod config;
pub mod confirm;
pub mod dryrun;
pub mod error;
pub mod llm;
pub mod output;
pub mod remediate;
pub mod report;
pub mod scanner;
pub mod script;

pub use error::{Error, Result};
