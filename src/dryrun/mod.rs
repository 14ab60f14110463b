//! Dry-run rewriting of generated remediation scripts.
//!
//! [`Classifier`] sorts script lines into a [`LineClassification`];
//! [`Classifier::wrap`] then puts an interactive `[y/N]` prompt in front of
//! every line judged to be an atomic, side-effecting command:
//!
//! ```text
//! apt-get install -y curl
//! ```
//!
//! becomes
//!
//! ```text
//! read -r -p "[DRY-RUN] Execute: apt-get install -y curl? [y/N] " confirm
//! if [[ "$confirm" == [yY] || "$confirm" == [yY]es ]]; then
//!     apt-get install -y curl
//! fi
//! ```
//!
//! The rewrite is line-local on purpose. Anything indented or containing
//! compound syntax is left alone rather than risk breaking a block, so a
//! command spread over several lines is never gated.

pub mod classify;
pub mod wrap;

pub use classify::{
    Classifier, GateTrigger, LineClassification, ScriptLine, COMPLEX_MARKERS,
    DEFAULT_GATE_COMMANDS, HEREDOC_MARKER, STRUCTURAL_KEYWORDS,
};
pub use wrap::{wrap_script, WrappedScript};
