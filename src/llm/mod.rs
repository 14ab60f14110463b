//! Remediation-script generation by a hosted LLM.
//!
//! The pipeline talks to a [`ScriptGenerator`]; [`from_config`] builds the
//! OpenAI or Gemini implementation selected in [`LlmConfig`]. The helpers
//! here ([`build_prompt`], [`estimate_tokens`], [`estimate_cost`],
//! [`strip_code_fence`]) are provider-independent.

pub mod gemini;
pub mod openai;

use crate::config::{LlmConfig, Provider};
use crate::error::Result;
use std::time::Duration;

/// Writes a shell script from a prompt.
pub trait ScriptGenerator {
    /// Provider identifier, e.g. `"openai"`.
    fn provider(&self) -> &'static str;

    /// Model the request goes to.
    fn model(&self) -> &str;

    /// Sends `prompt` and returns the raw text of the reply.
    fn generate(&self, prompt: &str) -> Result<String>;
}

/// Fixed instruction placed in front of the report.
pub const INSTRUCTIONS: &str = "You are a Linux vulnerability remediation assistant. \
Based on the following Trivy scan report (JSON), write a safe and practical bash script \
that fixes the listed vulnerabilities. Use apt, pip or gem as appropriate and upgrade each \
package only once, to the highest fixed version required. Skip packages that cannot be \
upgraded from a package manager, such as the python3 interpreter itself. If you include npm \
commands, guard them so they are skipped when npm is not installed. \
Output only the shell script content.";

/// Builds the full prompt for a serialized report.
pub fn build_prompt(report_json: &str) -> String {
    format!("{INSTRUCTIONS}\n\nTrivy JSON report:\n{report_json}\n")
}

/// Rough token count, one token per four characters, rounded up.
///
/// Good enough to refuse obviously oversized requests before they cost
/// anything; it is not a tokenizer.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Upper-bound USD cost of one request: `input_tokens` in and a full
/// `output_tokens` reply out, at the given prices per million tokens.
pub fn estimate_cost(
    input_tokens: usize,
    output_tokens: u32,
    input_per_mtok: f64,
    output_per_mtok: f64,
) -> f64 {
    (input_tokens as f64 * input_per_mtok + f64::from(output_tokens) * output_per_mtok)
        / 1_000_000.0
}

/// Removes a Markdown code fence around the reply, if there is one.
///
/// # Examples
///
/// ```
/// use trivy_autofix::llm::strip_code_fence;
///
/// assert_eq!(strip_code_fence("```bash\napt-get update\n```"), "apt-get update");
/// assert_eq!(strip_code_fence("  apt-get update \n"), "apt-get update");
/// ```
pub fn strip_code_fence(text: &str) -> String {
    let text = text.trim();
    if !text.starts_with("```") {
        return text.to_string();
    }
    let mut lines: Vec<&str> = text.lines().skip(1).collect();
    if lines.last().is_some_and(|l| l.trim_start().starts_with("```")) {
        lines.pop();
    }
    lines.join("\n")
}

/// Builds the generator selected by `config.provider`.
///
/// A Gemini config without a model discovers one over the network first.
///
/// # Errors
///
/// Fails when no API key can be found or the HTTP client cannot be built.
pub fn from_config(config: &LlmConfig) -> Result<Box<dyn ScriptGenerator>> {
    let api_key = config.api_key()?;
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(concat!("trivy-autofix/", env!("CARGO_PKG_VERSION")))
        .build()?;

    Ok(match config.provider {
        Provider::OpenAi => Box::new(openai::OpenAiGenerator::new(client, config, api_key)),
        Provider::Gemini if config.model.is_none() => {
            let model = gemini::discover_model(&client, &config.effective_base_url(), &api_key);
            let config = LlmConfig {
                model: Some(model),
                ..config.clone()
            };
            Box::new(gemini::GeminiGenerator::new(client, &config, api_key))
        }
        Provider::Gemini => Box::new(gemini::GeminiGenerator::new(client, config, api_key)),
    })
}
