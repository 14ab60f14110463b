//! Confirmation gates around atomic commands.

use super::classify::{Classifier, ScriptLine};
use std::fmt;

/// Variable the generated `read` stores the operator's answer in.
pub const ANSWER_VAR: &str = "confirm";

/// Test line opening the gate's conditional.
pub const GATE_TEST: &str = r#"if [[ "$confirm" == [yY] || "$confirm" == [yY]es ]]; then"#;

/// Closing token of the gate's conditional.
pub const GATE_CLOSE: &str = "fi";

/// Output of [`Classifier::wrap`]: the rewritten script, line by line.
///
/// `lines` holds each output line without its terminator. The rendered text
/// keeps every input line's own terminator (`\n` or `\r\n`), so CRLF
/// scripts stay CRLF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedScript {
    lines: Vec<String>,
    text: String,
    gated: usize,
}

impl WrappedScript {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Number of input lines that received a confirmation gate.
    pub fn gated(&self) -> usize {
        self.gated
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for WrappedScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl Classifier {
    /// Rewrites `script`, gating every line classified as an atomic command.
    ///
    /// Every other line is copied verbatim, terminator included. The body
    /// line of each gate is indented, so running the result through `wrap`
    /// again changes nothing.
    ///
    /// # Examples
    ///
    /// ```
    /// use trivy_autofix::dryrun::Classifier;
    ///
    /// let wrapped = Classifier::default().wrap("# update\napt-get update\n");
    /// assert_eq!(wrapped.gated(), 1);
    /// assert_eq!(wrapped.len(), 5);
    /// assert!(wrapped.to_string().ends_with("    apt-get update\nfi\n"));
    /// ```
    pub fn wrap(&self, script: &str) -> WrappedScript {
        let default_eol = if script.contains("\r\n") { "\r\n" } else { "\n" };
        let mut lines = Vec::new();
        let mut text = String::with_capacity(script.len());
        let mut gated = 0;

        for chunk in script.split_inclusive('\n') {
            let (raw, eol) = split_terminator(chunk);
            let line = ScriptLine::new(raw);
            if self.classify(&line).is_gated() {
                gated += 1;
                let block = gate_block(&line);
                let sep = if eol.is_empty() { default_eol } else { eol };
                text.push_str(&block.join(sep));
                text.push_str(eol);
                lines.extend(block);
            } else {
                text.push_str(chunk);
                lines.push(raw.to_string());
            }
        }

        WrappedScript { lines, text, gated }
    }
}

/// Splits one `split_inclusive` chunk into its content and terminator.
fn split_terminator(chunk: &str) -> (&str, &str) {
    if let Some(raw) = chunk.strip_suffix("\r\n") {
        (raw, "\r\n")
    } else if let Some(raw) = chunk.strip_suffix('\n') {
        (raw, "\n")
    } else {
        (chunk, "")
    }
}

/// Wraps `script` with the default [`Classifier`].
pub fn wrap_script(script: &str) -> WrappedScript {
    Classifier::default().wrap(script)
}

/// The four lines that replace a gated line: prompt, test, command, close.
pub fn gate_block(line: &ScriptLine<'_>) -> [String; 4] {
    [
        format!(
            r#"read -r -p "[DRY-RUN] Execute: {}? [y/N] " {ANSWER_VAR}"#,
            prompt_text(line.trimmed)
        ),
        GATE_TEST.to_string(),
        format!("    {}", line.raw),
        GATE_CLOSE.to_string(),
    ]
}

/// Makes `text` safe to embed in a double-quoted prompt: `"` is escaped and
/// `'` is dropped.
pub fn prompt_text(text: &str) -> String {
    text.replace('"', "\\\"").replace('\'', "")
}
