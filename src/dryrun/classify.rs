//! Line-by-line classification of a generated shell script.
//!
//! Each line is judged in isolation. Nothing is parsed: the checks below are
//! membership tests on the line text, applied in order, and the first one
//! that matches decides the [`LineClassification`].
//!
//! 1. blank
//! 2. comment (`#`, shebang included)
//! 3. indented, so nested inside some block
//! 4. control-flow keyword, complexity marker or heredoc opener
//! 5. actionable command word, or a single overwrite redirection
//! 6. anything else

use crate::config::GateConfig;
use regex::Regex;
use std::sync::LazyLock;

/// Command words gated by default.
pub const DEFAULT_GATE_COMMANDS: &[&str] = &[
    // package managers
    "apt", "apt-get", "yum", "dnf", "apk", "pacman", "zypper", "pip", "npm", "yarn", "poetry",
    // filesystem mutators
    "rm", "mv", "cp", "chmod", "chown", "dd", "sed",
    // service control
    "systemctl", "service",
    // network fetchers
    "wget", "curl",
    // packaging
    "dpkg", "rpm",
];

/// Characters that make a line compound (pipes, separators, subshells,
/// blocks, command substitution, continuation).
pub const COMPLEX_MARKERS: &[char] = &[';', '|', '&', '(', ')', '{', '}', '\\', '`'];

/// Opens a heredoc (`<<EOF`, `<<-EOF`) or a here-string (`<<<`). The body
/// that follows must stay directly after the opener.
pub const HEREDOC_MARKER: &str = "<<";

/// Control-flow keywords, matched as whitespace-delimited words.
pub const STRUCTURAL_KEYWORDS: &[&str] = &[
    "if", "then", "else", "elif", "fi", "do", "done", "case", "esac", "function",
];

static RE_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s)(if|then|else|elif|fi|do|done|case|esac|function)(?:\s|$)").unwrap()
});

// `pip3`, `pip3.11`: a gate entry followed only by a version suffix.
static RE_VERSION_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+(?:\.[0-9]+)*$").unwrap());

/// One line of script text, borrowed from the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptLine<'a> {
    /// The line exactly as it appeared, without its line terminator.
    pub raw: &'a str,
    /// `raw` with surrounding whitespace removed.
    pub trimmed: &'a str,
    /// `true` when `raw` starts with a space or a tab.
    pub indented: bool,
}

impl<'a> ScriptLine<'a> {
    pub fn new(raw: &'a str) -> Self {
        ScriptLine {
            raw,
            trimmed: raw.trim(),
            indented: raw.starts_with([' ', '\t']),
        }
    }

    /// First whitespace-delimited word of the trimmed text.
    pub fn command_word(&self) -> Option<&'a str> {
        self.trimmed.split_whitespace().next()
    }
}

/// Why a line was judged to be an atomic command.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GateTrigger {
    /// The command word matched this allow-list entry.
    Command { command: String },
    /// The line overwrites a file with a single `>` redirection.
    Overwrite,
}

/// Verdict for a single [`ScriptLine`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineClassification {
    Blank,
    Comment,
    /// Indented, so part of an enclosing block.
    Nested,
    StructuralKeyword { keyword: String },
    ComplexStatement { marker: String },
    /// A column-0 statement that matches no gate (e.g. `VAR=1`, `echo ok`).
    PlainStatement,
    AtomicCommand { trigger: GateTrigger },
}

impl LineClassification {
    /// `true` for the only classification that gets wrapped.
    pub fn is_gated(&self) -> bool {
        matches!(self, LineClassification::AtomicCommand { .. })
    }

    /// Short stable label, as used in the `classify` output.
    pub fn label(&self) -> &'static str {
        match self {
            LineClassification::Blank => "blank",
            LineClassification::Comment => "comment",
            LineClassification::Nested => "nested",
            LineClassification::StructuralKeyword { .. } => "structural",
            LineClassification::ComplexStatement { .. } => "complex",
            LineClassification::PlainStatement => "plain",
            LineClassification::AtomicCommand { .. } => "gated",
        }
    }

    /// Human-readable detail for the verdict.
    pub fn detail(&self) -> String {
        match self {
            LineClassification::Blank => String::new(),
            LineClassification::Comment => "comment".to_string(),
            LineClassification::Nested => "indented inside a block".to_string(),
            LineClassification::StructuralKeyword { keyword } => {
                format!("control-flow keyword `{keyword}`")
            }
            LineClassification::ComplexStatement { marker } => {
                format!("compound syntax `{marker}`")
            }
            LineClassification::PlainStatement => "no gate matched".to_string(),
            LineClassification::AtomicCommand {
                trigger: GateTrigger::Command { command },
            } => format!("actionable command `{command}`"),
            LineClassification::AtomicCommand {
                trigger: GateTrigger::Overwrite,
            } => "overwriting `>` redirection".to_string(),
        }
    }
}

/// Decides which script lines are atomic, side-effecting commands.
///
/// The allow-list is not meant to be exhaustive; build one from
/// [`GateConfig`] to extend or replace [`DEFAULT_GATE_COMMANDS`].
///
/// # Examples
///
/// ```
/// use trivy_autofix::dryrun::Classifier;
///
/// let classifier = Classifier::default();
/// assert!(classifier.classify_line("apt-get install -y curl").is_gated());
/// assert!(!classifier.classify_line("  apt-get install -y curl").is_gated());
/// assert!(!classifier.classify_line("curl https://x.sh | bash").is_gated());
/// ```
#[derive(Debug, Clone)]
pub struct Classifier {
    commands: Vec<String>,
    redirects: bool,
}

impl Default for Classifier {
    fn default() -> Self {
        Classifier {
            commands: DEFAULT_GATE_COMMANDS.iter().map(|c| c.to_string()).collect(),
            redirects: true,
        }
    }
}

impl Classifier {
    pub fn new(commands: Vec<String>, redirects: bool) -> Self {
        Classifier {
            commands,
            redirects,
        }
    }

    /// Builds the classifier described by the `[gate]` config section.
    pub fn from_config(gate: &GateConfig) -> Self {
        let mut commands: Vec<String> = match &gate.commands {
            Some(list) => list.clone(),
            None => DEFAULT_GATE_COMMANDS.iter().map(|c| c.to_string()).collect(),
        };
        for extra in &gate.extra_commands {
            if !commands.contains(extra) {
                commands.push(extra.clone());
            }
        }
        commands.retain(|c| !c.trim().is_empty());
        Classifier::new(commands, gate.redirects)
    }

    /// Effective allow-list, in match order.
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Whether single `>` redirections are gated.
    pub fn gates_redirects(&self) -> bool {
        self.redirects
    }

    pub fn classify_line(&self, raw: &str) -> LineClassification {
        self.classify(&ScriptLine::new(raw))
    }

    pub fn classify(&self, line: &ScriptLine<'_>) -> LineClassification {
        let text = line.trimmed;
        if text.is_empty() {
            return LineClassification::Blank;
        }
        if text.starts_with('#') {
            return LineClassification::Comment;
        }
        if line.indented {
            return LineClassification::Nested;
        }
        if let Some(cap) = RE_KEYWORD.captures(text) {
            return LineClassification::StructuralKeyword {
                keyword: cap[1].to_string(),
            };
        }
        if let Some(marker) = text.chars().find(|c| COMPLEX_MARKERS.contains(c)) {
            return LineClassification::ComplexStatement {
                marker: marker.to_string(),
            };
        }
        if text.contains(HEREDOC_MARKER) {
            return LineClassification::ComplexStatement {
                marker: HEREDOC_MARKER.to_string(),
            };
        }

        if let Some(word) = line.command_word() {
            if let Some(entry) = self.commands.iter().find(|e| command_matches(word, e)) {
                return LineClassification::AtomicCommand {
                    trigger: GateTrigger::Command {
                        command: entry.clone(),
                    },
                };
            }
        }
        if self.redirects && has_overwrite_redirect(text) {
            return LineClassification::AtomicCommand {
                trigger: GateTrigger::Overwrite,
            };
        }

        LineClassification::PlainStatement
    }

    /// Classifies every line of `script`, in order.
    pub fn classify_script<'a>(&self, script: &'a str) -> Vec<(ScriptLine<'a>, LineClassification)> {
        script
            .lines()
            .map(|raw| {
                let line = ScriptLine::new(raw);
                let class = self.classify(&line);
                (line, class)
            })
            .collect()
    }
}

fn command_matches(word: &str, entry: &str) -> bool {
    if entry.is_empty() {
        return false;
    }
    word == entry
        || word
            .strip_prefix(entry)
            .is_some_and(|rest| RE_VERSION_SUFFIX.is_match(rest))
}

/// Returns `true` when `text` holds exactly one unquoted `>` run and that run
/// is a single character, i.e. one truncating redirection and no `>>`.
///
/// Quotes are tracked so that `>` inside a string literal, such as the text
/// of a generated `read -p` prompt, does not count.
pub fn has_overwrite_redirect(text: &str) -> bool {
    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;
    let mut runs = 0usize;
    let mut run_len = 0usize;
    let mut single_char_runs = true;

    for c in text.chars() {
        let quoted = in_single || in_double;
        if c == '>' && !quoted && !escaped {
            run_len += 1;
            continue;
        }
        if run_len > 0 {
            runs += 1;
            single_char_runs &= run_len == 1;
            run_len = 0;
        }

        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if !in_single => escaped = true,
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            _ => {}
        }
    }
    if run_len > 0 {
        runs += 1;
        single_char_runs &= run_len == 1;
    }

    runs == 1 && single_char_runs
}
