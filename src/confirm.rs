//! Interactive terminal questions.
//!
//! The functions take any reader and writer so that tests can script the
//! answers; the binary passes locked stdin and stderr.

use crate::config::expand_home;
use crate::report::FixLevel;
use crate::scanner::ScanMode;
use std::io::{self, BufRead, Write};

/// Asks a `[y/N]` question. Only `y` or `yes` (any case) count as consent;
/// end of input counts as no.
pub fn ask_yes_no<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> io::Result<bool> {
    ask_confirm(input, output, question, false)
}

/// Asks a yes/no question whose empty answer means `default`.
///
/// The hint shows the default in upper case, `[Y/n]` or `[y/N]`. Anything
/// other than an explicit yes or no, and end of input, yields `default`.
pub fn ask_confirm<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    question: &str,
    default: bool,
) -> io::Result<bool> {
    let hint = if default { "[Y/n]" } else { "[y/N]" };
    write!(output, "{question} {hint}: ")?;
    output.flush()?;
    let mut answer = String::new();
    if input.read_line(&mut answer)? == 0 {
        return Ok(default);
    }
    Ok(match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => true,
        "n" | "no" => false,
        _ => default,
    })
}

/// Shows the scan menu and returns the chosen mode, or `None` to exit.
///
/// A custom scan asks for a directory until an existing one is given; `~`
/// is expanded. End of input anywhere means exit.
pub fn ask_scan_mode<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> io::Result<Option<ScanMode>> {
    writeln!(output, "Select scan mode:")?;
    writeln!(output, "  1) Full system scan")?;
    writeln!(output, "  2) Light scan (critical system directories)")?;
    writeln!(output, "  3) Custom directory scan")?;
    writeln!(output, "  4) Exit")?;
    loop {
        write!(output, "Choice [1-4]: ")?;
        output.flush()?;
        let mut answer = String::new();
        if input.read_line(&mut answer)? == 0 {
            return Ok(None);
        }
        match answer.trim().to_ascii_lowercase().as_str() {
            "1" | "full" => return Ok(Some(ScanMode::Full)),
            "2" | "light" => return Ok(Some(ScanMode::Light)),
            "3" | "custom" => return ask_directory(input, output).map(|dir| dir.map(ScanMode::Path)),
            "4" | "exit" | "q" => return Ok(None),
            _ => writeln!(output, "Please choose 1, 2, 3 or 4.")?,
        }
    }
}

fn ask_directory<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> io::Result<Option<std::path::PathBuf>> {
    loop {
        write!(output, "Directory to scan: ")?;
        output.flush()?;
        let mut answer = String::new();
        if input.read_line(&mut answer)? == 0 {
            return Ok(None);
        }
        let answer = answer.trim();
        if answer.is_empty() {
            continue;
        }
        let dir = expand_home(std::path::Path::new(answer));
        if dir.is_dir() {
            return Ok(Some(dir));
        }
        writeln!(output, "Not a directory: {}", dir.display())?;
    }
}

/// Asks which severities to fix until the answer is `all` or `high`.
///
/// End of input falls back to [`FixLevel::All`].
pub fn ask_fix_level<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> io::Result<FixLevel> {
    loop {
        write!(
            output,
            "Fix all vulnerabilities or only HIGH/CRITICAL? [all/high]: "
        )?;
        output.flush()?;
        let mut answer = String::new();
        if input.read_line(&mut answer)? == 0 {
            return Ok(FixLevel::All);
        }
        match answer.trim().to_ascii_lowercase().as_str() {
            "all" => return Ok(FixLevel::All),
            "high" => return Ok(FixLevel::High),
            _ => writeln!(output, "Please type 'all' or 'high'.")?,
        }
    }
}
