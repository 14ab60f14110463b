mod cli;

use clap::Parser;
use cli::{Cli, Commands, FixArgs};
use colored::Colorize;
use std::io::{self, IsTerminal};
use std::path::Path;
use trivy_autofix::config::Config;
use trivy_autofix::dryrun::{Classifier, COMPLEX_MARKERS, HEREDOC_MARKER, STRUCTURAL_KEYWORDS};
use trivy_autofix::remediate::{self, Estimate, FixOptions, Outcome};
use trivy_autofix::report::FixLevel;
use trivy_autofix::scanner::trivy::TrivyScanner;
use trivy_autofix::scanner::{which_exists, ScanMode, VulnScanner};
use trivy_autofix::{confirm, llm, output, Error};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into()))
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let config = Config::load(cli.config.as_deref()).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(2);
    });

    match cli.command {
        Commands::Fix(args) => fix(args, config),

        Commands::Wrap {
            script,
            output: output_path,
        } => {
            let content = read_script(&script);
            let wrapped = Classifier::from_config(&config.gate).wrap(&content);
            let text = if wrapped.gated() > 0 {
                trivy_autofix::script::ensure_bash_shebang(wrapped.as_str())
            } else {
                wrapped.to_string()
            };

            if let Some(out_path) = output_path {
                trivy_autofix::script::write_script(&out_path, &text)
                    .unwrap_or_else(|e| {
                        eprintln!("Error: {e}");
                        std::process::exit(2);
                    });
                eprintln!(
                    "Wrapped {} command(s); output written to {}",
                    wrapped.gated(),
                    out_path.display()
                );
            } else {
                print!("{text}");
            }
        }

        Commands::Classify { script, format } => {
            let content = read_script(&script);
            let classifier = Classifier::from_config(&config.gate);
            let report =
                output::ClassificationReport::new(&script.display().to_string(), &content, &classifier);
            print!("{}", output::format_report(&report, &format));
        }

        Commands::ListGates => {
            let classifier = Classifier::from_config(&config.gate);
            println!("{}", "Dry-run Gate".bold().underline());
            println!();

            println!("  {}", "Gated commands".bold());
            for command in classifier.commands() {
                println!("    {command}");
            }
            println!();

            println!(
                "  {} {}",
                "Overwrite redirect (>):".bold(),
                if classifier.gates_redirects() {
                    "gated".red().to_string()
                } else {
                    "passed through".green().to_string()
                }
            );
            println!();

            let mut markers: Vec<String> = COMPLEX_MARKERS.iter().map(|c| c.to_string()).collect();
            markers.push(HEREDOC_MARKER.to_string());
            println!("  {}  {}", "Left unchanged (markers):".bold(), markers.join(" "));
            println!(
                "  {}  {}",
                "Left unchanged (keywords):".bold(),
                STRUCTURAL_KEYWORDS.join(" ")
            );
            println!("  {}  indented lines, comments, blank lines", "Left unchanged:".bold());
            println!();
            println!("  Total: {} gated commands", classifier.commands().len());
        }

        Commands::CheckTools => {
            println!("{}", "Tool Availability".bold().underline());
            println!();

            let scanner = TrivyScanner::new(config.scan.clone());
            print_status(
                scanner.is_available(),
                &config.scan.trivy,
                "vulnerability scanner",
            );
            print_status(which_exists("sudo"), "sudo", "root access for full scans");

            let env = config.llm.effective_api_key_env();
            print_status(
                config.llm.api_key().is_ok(),
                &env,
                &format!("{} API key", config.llm.provider),
            );

            println!();
            println!(
                "Note: wrap, classify and list-gates require no external tools."
            );
        }
    }
}

fn fix(args: FixArgs, mut config: Config) {
    if let Some(provider) = args.provider {
        if provider != config.llm.provider {
            // Provider-specific settings from config do not carry over.
            config.llm.model = None;
            config.llm.api_key_env = None;
            config.llm.base_url = None;
        }
        config.llm.provider = provider;
    }
    if args.model.is_some() {
        config.llm.model = args.model;
    }

    let mut dry_run = args.dry_run;
    let interactive = io::stdin().is_terminal();
    let mode = match (args.path, args.light_scan) {
        (None, false) if interactive && !dry_run => {
            let chosen = confirm::ask_scan_mode(&mut io::stdin().lock(), &mut io::stderr())
                .unwrap_or(None);
            let Some(mode) = chosen else {
                println!("Exiting.");
                return;
            };
            dry_run = confirm::ask_confirm(
                &mut io::stdin().lock(),
                &mut io::stderr(),
                "Enable dry-run mode for the fix script? (ask before executing commands)",
                true,
            )
            .unwrap_or(true);
            mode
        }
        (Some(path), _) => {
            if !path.is_dir() {
                eprintln!("Error: not a directory: {}", path.display());
                std::process::exit(2);
            }
            ScanMode::Path(path)
        }
        (None, true) => ScanMode::Light,
        (None, false) => ScanMode::Full,
    };

    let generator = llm::from_config(&config.llm).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(2);
    });

    let level = args.level.unwrap_or_else(|| {
        if interactive {
            confirm::ask_fix_level(&mut io::stdin().lock(), &mut io::stderr()).unwrap_or_default()
        } else {
            FixLevel::All
        }
    });

    let options = FixOptions {
        mode,
        level,
        top_cves: args.top_cves,
        dry_run,
        output_dir: args
            .output_dir
            .unwrap_or_else(|| config.output.resolve_dir()),
    };

    let scanner = TrivyScanner::new(config.scan.clone());
    eprintln!("Scanning ({})...", options.mode.describe());

    let yes = args.yes;
    let approve = |estimate: &Estimate| {
        eprintln!(
            "{} vulnerabilities found ({} HIGH/CRITICAL); sending {}.",
            estimate.stats.total, estimate.stats.high_or_critical, estimate.stats.included
        );
        let breakdown: Vec<String> = estimate
            .by_severity
            .iter()
            .rev()
            .map(|(severity, count)| format!("{count} {severity}"))
            .collect();
        eprintln!("  By severity: {}", breakdown.join(", "));
        eprintln!(
            "Estimated request: ~{} tokens (limit {}) to {} {}, cost up to ${:.4} USD",
            estimate.tokens, estimate.limit, estimate.provider, estimate.model, estimate.cost_usd
        );
        yes || confirm::ask_yes_no(&mut io::stdin().lock(), &mut io::stderr(), "Proceed?")
            .unwrap_or(false)
    };

    let outcome = remediate::run(&options, &config, &scanner, generator.as_ref(), approve)
        .unwrap_or_else(|e| {
            eprintln!("{} {e}", "Error:".red().bold());
            std::process::exit(exit_code(&e));
        });

    match outcome {
        Outcome::Clean => {
            println!("{}", "No vulnerabilities found.".green().bold());
        }
        Outcome::NothingToFix { stats } => {
            println!(
                "{} vulnerabilities found, none at the selected level.",
                stats.total
            );
        }
        Outcome::Aborted { report, .. } => {
            println!("Aborted. Filtered report kept at {}", report.display());
        }
        Outcome::Written(artifacts) => {
            println!("{}", "Remediation script written.".green().bold());
            println!("  Report:  {}", artifacts.report.display());
            println!("  Script:  {}", artifacts.script.display());
            if let Some(latest) = &artifacts.latest {
                println!("  Latest:  {}", latest.display());
            }
            if let Some(gated) = artifacts.gated {
                println!("  Dry-run: {gated} command(s) ask before running");
            }
            println!();
            println!("Review the script, then run it with:");
            println!("  {}", artifacts.run_command().as_str().yellow());
        }
    }
}

fn exit_code(error: &Error) -> i32 {
    match error {
        Error::ConfigNotFound(_)
        | Error::ConfigParse { .. }
        | Error::MissingApiKey { .. }
        | Error::ToolMissing(_) => 2,
        _ => 1,
    }
}

fn read_script(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error: cannot read {}: {e}", path.display());
        std::process::exit(2);
    })
}

fn print_status(ready: bool, name: &str, desc: &str) {
    let status = if ready {
        "READY".green().bold().to_string()
    } else {
        "NOT AVAILABLE".red().to_string()
    };
    println!("  [{status}] {name:<20} {desc}");
}
