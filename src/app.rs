//! Top-level application orchestration.
//!
//! `src/main.rs` only maps errors to exit codes; this module is the "real main":
//! - loads `.env` and parses CLI arguments
//! - initialises logging
//! - runs headless fits and prints reports/plots
//! - writes optional exports
//! - launches the TUI

use std::fs::OpenOptions;
use std::sync::Mutex;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Command, FitArgs, LogArgs, PlotArgs};
use crate::error::AppError;
use crate::io::{FitSnapshot, read_fit_json, write_fit_json, write_parameters_csv};
use crate::registry;

pub mod pipeline;

/// Entry point for the `cfit` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();

    // `cfit` and `cfit -v` behave like `cfit tui ...`. Clap needs a
    // subcommand name, so argv is rewritten before parsing.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    let interactive = matches!(cli.command, Command::Tui(_));
    init_logging(&cli.logging, interactive)?;

    match cli.command {
        Command::Models => {
            print!("{}", format_models());
            Ok(())
        }
        Command::Fit(args) => handle_fit(args),
        Command::Plot(args) => handle_plot(args),
        Command::Tui(args) => crate::tui::run(args),
    }
}

/// `RUST_LOG` wins; otherwise `info`, or `debug` with `--verbose`.
///
/// Headless commands log to stderr. The TUI owns the terminal, so it only
/// logs when `--log-file` is given.
fn init_logging(args: &LogArgs, interactive: bool) -> Result<(), AppError> {
    let default = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    let result = match &args.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| AppError::new(2, format!("Failed to open log file '{}': {e}", path.display())))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).try_init()
        }
        None if interactive => return Ok(()),
        None => builder.with_writer(std::io::stderr).try_init(),
    };
    result.map_err(|e| AppError::new(2, format!("Failed to initialise logging: {e}")))
}

fn format_models() -> String {
    let mut out = String::from("Available models:\n");
    for (display, kind) in registry::list_available() {
        let params: Vec<&str> = kind.params().iter().map(|h| h.name).collect();
        out.push_str(&format!(
            "  {display:<14} prefix {:<18} params: {}\n",
            format!("{}N_", kind.canonical_name()),
            params.join(", ")
        ));
    }
    out.push_str("\nUnavailable:\n");
    for (kind, reason) in registry::DENYLIST {
        out.push_str(&format!("  {:<14} {reason}\n", kind.display_name()));
    }
    out
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let session = pipeline::run_fit(&args)?;

    println!("{}", session.fit_report()?);
    println!("{}", session.parameter_table()?.to_text());

    if !args.no_plot {
        let plot = crate::plot::render_ascii(&session.plot_frame(), args.width, args.height);
        println!("{plot}");
    }

    // Optional exports.
    if let Some(path) = &args.export_params {
        write_parameters_csv(path, &session.parameter_table()?)?;
    }
    if let Some(path) = &args.export_fit {
        write_fit_json(path, &FitSnapshot::from_session(&session)?)?;
    }

    Ok(())
}

fn handle_plot(args: PlotArgs) -> Result<(), AppError> {
    let snapshot = read_fit_json(&args.fit)?;
    println!("{}", snapshot.model);
    let plot = crate::plot::render_ascii(&snapshot.plot_frame(), args.width, args.height);
    println!("{plot}");
    Ok(())
}

/// Rewrite argv so `cfit` defaults to `cfit tui`.
///
/// Rules:
/// - `cfit`                      -> `cfit tui`
/// - `cfit --data f.csv ...`     -> `cfit tui --data f.csv ...`
/// - `cfit --help/--version/-h`  -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("tui".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "models" | "fit" | "plot" | "tui");
    if is_subcommand {
        return argv;
    }

    // A leading flag means "tui flags".
    if arg1.starts_with('-') {
        argv.insert(1, "tui".to_string());
    }
    argv
}
