//! Command-line parsing for `cfit`.
//!
//! Argument parsing and command dispatch stay separate from the session and
//! fitting code; `app` turns these structs into a `SessionConfig`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "cfit", version, about = "Interactive composite curve fitting")]
pub struct Cli {
    #[command(flatten)]
    pub logging: LogArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the component models that can be added to a session.
    Models,
    /// Build a composite model, fit it, print the report and optionally export.
    Fit(FitArgs),
    /// Plot a previously exported fit JSON.
    Plot(PlotArgs),
    /// Launch the interactive TUI.
    Tui(SessionArgs),
}

#[derive(Debug, Args, Clone)]
pub struct LogArgs {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Append logs to this file (the TUI only logs when this is set).
    #[arg(long, value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

/// Where the data series comes from.
#[derive(Debug, Args, Clone)]
pub struct DataArgs {
    /// CSV file with `x,y` columns. Without it a synthetic demo series is used.
    #[arg(short, long, value_name = "CSV")]
    pub data: Option<PathBuf>,

    /// Seed for the demo series.
    #[arg(long, default_value_t = 7)]
    pub seed: u64,

    /// Noise standard deviation for the demo series.
    #[arg(long, default_value_t = 0.1)]
    pub noise: f64,
}

/// Options shared by every command that opens a session.
#[derive(Debug, Args, Clone)]
pub struct SessionArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Maximum prefix suffixes tried when adding a component.
    #[arg(long, default_value_t = 10_000)]
    pub max_prefix_probes: usize,

    /// Points on the dense grid used for plotted model curves.
    #[arg(long, default_value_t = 1000)]
    pub plot_points: usize,

    /// Function evaluation budget per fit (default: 2000 * (nvarys + 1)).
    #[arg(long, env = "CFIT_MAX_NFEV")]
    pub max_nfev: Option<usize>,

    /// Abort a fit after this many seconds.
    #[arg(long, env = "CFIT_FIT_TIMEOUT_SECS")]
    pub fit_timeout_secs: Option<f64>,
}

/// Options for a headless fit.
#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    /// Component model(s) to add, in order (repeat or comma-separate).
    #[arg(short, long = "model", value_name = "NAME", required = true, value_delimiter = ',')]
    pub models: Vec<String>,

    /// Start from the model's heuristic guess (single-component models only).
    #[arg(long)]
    pub guess: bool,

    /// Initial value, `NAME=VALUE` (repeatable).
    #[arg(long = "set", value_name = "NAME=VALUE")]
    pub set: Vec<String>,

    /// Hold a parameter fixed (repeatable).
    #[arg(long = "fix", value_name = "NAME")]
    pub fix: Vec<String>,

    /// Constrain a parameter, `NAME=EXPR` (repeatable).
    #[arg(long = "expr", value_name = "NAME=EXPR")]
    pub expr: Vec<String>,

    /// Disable the terminal plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,

    /// Export the parameter table to CSV.
    #[arg(long = "export-params", value_name = "CSV")]
    pub export_params: Option<PathBuf>,

    /// Export the fit (model, parameters, statistics, fitted grid) to JSON.
    #[arg(long = "export-fit", value_name = "JSON")]
    pub export_fit: Option<PathBuf>,
}

/// Options for plotting a saved fit.
#[derive(Debug, Args, Clone)]
pub struct PlotArgs {
    /// Fit JSON file produced by `cfit fit --export-fit`.
    #[arg(long, value_name = "JSON")]
    pub fit: PathBuf,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}
