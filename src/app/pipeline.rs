//! Session setup shared by the headless and TUI front ends.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! load or generate data -> open session -> add components -> apply edits -> fit
//!
//! The CLI and the TUI can then focus on presentation (printing vs widgets).

use std::time::Duration;

use tracing::{info, warn};

use crate::binding::ControlEvent;
use crate::cli::{DataArgs, FitArgs, SessionArgs};
use crate::data::{SampleSpec, generate_sample};
use crate::domain::{DataSeries, SessionConfig};
use crate::error::AppError;
use crate::fit::FitOptions;
use crate::io::load_series;
use crate::session::Session;

pub fn session_config(args: &SessionArgs) -> Result<SessionConfig, AppError> {
    if args.max_prefix_probes == 0 {
        return Err(AppError::new(2, "--max-prefix-probes must be at least 1."));
    }
    let timeout = match args.fit_timeout_secs {
        Some(secs) if secs.is_finite() && secs > 0.0 => Some(Duration::from_secs_f64(secs)),
        Some(secs) => {
            return Err(AppError::new(
                2,
                format!("--fit-timeout-secs must be positive, got {secs}."),
            ));
        }
        None => None,
    };
    Ok(SessionConfig {
        max_prefix_probes: args.max_prefix_probes,
        plot_points: args.plot_points.max(2),
        fit: FitOptions {
            max_nfev: args.max_nfev,
            timeout,
            ..FitOptions::default()
        },
    })
}

/// The user's CSV, or the seeded demo series.
pub fn load_data(args: &DataArgs) -> Result<DataSeries, AppError> {
    let Some(path) = &args.data else {
        let spec = SampleSpec {
            seed: args.seed,
            noise: args.noise,
            ..SampleSpec::default()
        };
        info!(seed = spec.seed, points = spec.count, "using synthetic demo data");
        return generate_sample(&spec);
    };

    let ingested = load_series(path)?;
    for e in &ingested.row_errors {
        warn!(line = e.line, "skipped row: {}", e.message);
    }
    info!(
        path = %path.display(),
        rows_read = ingested.rows_read,
        rows_used = ingested.rows_used,
        "data loaded"
    );
    Ok(ingested.series)
}

pub fn open_session(args: &SessionArgs) -> Result<Session, AppError> {
    let config = session_config(args)?;
    let series = load_data(&args.data)?;
    Ok(Session::new(series, config)?)
}

/// Build the requested model, apply edits and run one fit.
pub fn run_fit(args: &FitArgs) -> Result<Session, AppError> {
    let mut session = open_session(&args.session)?;

    for name in &args.models {
        session.add_component_by_name(name)?;
    }
    if args.guess {
        session.guess_parameters()?;
    }
    for assignment in &args.set {
        let (name, raw) = split_assignment(assignment)?;
        let value: f64 = raw
            .parse()
            .map_err(|_| AppError::new(2, format!("Invalid value in --set '{assignment}'.")))?;
        session.edit(name, ControlEvent::Value(value))?;
    }
    for name in &args.fix {
        session.edit(name, ControlEvent::Vary(false))?;
    }
    for assignment in &args.expr {
        let (name, expr) = split_assignment(assignment)?;
        session.set_expr(name, Some(expr))?;
    }

    session.run()?;
    Ok(session)
}

fn split_assignment(s: &str) -> Result<(&str, &str), AppError> {
    s.split_once('=')
        .map(|(name, rhs)| (name.trim(), rhs.trim()))
        .filter(|(name, rhs)| !name.is_empty() && !rhs.is_empty())
        .ok_or_else(|| AppError::new(2, format!("Expected NAME=VALUE, got '{s}'.")))
}
