//! Read/write fit snapshot JSON files.
//!
//! A snapshot is the portable record of a completed fit:
//! - the components and refined parameters
//! - fit statistics
//! - the observed data and a precomputed fitted grid for quick plotting

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Parameters;
use crate::error::{AppError, SessionError};
use crate::fit::FitStatistics;
use crate::models::Component;
use crate::plot::{ComponentCurve, PlotFrame, dense_grid};
use crate::session::Session;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveGrid {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    /// `(prefix, y)` per component.
    pub components: Vec<(String, Vec<f64>)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitSnapshot {
    pub tool: String,
    pub created_at: DateTime<Utc>,
    pub model: String,
    pub components: Vec<Component>,
    pub params: Parameters,
    pub stats: FitStatistics,
    pub x: Vec<f64>,
    pub data: Vec<f64>,
    pub grid: CurveGrid,
}

impl FitSnapshot {
    /// Capture the session's latest fit; fails with `NotFitted` before any fit.
    pub fn from_session(session: &Session) -> Result<Self, SessionError> {
        let fit = session.fit_result().ok_or(SessionError::NotFitted)?;
        let x = session.x();
        let grid_x = match finite_range(x) {
            Some((lo, hi)) => dense_grid(lo, hi, session.config().plot_points),
            None => x.to_vec(),
        };
        let grid = CurveGrid {
            y: fit.eval(&grid_x)?,
            components: fit.eval_components(&grid_x)?,
            x: grid_x,
        };

        Ok(Self {
            tool: "cfit".to_string(),
            created_at: Utc::now(),
            model: fit.model().name(),
            components: fit.model().components().to_vec(),
            params: fit.params().clone(),
            stats: fit.stats().clone(),
            x: x.to_vec(),
            data: session.data().to_vec(),
            grid,
        })
    }

    /// The stored curves as a plot frame.
    pub fn plot_frame(&self) -> PlotFrame {
        let mut frame = PlotFrame::observed(&self.x, &self.data);
        frame.grid = self.grid.x.clone();
        frame.model = Some(self.grid.y.clone());
        frame.components = self
            .grid
            .components
            .iter()
            .map(|(prefix, y)| ComponentCurve {
                prefix: prefix.clone(),
                y: y.clone(),
            })
            .collect();
        frame.fitted = true;
        frame
    }
}

fn finite_range(x: &[f64]) -> Option<(f64, f64)> {
    let lo = x.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    (lo.is_finite() && hi.is_finite() && hi > lo).then_some((lo, hi))
}

/// Write a snapshot JSON file.
pub fn write_fit_json(path: &Path, snapshot: &FitSnapshot) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create fit JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, snapshot)
        .map_err(|e| AppError::new(2, format!("Failed to write fit JSON: {e}")))?;
    Ok(())
}

/// Read a snapshot JSON file.
pub fn read_fit_json(path: &Path) -> Result<FitSnapshot, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open fit JSON '{}': {e}", path.display())))?;
    let snapshot: FitSnapshot =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid fit JSON: {e}")))?;
    Ok(snapshot)
}
