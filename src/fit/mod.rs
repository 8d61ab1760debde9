//! Fitting: the optimizer seam and its Levenberg–Marquardt implementation.
//!
//! Responsibilities:
//!
//! - describe a fit problem independently of any session (`FitProblem`)
//! - run a bounded nonlinear least-squares minimisation (`lm`)
//! - package the refined parameters and an evaluator (`FitResult`)

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::Parameters;
use crate::error::OptimizerError;
use crate::models::CompositeModel;

pub mod bounds;
pub mod lm;
pub mod result;

pub use lm::LevenbergMarquardt;
pub use result::FitResult;

/// Everything an optimizer needs, owned so it can move to a worker thread.
#[derive(Debug, Clone)]
pub struct FitProblem {
    pub model: CompositeModel,
    pub x: Vec<f64>,
    pub data: Vec<f64>,
    pub params: Parameters,
}

/// Refined parameters plus diagnostics.
#[derive(Debug, Clone)]
pub struct FitOutcome {
    pub params: Parameters,
    pub stats: FitStatistics,
}

/// Fit diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitStatistics {
    pub method: String,
    pub nfev: usize,
    pub iterations: usize,
    pub ndata: usize,
    pub nvarys: usize,
    pub nfree: usize,
    pub chisqr: f64,
    pub redchi: f64,
    pub aic: f64,
    pub bic: f64,
    /// `false` when the evaluation budget ran out before convergence.
    pub success: bool,
    pub message: String,
    /// `(a, b, correlation)` for varied pairs, strongest first.
    pub correlations: Vec<(String, String, f64)>,
}

/// Options controlling a single minimisation.
#[derive(Debug, Clone)]
pub struct FitOptions {
    /// Evaluation budget; `None` means `2000 * (nvarys + 1)`.
    pub max_nfev: Option<usize>,
    /// Relative reduction in chi-square below which the fit has converged.
    pub ftol: f64,
    /// Relative step size below which the fit has converged.
    pub xtol: f64,
    /// Forward-difference step is `sqrt(epsfcn) * |x|` (or `sqrt(epsfcn)` at zero).
    pub epsfcn: f64,
    pub timeout: Option<Duration>,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_nfev: None,
            ftol: 1.5e-8,
            xtol: 1.5e-8,
            epsfcn: f64::EPSILON,
            timeout: None,
        }
    }
}

/// Cooperative cancellation flag shared with a running fit.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A nonlinear least-squares backend.
pub trait Optimizer: Send + Sync {
    fn minimize(&self, problem: &FitProblem, cancel: &CancelToken) -> Result<FitOutcome, OptimizerError>;
}
