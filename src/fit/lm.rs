//! Levenberg–Marquardt minimisation of a composite model against data.
//!
//! Given:
//! - abscissae `x_i` and observations `y_i`
//! - a parameter set where some parameters are free (`vary` and no `expr`),
//!   some fixed and some constrained by expressions
//!
//! we minimise `Σ (model(x_i) - y_i)²` over the free parameters:
//!
//! - bounded parameters are optimised in an unconstrained internal space
//!   (see `bounds`)
//! - constrained parameters are re-evaluated at every model evaluation
//! - the Jacobian is a forward difference, one column per free parameter,
//!   evaluated in parallel
//! - each damped step solves the augmented system `[J; √λ·D] δ = [-r; 0]`
//!
//! After convergence the covariance `(JᵀJ)⁻¹·χ²ᵣ` (in external coordinates)
//! yields `stderr` for every free parameter and the pairwise correlations.

use std::time::Instant;

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use tracing::debug;

use crate::domain::Parameters;
use crate::error::OptimizerError;
use crate::fit::bounds::BoundTransform;
use crate::fit::{CancelToken, FitOptions, FitOutcome, FitProblem, FitStatistics, Optimizer};
use crate::math::solve_least_squares;

const LAMBDA_START: f64 = 1e-3;
const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e16;

/// Only correlations at least this strong are reported.
const MIN_CORRELATION: f64 = 0.1;

/// Bounded Levenberg–Marquardt optimizer.
#[derive(Debug, Clone, Default)]
pub struct LevenbergMarquardt {
    pub options: FitOptions,
}

impl LevenbergMarquardt {
    pub fn new(options: FitOptions) -> Self {
        Self { options }
    }
}

#[derive(Debug, Clone)]
struct FreeParam {
    name: String,
    transform: BoundTransform,
}

/// Residual function over the internal variables of the free parameters.
struct Objective<'a> {
    problem: &'a FitProblem,
    free: Vec<FreeParam>,
}

impl Objective<'_> {
    fn params_at(&self, internal: &[f64]) -> Result<Parameters, OptimizerError> {
        let mut params = self.problem.params.clone();
        for (fp, &v) in self.free.iter().zip(internal) {
            if let Some(p) = params.get_mut(&fp.name) {
                p.value = fp.transform.to_external(v);
            }
        }
        params.update_constraints()?;
        Ok(params)
    }

    fn residual(&self, internal: &[f64]) -> Result<Vec<f64>, OptimizerError> {
        let params = self.params_at(internal)?;
        let model = self.problem.model.eval(&params, &self.problem.x)?;
        Ok(model
            .iter()
            .zip(&self.problem.data)
            .map(|(m, d)| m - d)
            .collect())
    }

    fn jacobian(&self, p: &[f64], r: &[f64], epsfcn: f64) -> Result<DMatrix<f64>, OptimizerError> {
        let eps = epsfcn.max(f64::EPSILON).sqrt();
        let columns = (0..p.len())
            .into_par_iter()
            .map(|j| {
                let mut pj = p.to_vec();
                let h = if p[j] == 0.0 { eps } else { eps * p[j].abs() };
                pj[j] += h;
                let rj = self.residual(&pj)?;
                Ok(rj
                    .iter()
                    .zip(r)
                    .map(|(a, b)| {
                        let d = (a - b) / h;
                        if d.is_finite() { d } else { 0.0 }
                    })
                    .collect::<Vec<f64>>())
            })
            .collect::<Result<Vec<Vec<f64>>, OptimizerError>>()?;

        let mut jac = DMatrix::<f64>::zeros(r.len(), p.len());
        for (j, col) in columns.iter().enumerate() {
            for (i, v) in col.iter().enumerate() {
                jac[(i, j)] = *v;
            }
        }
        Ok(jac)
    }
}

impl Optimizer for LevenbergMarquardt {
    fn minimize(&self, problem: &FitProblem, cancel: &CancelToken) -> Result<FitOutcome, OptimizerError> {
        let started = Instant::now();
        let opts = &self.options;

        if problem.x.len() != problem.data.len() {
            return Err(OptimizerError::Numerical(format!(
                "x has {} points but data has {}",
                problem.x.len(),
                problem.data.len()
            )));
        }

        let mut free = Vec::new();
        let mut p = Vec::new();
        for param in problem.params.iter().filter(|p| p.is_free()) {
            let transform = BoundTransform::from_bounds(param.min, param.max).ok_or_else(|| {
                OptimizerError::InvalidBounds {
                    name: param.name.clone(),
                }
            })?;
            p.push(transform.to_internal(param.value));
            free.push(FreeParam {
                name: param.name.clone(),
                transform,
            });
        }

        let m = free.len();
        let n = problem.data.len();
        if m == 0 {
            return Err(OptimizerError::NoVaryingParameters);
        }
        if n <= m {
            return Err(OptimizerError::TooFewPoints { ndata: n, nvarys: m });
        }

        let objective = Objective { problem, free };
        let max_nfev = opts.max_nfev.unwrap_or(2000 * (m + 1));

        let mut r = objective.residual(&p)?;
        let mut nfev = 1;
        let mut chi = sum_sq(&r);
        if !chi.is_finite() {
            return Err(OptimizerError::NonFinite);
        }

        let mut lambda = LAMBDA_START;
        let mut iterations = 0;
        let (success, message) = loop {
            if cancel.is_cancelled() {
                return Err(OptimizerError::Cancelled);
            }
            if opts.timeout.is_some_and(|limit| started.elapsed() > limit) {
                return Err(OptimizerError::TimedOut);
            }
            if chi <= f64::MIN_POSITIVE {
                break (true, "Fit succeeded: residuals vanished.".to_string());
            }
            if nfev >= max_nfev {
                break (
                    false,
                    format!("Fit aborted: number of function evaluations > {max_nfev}."),
                );
            }

            iterations += 1;
            let jac = objective.jacobian(&p, &r, opts.epsfcn)?;
            nfev += m;
            let jtj = jac.transpose() * &jac;
            let grad = jac.transpose() * DVector::from_column_slice(&r);
            if grad.amax() == 0.0 {
                break (true, "Fit succeeded: gradient vanished.".to_string());
            }

            let mut converged: Option<&str> = None;
            while nfev < max_nfev {
                let Some(delta) = damped_step(&jac, &jtj, &r, lambda) else {
                    lambda *= 10.0;
                    if lambda > LAMBDA_MAX {
                        converged = Some("Fit succeeded: no further reduction in chi-square.");
                        break;
                    }
                    continue;
                };

                let trial: Vec<f64> = p.iter().zip(delta.iter()).map(|(a, d)| a + d).collect();
                let r_trial = objective.residual(&trial)?;
                nfev += 1;
                let chi_trial = sum_sq(&r_trial);

                if chi_trial.is_finite() && chi_trial < chi {
                    let reduction = (chi - chi_trial) / chi;
                    let pnorm = p.iter().map(|v| v * v).sum::<f64>().sqrt();
                    let dnorm = delta.norm();

                    p = trial;
                    r = r_trial;
                    chi = chi_trial;
                    lambda = (lambda / 10.0).max(LAMBDA_MIN);

                    if reduction <= opts.ftol {
                        converged = Some("Fit succeeded: relative reduction in chi-square is at most ftol.");
                    } else if dnorm <= opts.xtol * (pnorm + opts.xtol) {
                        converged = Some("Fit succeeded: relative change in parameters is at most xtol.");
                    }
                    break;
                }

                lambda *= 10.0;
                if lambda > LAMBDA_MAX {
                    converged = Some("Fit succeeded: no further reduction in chi-square.");
                    break;
                }
            }

            if let Some(msg) = converged {
                break (true, msg.to_string());
            }
        };

        let mut params = objective.params_at(&p)?;
        for param in params.iter_mut() {
            param.stderr = None;
        }

        let nfree = n - m;
        let redchi = chi / nfree as f64;
        let jac = objective.jacobian(&p, &r, opts.epsfcn)?;
        nfev += m;
        let covariance = external_covariance(&jac, &objective.free, &p, redchi);

        let mut correlations = Vec::new();
        if let Some(cov) = &covariance {
            for (j, fp) in objective.free.iter().enumerate() {
                let var = cov[(j, j)];
                if var.is_finite() && var >= 0.0 {
                    if let Some(param) = params.get_mut(&fp.name) {
                        param.stderr = Some(var.sqrt());
                    }
                }
            }
            for i in 0..m {
                for j in (i + 1)..m {
                    let denom = (cov[(i, i)] * cov[(j, j)]).sqrt();
                    let c = cov[(i, j)] / denom;
                    if c.is_finite() && c.abs() >= MIN_CORRELATION {
                        correlations.push((
                            objective.free[i].name.clone(),
                            objective.free[j].name.clone(),
                            c,
                        ));
                    }
                }
            }
            correlations.sort_by(|a, b| {
                b.2.abs()
                    .partial_cmp(&a.2.abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }

        let log_term = n as f64 * (chi.max(f64::MIN_POSITIVE) / n as f64).ln();
        let stats = FitStatistics {
            method: "leastsq".to_string(),
            nfev,
            iterations,
            ndata: n,
            nvarys: m,
            nfree,
            chisqr: chi,
            redchi,
            aic: log_term + 2.0 * m as f64,
            bic: log_term + (n as f64).ln() * m as f64,
            success,
            message,
            correlations,
        };
        debug!(
            nfev = stats.nfev,
            iterations = stats.iterations,
            chisqr = stats.chisqr,
            "levenberg-marquardt finished"
        );

        Ok(FitOutcome { params, stats })
    }
}

fn sum_sq(r: &[f64]) -> f64 {
    r.iter().map(|v| v * v).sum()
}

/// Solve `[J; √λ·D] δ = [-r; 0]` with `D² = diag(JᵀJ)`.
fn damped_step(jac: &DMatrix<f64>, jtj: &DMatrix<f64>, r: &[f64], lambda: f64) -> Option<DVector<f64>> {
    let (n, m) = jac.shape();
    let mut a = DMatrix::<f64>::zeros(n + m, m);
    a.view_mut((0, 0), (n, m)).copy_from(jac);
    for j in 0..m {
        a[(n + j, j)] = (lambda * jtj[(j, j)].max(1e-12)).sqrt();
    }
    let mut b = DVector::<f64>::zeros(n + m);
    for (i, v) in r.iter().enumerate() {
        b[i] = -v;
    }
    solve_least_squares(&a, &b)
}

/// Covariance of the external parameters, or `None` when it is not identifiable.
fn external_covariance(
    jac: &DMatrix<f64>,
    free: &[FreeParam],
    internal: &[f64],
    redchi: f64,
) -> Option<DMatrix<f64>> {
    let mut jac_ext = jac.clone();
    for (j, fp) in free.iter().enumerate() {
        let d = fp.transform.derivative(internal[j]);
        if d.abs() < 1e-12 {
            // Pinned at a bound.
            return None;
        }
        jac_ext.column_mut(j).unscale_mut(d);
    }
    let cov = (jac_ext.transpose() * &jac_ext).try_inverse()?;
    Some(cov * redchi)
}
