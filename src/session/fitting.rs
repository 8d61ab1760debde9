//! Fit execution: `Idle -> Fitting -> Fitted | Failed`.
//!
//! `run` blocks the caller. `begin_fit` moves the problem to a worker thread
//! and the outcome is applied on the session's thread by `poll_fit` or
//! `wait_fit`. Either way the outcome goes through `finish_fit`, so both paths
//! update parameters, controls and the plot identically.

use std::fmt;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, TryRecvError};
use tracing::{info, warn};

use crate::binding::ControlEvent;
use crate::domain::Parameters;
use crate::error::{OptimizerError, SessionError};
use crate::fit::{CancelToken, FitOutcome, FitProblem, FitResult};
use crate::models::CompositeModel;
use crate::report::{ParameterTable, fit_report};
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitState {
    Idle,
    Fitting,
    Fitted,
    Failed,
}

impl fmt::Display for FitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FitState::Idle => "idle",
            FitState::Fitting => "fitting",
            FitState::Fitted => "fitted",
            FitState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A fit running on a worker thread.
pub(crate) struct PendingFit {
    cancel: CancelToken,
    rx: Receiver<Result<FitOutcome, OptimizerError>>,
    model: CompositeModel,
    init_params: Parameters,
    previous_state: FitState,
}

impl PendingFit {
    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Session {
    fn fit_problem(&self) -> Result<FitProblem, SessionError> {
        if self.model.is_empty() || self.params.is_empty() {
            return Err(SessionError::InvalidState("no model to fit".to_string()));
        }
        Ok(FitProblem {
            model: self.model.clone(),
            x: self.series.x.clone(),
            data: self.series.y.clone(),
            params: self.params.clone(),
        })
    }

    /// Fit synchronously and apply the outcome.
    ///
    /// On failure the live parameters and the previous fit result are left as
    /// they were, the state becomes `Failed`, and the error is returned.
    pub fn run(&mut self) -> Result<&FitResult, SessionError> {
        self.ensure_not_fitting()?;
        let problem = self.fit_problem()?;

        let previous_state = self.state;
        self.state = FitState::Fitting;
        info!(model = %problem.model.name(), points = problem.data.len(), "fit started");

        let outcome = self.optimizer.minimize(&problem, &CancelToken::new());
        self.finish_fit(problem.model, problem.params, previous_state, outcome)
    }

    /// Start a fit on a worker thread; collect it with `poll_fit` or `wait_fit`.
    pub fn begin_fit(&mut self) -> Result<(), SessionError> {
        self.ensure_not_fitting()?;
        let problem = self.fit_problem()?;

        let (tx, rx) = crossbeam_channel::bounded(1);
        let cancel = CancelToken::new();
        let worker_cancel = cancel.clone();
        let optimizer = Arc::clone(&self.optimizer);
        let model = problem.model.clone();
        let init_params = problem.params.clone();

        thread::Builder::new()
            .name("cfit-fit".to_string())
            .spawn(move || {
                // The session may be gone by the time the fit ends.
                let _ = tx.send(optimizer.minimize(&problem, &worker_cancel));
            })
            .map_err(|e| SessionError::InvalidState(format!("cannot start fit worker: {e}")))?;

        info!(model = %model.name(), "background fit started");
        self.pending = Some(PendingFit {
            cancel,
            rx,
            model,
            init_params,
            previous_state: self.state,
        });
        self.state = FitState::Fitting;
        Ok(())
    }

    /// Apply the background fit if it has finished.
    ///
    /// `Ok(None)` while it is still running or when no fit was started.
    pub fn poll_fit(&mut self) -> Result<Option<&FitResult>, SessionError> {
        let received = match &self.pending {
            None => return Ok(None),
            Some(pending) => pending.rx.try_recv(),
        };
        let outcome = match received {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return Ok(None),
            Err(TryRecvError::Disconnected) => Err(worker_lost()),
        };
        let Some(pending) = self.pending.take() else {
            return Ok(None);
        };
        self.finish_fit(pending.model, pending.init_params, pending.previous_state, outcome)
            .map(Some)
    }

    /// Block until the background fit finishes and apply it.
    pub fn wait_fit(&mut self) -> Result<&FitResult, SessionError> {
        let pending = self
            .pending
            .take()
            .ok_or_else(|| SessionError::InvalidState("no fit in progress".to_string()))?;
        let outcome = pending.rx.recv().unwrap_or_else(|_| Err(worker_lost()));
        self.finish_fit(pending.model, pending.init_params, pending.previous_state, outcome)
    }

    /// Ask the background fit to stop; `false` when none is running.
    ///
    /// The cancellation is reported by the next `poll_fit`/`wait_fit`.
    pub fn cancel_fit(&mut self) -> bool {
        match &self.pending {
            Some(pending) => {
                pending.cancel();
                info!("fit cancellation requested");
                true
            }
            None => false,
        }
    }

    fn finish_fit(
        &mut self,
        model: CompositeModel,
        init_params: Parameters,
        previous_state: FitState,
        outcome: Result<FitOutcome, OptimizerError>,
    ) -> Result<&FitResult, SessionError> {
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(OptimizerError::Cancelled) => {
                self.state = previous_state;
                info!("fit cancelled");
                return Err(OptimizerError::Cancelled.into());
            }
            Err(err) => {
                self.state = FitState::Failed;
                warn!(error = %err, "fit failed");
                return Err(err.into());
            }
        };

        for refined in outcome.params.iter() {
            let pushed = self
                .binding
                .dispatch(&refined.name, ControlEvent::Value(refined.value), &mut self.params);
            if pushed.is_ok() {
                if let Some(live) = self.params.get_mut(&refined.name) {
                    live.stderr = refined.stderr;
                }
            }
        }

        let stats = &outcome.stats;
        info!(
            nfev = stats.nfev,
            chisqr = stats.chisqr,
            redchi = stats.redchi,
            success = stats.success,
            "fit finished"
        );
        if !stats.success {
            warn!(message = %stats.message, "fit did not converge");
        }

        self.fit = Some(FitResult::new(model, init_params, outcome));
        self.state = FitState::Fitted;
        self.refresh();
        self.fit.as_ref().ok_or(SessionError::NotFitted)
    }

    /// Replace parameter values with the model's heuristic guess from the data.
    ///
    /// Constrained parameters are left to their expressions.
    pub fn guess_parameters(&mut self) -> Result<(), SessionError> {
        self.ensure_not_fitting()?;
        if self.model.is_empty() {
            return Err(SessionError::InvalidState("no model to guess for".to_string()));
        }
        let guessed = self
            .model
            .guess(&self.series.y, &self.series.x)
            .ok_or_else(|| {
                SessionError::Unsupported(format!("parameter guessing for {}", self.model.name()))
            })?;

        for p in guessed.iter().filter(|p| !p.is_constrained()) {
            self.binding
                .dispatch(&p.name, ControlEvent::Value(p.value), &mut self.params)?;
        }
        self.params.update_constraints()?;
        self.binding.sync_from(&self.params);
        info!(model = %self.model.name(), "parameters guessed");

        self.refresh();
        Ok(())
    }

    /// lmfit-style text report of the latest fit.
    pub fn fit_report(&self) -> Result<String, SessionError> {
        let fit = self.fit.as_ref().ok_or(SessionError::NotFitted)?;
        Ok(fit_report(fit))
    }

    /// Tabular view of the live parameters; requires a completed fit.
    pub fn parameter_table(&self) -> Result<ParameterTable, SessionError> {
        if self.fit.is_none() {
            return Err(SessionError::NotFitted);
        }
        Ok(ParameterTable::from_parameters(&self.params))
    }
}

fn worker_lost() -> OptimizerError {
    OptimizerError::Numerical("fit worker exited without a result".to_string())
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;
    use std::time::Duration;

    use rand::prelude::*;
    use rand::rngs::StdRng;
    use rand_distr::Normal;

    use super::*;
    use crate::domain::{DataSeries, SessionConfig};
    use crate::fit::Optimizer;
    use crate::math::lineshape::gaussian;
    use crate::models::ModelKind;
    use crate::plot::{PlotFrame, Renderer};

    struct Counting(Rc<Cell<usize>>);

    impl Renderer for Counting {
        fn render(&mut self, _frame: &PlotFrame) {
            self.0.set(self.0.get() + 1);
        }
    }

    struct Failing;

    impl Optimizer for Failing {
        fn minimize(&self, _: &FitProblem, _: &CancelToken) -> Result<FitOutcome, OptimizerError> {
            Err(OptimizerError::Numerical("diverged".to_string()))
        }
    }

    /// Spins until cancelled.
    struct Stalling;

    impl Optimizer for Stalling {
        fn minimize(&self, _: &FitProblem, cancel: &CancelToken) -> Result<FitOutcome, OptimizerError> {
            while !cancel.is_cancelled() {
                thread::sleep(Duration::from_millis(1));
            }
            Err(OptimizerError::Cancelled)
        }
    }

    fn gaussian_series() -> DataSeries {
        let mut rng = StdRng::seed_from_u64(42);
        let noise = Normal::new(0.0, 0.05).unwrap();
        let x: Vec<f64> = (0..161).map(|i| -4.0 + i as f64 * 0.05).collect();
        let y = x
            .iter()
            .map(|&v| gaussian(v, 8.0, 0.4, 0.6) + noise.sample(&mut rng))
            .collect();
        DataSeries { x, y }
    }

    fn session() -> Session {
        Session::new(gaussian_series(), SessionConfig::default()).unwrap()
    }

    #[test]
    fn fit_recovers_generating_parameters() {
        let mut s = session();
        s.add_component(ModelKind::Gaussian).unwrap();
        s.guess_parameters().unwrap();

        let fit = s.run().unwrap();
        assert!(fit.stats().success);
        let p = fit.params();
        assert!((p.value("gaussian0_amplitude").unwrap() - 8.0).abs() < 0.15);
        assert!((p.value("gaussian0_center").unwrap() - 0.4).abs() < 0.02);
        assert!((p.value("gaussian0_sigma").unwrap() - 0.6).abs() < 0.02);

        assert_eq!(s.state(), FitState::Fitted);
        for name in ["gaussian0_amplitude", "gaussian0_center", "gaussian0_sigma"] {
            let live = s.params().get(name).unwrap();
            assert!(live.stderr.is_some(), "{name} has no stderr");
            assert_eq!(s.binding().group(name).unwrap().value(), live.value);
        }
        assert!(s.fit_report().unwrap().contains("[[Variables]]"));
    }

    #[test]
    fn run_without_model_is_invalid_and_changes_nothing() {
        let mut s = session();
        assert!(matches!(s.run(), Err(SessionError::InvalidState(_))));
        assert_eq!(s.state(), FitState::Idle);
        assert!(s.fit_result().is_none());
    }

    #[test]
    fn report_requires_a_fit() {
        let mut s = session();
        assert!(matches!(s.fit_report(), Err(SessionError::NotFitted)));
        s.add_component(ModelKind::Gaussian).unwrap();
        assert!(matches!(s.fit_report(), Err(SessionError::NotFitted)));
        assert!(matches!(s.parameter_table(), Err(SessionError::NotFitted)));
    }

    #[test]
    fn failed_fit_keeps_parameters_and_previous_result() {
        let mut s = session();
        s.add_component(ModelKind::Gaussian).unwrap();
        s.guess_parameters().unwrap();
        s.run().unwrap();
        let before_params = s.params().clone();
        let before_chisqr = s.fit_result().unwrap().stats().chisqr;

        let mut s = s.with_optimizer(Arc::new(Failing));
        let err = s.run().unwrap_err();
        assert!(matches!(err, SessionError::Optimizer(OptimizerError::Numerical(_))));
        assert_eq!(s.state(), FitState::Failed);
        assert_eq!(s.params(), &before_params);
        assert_eq!(s.fit_result().unwrap().stats().chisqr, before_chisqr);

        // Failed accepts a new run.
        let err = s.run().unwrap_err();
        assert!(matches!(err, SessionError::Optimizer(_)));
    }

    #[test]
    fn renderer_is_called_after_fit() {
        let count = Rc::new(Cell::new(0));
        let mut s = session().with_renderer(Box::new(Counting(Rc::clone(&count))));
        s.add_component(ModelKind::Gaussian).unwrap();
        let after_add = count.get();
        s.run().unwrap();
        assert_eq!(count.get(), after_add + 1);
        assert!(s.plot_frame().fitted);
    }

    #[test]
    fn background_fit_matches_blocking_fit() {
        let mut blocking = session();
        blocking.add_component(ModelKind::Gaussian).unwrap();
        blocking.guess_parameters().unwrap();
        let expected = blocking.run().unwrap().params().value("gaussian0_center");

        let mut s = session();
        s.add_component(ModelKind::Gaussian).unwrap();
        s.guess_parameters().unwrap();
        s.begin_fit().unwrap();
        assert!(s.is_busy());
        assert_eq!(s.state(), FitState::Fitting);
        let got = s.wait_fit().unwrap().params().value("gaussian0_center");
        assert_eq!(got, expected);
        assert!(!s.is_busy());
        assert_eq!(s.state(), FitState::Fitted);
    }

    #[test]
    fn mutations_are_rejected_while_fitting_until_cancelled() {
        let mut s = session().with_optimizer(Arc::new(Stalling));
        s.add_component(ModelKind::Gaussian).unwrap();
        s.begin_fit().unwrap();

        assert!(matches!(s.run(), Err(SessionError::FitInProgress)));
        assert!(matches!(s.begin_fit(), Err(SessionError::FitInProgress)));
        assert!(matches!(
            s.add_component(ModelKind::Linear),
            Err(SessionError::FitInProgress)
        ));
        assert!(matches!(s.clear_all(), Err(SessionError::FitInProgress)));
        assert!(matches!(
            s.edit("gaussian0_center", ControlEvent::Value(1.0)),
            Err(SessionError::FitInProgress)
        ));
        assert!(matches!(s.poll_fit(), Ok(None)));

        assert!(s.cancel_fit());
        assert!(matches!(
            s.wait_fit(),
            Err(SessionError::Optimizer(OptimizerError::Cancelled))
        ));
        assert_eq!(s.state(), FitState::Idle);
        assert!(!s.cancel_fit());
        s.add_component(ModelKind::Linear).unwrap();
    }

    #[test]
    fn guessing_needs_a_single_component() {
        let mut s = session();
        assert!(matches!(s.guess_parameters(), Err(SessionError::InvalidState(_))));
        s.add_component(ModelKind::Gaussian).unwrap();
        s.add_component(ModelKind::Gaussian).unwrap();
        assert!(matches!(s.guess_parameters(), Err(SessionError::Unsupported(_))));
    }
}
