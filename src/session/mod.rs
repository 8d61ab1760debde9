//! The interactive session controller.
//!
//! A `Session` owns one data series and everything built on top of it:
//! the composite model, the live parameter set, the control groups mirroring
//! it, and the latest fit result. All mutation goes through `&mut self`; the
//! only concurrency is an optional background fit (see `fitting`), during
//! which every mutating operation is rejected with `FitInProgress`.
//!
//! Structural changes (`add_component`, `clear_all`, `set_expr`) always
//! finish rebuilding the binding before returning, so no control ever refers
//! to a parameter that no longer exists.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::binding::{ControlEvent, ParameterBinding, Refresh};
use crate::domain::{DataSeries, Parameters, SessionConfig};
use crate::error::{ModelError, SessionError};
use crate::fit::{FitResult, LevenbergMarquardt, Optimizer};
use crate::models::{Component, CompositeModel, ModelKind};
use crate::plot::{ComponentCurve, NullRenderer, PlotFrame, Renderer, dense_grid};
use crate::registry;

mod fitting;

pub use fitting::FitState;
use fitting::PendingFit;

pub struct Session {
    series: DataSeries,
    model: CompositeModel,
    params: Parameters,
    binding: ParameterBinding,
    fit: Option<FitResult>,
    state: FitState,
    config: SessionConfig,
    optimizer: Arc<dyn Optimizer>,
    renderer: Box<dyn Renderer>,
    pending: Option<PendingFit>,
}

impl Session {
    /// Start an empty session over `series`.
    pub fn new(series: DataSeries, config: SessionConfig) -> Result<Self, SessionError> {
        if series.x.len() != series.y.len() {
            return Err(SessionError::InvalidData(format!(
                "x has {} values but y has {}",
                series.x.len(),
                series.y.len()
            )));
        }
        if series.is_empty() {
            return Err(SessionError::InvalidData("data series is empty".to_string()));
        }

        let optimizer = Arc::new(LevenbergMarquardt::new(config.fit.clone()));
        Ok(Self {
            series,
            model: CompositeModel::new(),
            params: Parameters::new(),
            binding: ParameterBinding::new(),
            fit: None,
            state: FitState::Idle,
            config,
            optimizer,
            renderer: Box::new(NullRenderer),
            pending: None,
        })
    }

    pub fn with_optimizer(mut self, optimizer: Arc<dyn Optimizer>) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn with_renderer(mut self, renderer: Box<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn x(&self) -> &[f64] {
        &self.series.x
    }

    pub fn data(&self) -> &[f64] {
        &self.series.y
    }

    pub fn model(&self) -> &CompositeModel {
        &self.model
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn binding(&self) -> &ParameterBinding {
        &self.binding
    }

    pub fn fit_result(&self) -> Option<&FitResult> {
        self.fit.as_ref()
    }

    pub fn state(&self) -> FitState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// `true` while a background fit is running.
    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    fn ensure_not_fitting(&self) -> Result<(), SessionError> {
        if self.pending.is_some() {
            return Err(SessionError::FitInProgress);
        }
        Ok(())
    }

    /// Append a component of `kind` under the first free prefix
    /// `<canonical>0_`, `<canonical>1_`, ... and return that prefix.
    ///
    /// User state of every surviving parameter is carried over; the fit
    /// result is discarded.
    pub fn add_component(&mut self, kind: ModelKind) -> Result<String, SessionError> {
        self.ensure_not_fitting()?;
        if registry::is_denied(kind) {
            return Err(SessionError::Unsupported(format!(
                "{kind} components cannot be used in a composite session"
            )));
        }

        let base = kind.canonical_name();
        let mut chosen = None;
        for i in 0..self.config.max_prefix_probes {
            let prefix = format!("{base}{i}_");
            match self.model.combine(Component::new(kind, prefix.clone())) {
                Ok(model) => {
                    chosen = Some((prefix, model));
                    break;
                }
                Err(ModelError::DuplicatePrefix { .. }) => {
                    debug!(%prefix, "prefix taken");
                }
                Err(ModelError::NameCollision { name }) => {
                    debug!(%prefix, collision = %name, "prefix clashes with an existing name");
                }
                Err(err) => return Err(err.into()),
            }
        }
        let (prefix, model) = chosen.ok_or_else(|| SessionError::PrefixExhausted {
            base: base.to_string(),
            probes: self.config.max_prefix_probes,
        })?;

        let mut params = model.make_params();
        let carried = params.merge_from(&self.params);
        params.update_constraints()?;

        self.model = model;
        self.params = params;
        self.fit = None;
        self.state = FitState::Idle;
        self.binding.rebuild(&self.params);
        info!(%prefix, %kind, carried, components = self.model.len(), "component added");

        self.refresh();
        Ok(prefix)
    }

    /// Resolve `name` through the registry, then [`Session::add_component`].
    pub fn add_component_by_name(&mut self, name: &str) -> Result<String, SessionError> {
        let kind = registry::lookup(name).ok_or_else(|| SessionError::UnknownModel(name.to_string()))?;
        self.add_component(kind)
    }

    /// Drop the model, parameters and fit. A no-op on an empty session.
    pub fn clear_all(&mut self) -> Result<(), SessionError> {
        self.ensure_not_fitting()?;
        if self.model.is_empty()
            && self.params.is_empty()
            && self.fit.is_none()
            && self.state == FitState::Idle
        {
            return Ok(());
        }

        self.model = CompositeModel::new();
        self.params = Parameters::new();
        self.fit = None;
        self.state = FitState::Idle;
        self.binding.clear();
        info!("session cleared");

        self.refresh();
        Ok(())
    }

    /// Apply a control edit for parameter `name`.
    ///
    /// Value edits re-evaluate constraint expressions and redraw the plot.
    /// A constrained parameter takes its value from its expression, so value
    /// edits on it are refused.
    pub fn edit(&mut self, name: &str, event: ControlEvent) -> Result<Refresh, SessionError> {
        self.ensure_not_fitting()?;
        if matches!(event, ControlEvent::Value(_))
            && self.params.get(name).is_some_and(|p| p.is_constrained())
        {
            return Err(SessionError::InvalidState(format!(
                "'{name}' is set by its expression; remove the expression to edit its value"
            )));
        }
        let refresh = self.binding.dispatch(name, event, &mut self.params)?;
        if refresh == Refresh::Plot {
            self.params.update_constraints()?;
            self.binding.sync_from(&self.params);
            self.refresh();
        }
        Ok(refresh)
    }

    /// Tie `name` to an expression over other parameters, or untie it with `None`.
    pub fn set_expr(&mut self, name: &str, expr: Option<&str>) -> Result<(), SessionError> {
        self.ensure_not_fitting()?;
        if !self.params.contains(name) {
            return Err(SessionError::UnknownParameter(name.to_string()));
        }
        if let Some(src) = expr {
            self.params.validate_expr(src)?;
        }

        let mut trial = self.params.clone();
        if let Some(p) = trial.get_mut(name) {
            p.set_expr(expr.map(str::to_string));
        }
        trial.update_constraints()?;

        self.params = trial;
        self.binding.rebuild(&self.params);
        debug!(param = name, expr = ?expr, "constraint updated");

        self.refresh();
        Ok(())
    }

    /// Model and component curves over a dense grid spanning the data.
    pub fn plot_frame(&self) -> PlotFrame {
        let mut frame = PlotFrame::observed(&self.series.x, &self.series.y);
        frame.fitted = self.fit.is_some();
        if self.model.is_empty() {
            return frame;
        }

        frame.grid = match self.series.x_range() {
            Some((lo, hi)) => dense_grid(lo, hi, self.config.plot_points),
            None => self.series.x.clone(),
        };
        match self.model.eval(&self.params, &frame.grid) {
            Ok(y) => frame.model = Some(y),
            Err(err) => warn!(error = %err, "model evaluation failed"),
        }
        match self.model.eval_components(&self.params, &frame.grid) {
            Ok(parts) => {
                frame.components = parts
                    .into_iter()
                    .map(|(prefix, y)| ComponentCurve { prefix, y })
                    .collect();
            }
            Err(err) => warn!(error = %err, "component evaluation failed"),
        }
        frame
    }

    /// Redraw through the configured renderer.
    pub fn refresh(&mut self) {
        let frame = self.plot_frame();
        self.renderer.render(&frame);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(pending) = &self.pending {
            pending.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::binding::ControlGroup;

    struct Counting(Rc<Cell<usize>>);

    impl Renderer for Counting {
        fn render(&mut self, _frame: &PlotFrame) {
            self.0.set(self.0.get() + 1);
        }
    }

    fn series() -> DataSeries {
        let x: Vec<f64> = (0..50).map(|i| i as f64 * 0.1).collect();
        let y = x.iter().map(|v| 1.0 + v).collect();
        DataSeries { x, y }
    }

    fn session() -> Session {
        Session::new(series(), SessionConfig::default()).unwrap()
    }

    #[test]
    fn rejects_mismatched_series() {
        let bad = DataSeries {
            x: vec![0.0, 1.0],
            y: vec![1.0],
        };
        assert!(matches!(
            Session::new(bad, SessionConfig::default()),
            Err(SessionError::InvalidData(_))
        ));
    }

    #[test]
    fn repeated_adds_get_distinct_prefixes() {
        let mut s = session();
        assert_eq!(s.add_component(ModelKind::Gaussian).unwrap(), "gaussian0_");
        assert_eq!(s.add_component(ModelKind::Gaussian).unwrap(), "gaussian1_");
        assert_eq!(s.add_component(ModelKind::Linear).unwrap(), "linear0_");
        assert_eq!(s.add_component(ModelKind::Gaussian).unwrap(), "gaussian2_");

        assert_eq!(s.model().len(), 4);
        let mut prefixes: Vec<&str> = s.model().components().iter().map(|c| c.prefix()).collect();
        prefixes.sort();
        prefixes.dedup();
        assert_eq!(prefixes.len(), 4);

        let expected: Vec<String> = {
            let mut v = s.model().param_names();
            v.sort();
            v
        };
        let got: Vec<String> = s.params().names().map(str::to_string).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn user_state_survives_structural_changes() {
        let mut s = session();
        s.add_component(ModelKind::Gaussian).unwrap();
        s.add_component(ModelKind::Gaussian).unwrap();
        s.edit("gaussian0_amplitude", ControlEvent::Vary(false)).unwrap();
        s.edit("gaussian0_center", ControlEvent::Value(2.5)).unwrap();
        s.edit("gaussian0_center", ControlEvent::MaxEnabled(true)).unwrap();
        s.edit("gaussian0_center", ControlEvent::Max(4.0)).unwrap();
        s.set_expr("gaussian1_sigma", Some("gaussian0_sigma")).unwrap();
        let before = s.params().clone();

        s.add_component(ModelKind::Lorentzian).unwrap();

        for old in before.iter() {
            let new = s.params().get(&old.name).unwrap();
            assert_eq!(new.value, old.value, "{}", old.name);
            assert_eq!(new.vary, old.vary, "{}", old.name);
            assert_eq!(new.min, old.min, "{}", old.name);
            assert_eq!(new.max, old.max, "{}", old.name);
            assert_eq!(new.expr, old.expr, "{}", old.name);
            assert_eq!(new.brute_step, old.brute_step, "{}", old.name);
        }
        assert!(!s.params().get("gaussian0_amplitude").unwrap().vary);
        assert!(!s.binding().group("gaussian0_amplitude").unwrap().vary());
        assert_eq!(s.params().get("gaussian0_center").unwrap().max, Some(4.0));
    }

    #[test]
    fn structural_change_discards_uncertainties_and_fit() {
        let mut s = session();
        s.add_component(ModelKind::Linear).unwrap();
        s.run().unwrap();
        assert!(s.params().get("linear0_slope").unwrap().stderr.is_some());

        s.add_component(ModelKind::Constant).unwrap();
        assert!(s.fit_result().is_none());
        assert_eq!(s.state(), FitState::Idle);
        assert!(s.params().iter().all(|p| p.stderr.is_none()));
        assert!((s.params().value("linear0_slope").unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn disabling_a_bound_unbounds_the_backend() {
        let mut s = session();
        s.add_component(ModelKind::Gaussian).unwrap();
        s.edit("gaussian0_sigma", ControlEvent::Min(0.1)).unwrap();
        assert_eq!(s.params().get("gaussian0_sigma").unwrap().min, Some(0.1));

        s.edit("gaussian0_sigma", ControlEvent::MinEnabled(false)).unwrap();
        assert_eq!(s.params().get("gaussian0_sigma").unwrap().min, None);
        let group = s.binding().group("gaussian0_sigma").unwrap();
        assert!(group.min_field().is_disabled());

        s.edit("gaussian0_sigma", ControlEvent::MinEnabled(true)).unwrap();
        let group = s.binding().group("gaussian0_sigma").unwrap();
        assert!(!group.min_field().is_disabled());
        assert_eq!(group.min_field().value(), 0.1);
    }

    #[test]
    fn controls_are_listed_by_name() {
        let mut s = session();
        s.add_component(ModelKind::Linear).unwrap();
        s.add_component(ModelKind::Constant).unwrap();
        s.add_component(ModelKind::Exponential).unwrap();
        let names: Vec<&str> = s.binding().groups().iter().map(ControlGroup::name).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert_eq!(names[0], "constant0_c");
    }

    #[test]
    fn prefix_probing_is_bounded() {
        let config = SessionConfig {
            max_prefix_probes: 2,
            ..SessionConfig::default()
        };
        let mut s = Session::new(series(), config).unwrap();
        s.add_component(ModelKind::Step).unwrap();
        s.add_component(ModelKind::Step).unwrap();
        let err = s.add_component(ModelKind::Step).unwrap_err();
        assert!(matches!(err, SessionError::PrefixExhausted { probes: 2, .. }));
        assert_eq!(s.model().len(), 2);
    }

    #[test]
    fn denied_and_unknown_kinds_are_refused() {
        let mut s = session();
        assert!(matches!(
            s.add_component(ModelKind::Polynomial),
            Err(SessionError::Unsupported(_))
        ));
        assert!(matches!(
            s.add_component_by_name("nope"),
            Err(SessionError::UnknownModel(_))
        ));
        assert_eq!(s.add_component_by_name("GaussianModel").unwrap(), "gaussian0_");
    }

    #[test]
    fn clear_all_is_idempotent() {
        let count = Rc::new(Cell::new(0));
        let mut s = session().with_renderer(Box::new(Counting(Rc::clone(&count))));
        s.add_component(ModelKind::Linear).unwrap();
        s.run().unwrap();

        s.clear_all().unwrap();
        assert!(s.model().is_empty());
        assert!(s.params().is_empty());
        assert!(s.binding().is_empty());
        assert!(s.fit_result().is_none());
        let redraws = count.get();

        s.clear_all().unwrap();
        assert_eq!(count.get(), redraws);
        assert!(s.model().is_empty());
        assert_eq!(s.state(), FitState::Idle);
    }

    #[test]
    fn value_edits_redraw_and_update_constraints() {
        let count = Rc::new(Cell::new(0));
        let mut s = session().with_renderer(Box::new(Counting(Rc::clone(&count))));
        s.add_component(ModelKind::Gaussian).unwrap();
        let after_add = count.get();
        assert_eq!(after_add, 1);

        assert_eq!(
            s.edit("gaussian0_sigma", ControlEvent::Value(2.0)).unwrap(),
            Refresh::Plot
        );
        assert_eq!(count.get(), after_add + 1);
        let fwhm = s.params().value("gaussian0_fwhm").unwrap();
        assert!((fwhm - 2.0 * 2.35482).abs() < 1e-9);
        assert!((s.binding().group("gaussian0_fwhm").unwrap().value() - fwhm).abs() < 1e-12);

        assert_eq!(
            s.edit("gaussian0_sigma", ControlEvent::Vary(false)).unwrap(),
            Refresh::None
        );
        assert_eq!(count.get(), after_add + 1);
    }

    #[test]
    fn out_of_bounds_edits_are_clipped_before_preview() {
        let mut s = session();
        s.add_component(ModelKind::Gaussian).unwrap();
        assert_eq!(s.params().get("gaussian0_sigma").unwrap().min, Some(0.0));

        s.edit("gaussian0_sigma", ControlEvent::Value(-3.0)).unwrap();
        assert_eq!(s.params().value("gaussian0_sigma"), Some(0.0));
        assert_eq!(s.binding().group("gaussian0_sigma").unwrap().value(), 0.0);
        assert_eq!(s.params().value("gaussian0_fwhm"), Some(0.0));

        s.edit("gaussian0_sigma", ControlEvent::Value(2.0)).unwrap();
        assert_eq!(
            s.edit("gaussian0_sigma", ControlEvent::Max(1.5)).unwrap(),
            Refresh::None,
            "max is disabled, so the edit stays in the field"
        );
        s.edit("gaussian0_sigma", ControlEvent::MaxEnabled(true)).unwrap();
        assert_eq!(
            s.edit("gaussian0_sigma", ControlEvent::Max(1.5)).unwrap(),
            Refresh::Plot
        );
        assert_eq!(s.params().value("gaussian0_sigma"), Some(1.5));
        let fwhm = s.params().value("gaussian0_fwhm").unwrap();
        assert!((fwhm - 1.5 * 2.35482).abs() < 1e-9);
    }

    #[test]
    fn value_edits_on_constrained_parameters_are_refused() {
        let mut s = session();
        s.add_component(ModelKind::Gaussian).unwrap();
        let before = s.params().value("gaussian0_fwhm");
        assert!(matches!(
            s.edit("gaussian0_fwhm", ControlEvent::Value(9.0)),
            Err(SessionError::InvalidState(_))
        ));
        assert_eq!(s.params().value("gaussian0_fwhm"), before);

        // Untied, the same edit goes through.
        s.set_expr("gaussian0_fwhm", None).unwrap();
        s.edit("gaussian0_fwhm", ControlEvent::Value(9.0)).unwrap();
        assert_eq!(s.params().value("gaussian0_fwhm"), Some(9.0));
    }

    #[test]
    fn expressions_are_validated() {
        let mut s = session();
        s.add_component(ModelKind::Gaussian).unwrap();
        s.add_component(ModelKind::Gaussian).unwrap();
        assert!(matches!(
            s.set_expr("gaussian1_center", Some("missing + 1")),
            Err(SessionError::Expression(_))
        ));
        s.set_expr("gaussian1_center", Some("gaussian0_center + 1")).unwrap();
        assert!(matches!(
            s.set_expr("gaussian0_center", Some("gaussian1_center - 1")),
            Err(SessionError::Expression(_))
        ));
        assert_eq!(s.params().value("gaussian1_center"), Some(1.0));
        assert!(s.params().get("gaussian0_center").unwrap().expr.is_none());
        assert!(matches!(
            s.set_expr("nope", None),
            Err(SessionError::UnknownParameter(_))
        ));
    }

    #[test]
    fn plot_frame_has_one_curve_per_component() {
        let mut s = session();
        assert!(s.plot_frame().model.is_none());
        s.add_component(ModelKind::Linear).unwrap();
        s.add_component(ModelKind::Constant).unwrap();
        let frame = s.plot_frame();
        assert_eq!(frame.grid.len(), s.config().plot_points);
        assert_eq!(frame.components.len(), 2);
        assert_eq!(frame.components[0].prefix, "linear0_");
        assert!(!frame.fitted);
    }
}
