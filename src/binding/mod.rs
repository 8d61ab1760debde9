//! Parameter binding: one control group per parameter.
//!
//! Controls mirror the backend `Parameter`; edits reach the backend only
//! through [`ControlGroup::handle`], which applies these rules:
//!
//! - `Value(v)` pushes the value and asks for a plot refresh
//! - `Vary(b)` pushes `vary`
//! - `MinEnabled(false)` disables the min field and makes the backend min unbounded
//! - `MinEnabled(true)` re-enables the field without pushing anything; the
//!   backend stays unbounded until the field is edited
//! - `Min(v)` updates the field and pushes only while min is enabled
//!
//! and symmetrically for `max`.

use tracing::debug;

use crate::domain::{Parameter, Parameters};
use crate::error::SessionError;

pub mod controls;

use controls::{
    NumericField, Toggle, lower_from_control, lower_to_control, upper_from_control,
    upper_to_control,
};

/// A single user edit on a control group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlEvent {
    Value(f64),
    Vary(bool),
    MinEnabled(bool),
    Min(f64),
    MaxEnabled(bool),
    Max(f64),
}

/// What the caller must do after an event has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    None,
    Plot,
}

/// Controls for one parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlGroup {
    name: String,
    value: NumericField,
    vary: Toggle,
    min_enabled: Toggle,
    min: NumericField,
    max_enabled: Toggle,
    max: NumericField,
    attached: bool,
}

impl ControlGroup {
    pub fn from_parameter(param: &Parameter) -> Self {
        let min_enabled = lower_from_control(lower_to_control(param.min)).is_some();
        let max_enabled = upper_from_control(upper_to_control(param.max)).is_some();

        let mut min = NumericField::new(lower_to_control(param.min));
        min.set_disabled(!min_enabled);
        let mut max = NumericField::new(upper_to_control(param.max));
        max.set_disabled(!max_enabled);

        Self {
            name: param.name.clone(),
            value: NumericField::new(param.value),
            vary: Toggle::new(param.vary),
            min_enabled: Toggle::new(min_enabled),
            min,
            max_enabled: Toggle::new(max_enabled),
            max,
            attached: true,
        }
    }

    /// Apply one edit to the controls and push it to `param` per the rules above.
    pub fn handle(&mut self, event: ControlEvent, param: &mut Parameter) -> Result<Refresh, SessionError> {
        if !self.attached {
            return Err(SessionError::InvalidState(format!(
                "controls for '{}' have been torn down",
                self.name
            )));
        }
        if param.name != self.name {
            return Err(SessionError::UnknownParameter(param.name.clone()));
        }

        match event {
            ControlEvent::Value(v) => {
                param.value = v;
                param.clip_to_bounds();
                self.value.set_value(param.value);
                return Ok(Refresh::Plot);
            }
            ControlEvent::Vary(vary) => {
                self.vary.set_checked(vary);
                param.set_vary(vary);
            }
            ControlEvent::MinEnabled(enabled) => {
                self.min_enabled.set_checked(enabled);
                self.min.set_disabled(!enabled);
                if !enabled {
                    param.min = None;
                }
                debug!(param = %self.name, enabled, "min bound toggled");
            }
            ControlEvent::Min(v) => {
                self.min.set_value(v);
                if self.min_enabled.is_checked() {
                    param.min = lower_from_control(v);
                    return Ok(self.clip_value(param));
                } else {
                    debug!(param = %self.name, "min edit ignored while disabled");
                }
            }
            ControlEvent::MaxEnabled(enabled) => {
                self.max_enabled.set_checked(enabled);
                self.max.set_disabled(!enabled);
                if !enabled {
                    param.max = None;
                }
                debug!(param = %self.name, enabled, "max bound toggled");
            }
            ControlEvent::Max(v) => {
                self.max.set_value(v);
                if self.max_enabled.is_checked() {
                    param.max = upper_from_control(v);
                    return Ok(self.clip_value(param));
                } else {
                    debug!(param = %self.name, "max edit ignored while disabled");
                }
            }
        }
        Ok(Refresh::None)
    }

    /// A tightened bound may strand the value outside it.
    fn clip_value(&mut self, param: &mut Parameter) -> Refresh {
        if param.clip_to_bounds() {
            debug!(param = %self.name, value = param.value, "value clipped to bounds");
            self.value.set_value(param.value);
            Refresh::Plot
        } else {
            Refresh::None
        }
    }

    /// Mirror the backend's value and vary flag without pushing anything.
    pub fn sync_from(&mut self, param: &Parameter) {
        self.value.set_value(param.value);
        self.vary.set_checked(param.vary);
    }

    /// Detach every control. The backend parameter is never touched.
    pub fn teardown(&mut self) {
        self.attached = false;
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> f64 {
        self.value.value()
    }

    pub fn vary(&self) -> bool {
        self.vary.is_checked()
    }

    pub fn min_enabled(&self) -> bool {
        self.min_enabled.is_checked()
    }

    pub fn max_enabled(&self) -> bool {
        self.max_enabled.is_checked()
    }

    /// The min field, including its disabled state.
    pub fn min_field(&self) -> &NumericField {
        &self.min
    }

    pub fn max_field(&self) -> &NumericField {
        &self.max
    }

    /// Effective lower bound as the controls describe it.
    pub fn min(&self) -> Option<f64> {
        self.min_enabled
            .is_checked()
            .then(|| lower_from_control(self.min.value()))
            .flatten()
    }

    pub fn max(&self) -> Option<f64> {
        self.max_enabled
            .is_checked()
            .then(|| upper_from_control(self.max.value()))
            .flatten()
    }

    pub fn set_value(&mut self, value: f64, param: &mut Parameter) -> Result<Refresh, SessionError> {
        self.handle(ControlEvent::Value(value), param)
    }

    pub fn set_vary(&mut self, vary: bool, param: &mut Parameter) -> Result<Refresh, SessionError> {
        self.handle(ControlEvent::Vary(vary), param)
    }

    /// Enable and set the min bound, or disable it with `None`.
    pub fn set_min(&mut self, min: Option<f64>, param: &mut Parameter) -> Result<Refresh, SessionError> {
        match min {
            Some(v) => {
                self.handle(ControlEvent::MinEnabled(true), param)?;
                self.handle(ControlEvent::Min(v), param)
            }
            None => self.handle(ControlEvent::MinEnabled(false), param),
        }
    }

    pub fn set_max(&mut self, max: Option<f64>, param: &mut Parameter) -> Result<Refresh, SessionError> {
        match max {
            Some(v) => {
                self.handle(ControlEvent::MaxEnabled(true), param)?;
                self.handle(ControlEvent::Max(v), param)
            }
            None => self.handle(ControlEvent::MaxEnabled(false), param),
        }
    }
}

/// Control groups for a whole parameter set, sorted by parameter name.
#[derive(Debug, Clone, Default)]
pub struct ParameterBinding {
    groups: Vec<ControlGroup>,
}

impl ParameterBinding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tear down every group and build one fresh group per parameter.
    pub fn rebuild(&mut self, params: &Parameters) {
        self.clear();
        self.groups = params.iter().map(ControlGroup::from_parameter).collect();
        self.groups.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(groups = self.groups.len(), "parameter binding rebuilt");
    }

    pub fn clear(&mut self) {
        for g in &mut self.groups {
            g.teardown();
        }
        self.groups.clear();
    }

    /// Route an edit to the group for `name` and push it into `params`.
    pub fn dispatch(
        &mut self,
        name: &str,
        event: ControlEvent,
        params: &mut Parameters,
    ) -> Result<Refresh, SessionError> {
        let group = self
            .groups
            .iter_mut()
            .find(|g| g.name == name)
            .ok_or_else(|| SessionError::UnknownParameter(name.to_string()))?;
        let param = params
            .get_mut(name)
            .ok_or_else(|| SessionError::UnknownParameter(name.to_string()))?;
        group.handle(event, param)
    }

    /// Mirror backend values into every group.
    pub fn sync_from(&mut self, params: &Parameters) {
        for g in &mut self.groups {
            if let Some(p) = params.get(&g.name) {
                g.sync_from(p);
            }
        }
    }

    pub fn groups(&self) -> &[ControlGroup] {
        &self.groups
    }

    pub fn group(&self, name: &str) -> Option<&ControlGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sigma(min: Option<f64>) -> Parameter {
        Parameter::new("g0_sigma", 1.0).with_bounds(min, None)
    }

    #[test]
    fn initial_state_mirrors_bounds() {
        let g = ControlGroup::from_parameter(&sigma(Some(0.1)));
        assert!(g.min_enabled());
        assert!(!g.min_field().is_disabled());
        assert_eq!(g.min(), Some(0.1));
        assert!(!g.max_enabled());
        assert!(g.max_field().is_disabled());
        assert_eq!(g.max_field().value(), f64::INFINITY);
        assert_eq!(g.max(), None);
    }

    #[test]
    fn disabling_min_unbounds_backend_and_reenabling_keeps_stale_value() {
        let mut p = sigma(Some(0.1));
        let mut g = ControlGroup::from_parameter(&p);

        g.handle(ControlEvent::MinEnabled(false), &mut p).unwrap();
        assert_eq!(p.min, None);
        assert!(g.min_field().is_disabled());

        g.handle(ControlEvent::MinEnabled(true), &mut p).unwrap();
        assert!(!g.min_field().is_disabled());
        assert_eq!(g.min_field().value(), 0.1);
        assert_eq!(p.min, None, "re-enabling alone does not push");

        g.handle(ControlEvent::Min(0.2), &mut p).unwrap();
        assert_eq!(p.min, Some(0.2));
    }

    #[test]
    fn bound_edits_while_disabled_do_not_reach_backend() {
        let mut p = sigma(None);
        let mut g = ControlGroup::from_parameter(&p);
        assert!(!g.min_enabled());

        g.handle(ControlEvent::Min(5.0), &mut p).unwrap();
        assert_eq!(p.min, None);
        assert_eq!(g.min_field().value(), 5.0);

        g.handle(ControlEvent::MaxEnabled(true), &mut p).unwrap();
        g.handle(ControlEvent::Max(9.0), &mut p).unwrap();
        assert_eq!(p.max, Some(9.0));
        g.handle(ControlEvent::MaxEnabled(false), &mut p).unwrap();
        assert_eq!(p.max, None);
    }

    #[test]
    fn value_edits_request_a_refresh() {
        let mut p = sigma(None);
        let mut g = ControlGroup::from_parameter(&p);
        assert_eq!(g.set_value(2.5, &mut p).unwrap(), Refresh::Plot);
        assert_eq!(p.value, 2.5);
        assert_eq!(g.set_vary(false, &mut p).unwrap(), Refresh::None);
        assert!(!p.vary);
    }

    #[test]
    fn vary_clears_an_expression() {
        let mut p = Parameter::new("g0_fwhm", 0.0).with_expr("2*g0_sigma");
        let mut g = ControlGroup::from_parameter(&p);
        assert!(!g.vary());
        g.handle(ControlEvent::Vary(true), &mut p).unwrap();
        assert!(p.vary);
        assert_eq!(p.expr, None);
    }

    #[test]
    fn teardown_never_touches_backend() {
        let mut p = sigma(Some(0.1));
        let before = p.clone();
        let mut g = ControlGroup::from_parameter(&p);
        assert!(g.is_attached());
        g.teardown();
        assert!(!g.is_attached());
        assert_eq!(p, before);
        assert!(g.handle(ControlEvent::Value(3.0), &mut p).is_err());
        assert_eq!(p, before);
    }

    #[test]
    fn groups_are_sorted_by_name() {
        let mut params = Parameters::new();
        for name in ["l0_slope", "g1_center", "g0_sigma", "a_c"] {
            params.insert(Parameter::new(name, 0.0));
        }
        let mut binding = ParameterBinding::new();
        binding.rebuild(&params);
        let names: Vec<&str> = binding.groups().iter().map(ControlGroup::name).collect();
        assert_eq!(names, vec!["a_c", "g0_sigma", "g1_center", "l0_slope"]);

        let refresh = binding
            .dispatch("g1_center", ControlEvent::Value(4.0), &mut params)
            .unwrap();
        assert_eq!(refresh, Refresh::Plot);
        assert_eq!(params.value("g1_center"), Some(4.0));
        assert!(matches!(
            binding.dispatch("missing", ControlEvent::Vary(false), &mut params),
            Err(SessionError::UnknownParameter(_))
        ));
    }

    #[test]
    fn pushed_values_stay_inside_bounds() {
        let mut p = sigma(Some(0.0));
        let mut g = ControlGroup::from_parameter(&p);

        assert_eq!(g.set_value(-3.0, &mut p).unwrap(), Refresh::Plot);
        assert_eq!(p.value, 0.0);
        assert_eq!(g.value(), 0.0);

        g.set_value(4.0, &mut p).unwrap();
        assert_eq!(g.set_max(Some(2.5), &mut p).unwrap(), Refresh::Plot);
        assert_eq!(p.value, 2.5);
        assert_eq!(g.value(), 2.5);

        // Loosening a bound leaves the value alone.
        assert_eq!(g.set_max(Some(10.0), &mut p).unwrap(), Refresh::None);
        assert_eq!(p.value, 2.5);

        assert_eq!(g.set_min(Some(3.0), &mut p).unwrap(), Refresh::Plot);
        assert_eq!(p.value, 3.0);
    }

    #[test]
    fn set_min_and_set_max_toggle_and_push() {
        let mut p = sigma(None);
        let mut g = ControlGroup::from_parameter(&p);

        g.set_min(Some(0.5), &mut p).unwrap();
        assert!(g.min_enabled());
        assert!(!g.min_field().is_disabled());
        assert_eq!(p.min, Some(0.5));
        assert_eq!(g.min(), Some(0.5));

        g.set_min(None, &mut p).unwrap();
        assert!(!g.min_enabled());
        assert!(g.min_field().is_disabled());
        assert_eq!(p.min, None);

        g.set_max(Some(8.0), &mut p).unwrap();
        assert!(g.max_enabled());
        assert!(!g.max_field().is_disabled());
        assert_eq!(p.max, Some(8.0));
        assert_eq!(g.max(), Some(8.0));

        g.set_max(None, &mut p).unwrap();
        assert!(!g.max_enabled());
        assert!(g.max_field().is_disabled());
        assert_eq!(p.max, None);
        assert_eq!(p.value, 1.0);
    }

    #[test]
    fn sync_mirrors_backend_values() {
        let mut params = Parameters::new();
        params.insert(Parameter::new("c0_c", 1.0));
        let mut binding = ParameterBinding::new();
        binding.rebuild(&params);
        params.get_mut("c0_c").unwrap().value = 7.0;
        binding.sync_from(&params);
        assert_eq!(binding.group("c0_c").unwrap().value(), 7.0);
    }
}
