//! Prefixed component instances and their summation.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::domain::{Parameter, Parameters};
use crate::error::ModelError;
use crate::models::guess::guess_values;
use crate::models::kind::ModelKind;

/// One instance of a [`ModelKind`]; its parameters are namespaced by `prefix`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    kind: ModelKind,
    prefix: String,
}

impl Component {
    pub fn new(kind: ModelKind, prefix: impl Into<String>) -> Self {
        Self {
            kind,
            prefix: prefix.into(),
        }
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// e.g. `Model(gaussian, prefix='gaussian0_')`.
    pub fn name(&self) -> String {
        format!("Model({}, prefix='{}')", self.kind.canonical_name(), self.prefix)
    }

    /// All parameter names (independent then derived), prefixed.
    pub fn param_names(&self) -> Vec<String> {
        self.kind
            .params()
            .iter()
            .map(|h| h.name)
            .chain(self.kind.derived().iter().map(|d| d.name))
            .map(|n| format!("{}{n}", self.prefix))
            .collect()
    }

    /// Default parameters. Derived values are left at zero until
    /// `Parameters::update_constraints` runs.
    pub fn make_params(&self) -> Parameters {
        let mut out = Parameters::new();
        for hint in self.kind.params() {
            out.insert(
                Parameter::new(format!("{}{}", self.prefix, hint.name), hint.value)
                    .with_bounds(hint.min, hint.max),
            );
        }
        for d in self.kind.derived() {
            out.insert(
                Parameter::new(format!("{}{}", self.prefix, d.name), 0.0)
                    .with_expr(d.expr.replace("{p}", &self.prefix)),
            );
        }
        out
    }

    fn values(&self, params: &Parameters) -> Result<Vec<f64>, ModelError> {
        self.kind
            .params()
            .iter()
            .map(|h| {
                let name = format!("{}{}", self.prefix, h.name);
                params
                    .value(&name)
                    .ok_or(ModelError::MissingParameter { name })
            })
            .collect()
    }

    pub fn eval(&self, params: &Parameters, x: &[f64]) -> Result<Vec<f64>, ModelError> {
        let v = self.values(params)?;
        Ok(x.iter().map(|&xi| self.kind.eval_point(xi, &v)).collect())
    }

    /// Heuristic starting values from data, or `None` when the data is too thin.
    pub fn guess(&self, data: &[f64], x: &[f64]) -> Option<Parameters> {
        let guessed = guess_values(self.kind, data, x)?;
        let mut out = self.make_params();
        for (name, value) in guessed {
            if let Some(p) = out.get_mut(&format!("{}{name}", self.prefix)) {
                p.value = value;
            }
        }
        Some(out)
    }
}

/// Ordered sum of components with pairwise-distinct prefixes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeModel {
    components: Vec<Component>,
}

impl CompositeModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Sum `self + component`, refusing a prefix already in use or any
    /// duplicate parameter name.
    pub fn combine(&self, component: Component) -> Result<CompositeModel, ModelError> {
        if self.components.iter().any(|c| c.prefix() == component.prefix()) {
            return Err(ModelError::DuplicatePrefix {
                prefix: component.prefix().to_string(),
            });
        }
        let existing: BTreeSet<String> = self.param_names().into_iter().collect();
        if let Some(name) = component
            .param_names()
            .into_iter()
            .find(|n| existing.contains(n))
        {
            return Err(ModelError::NameCollision { name });
        }
        let mut components = self.components.clone();
        components.push(component);
        Ok(CompositeModel { components })
    }

    pub fn param_names(&self) -> Vec<String> {
        self.components.iter().flat_map(Component::param_names).collect()
    }

    pub fn make_params(&self) -> Parameters {
        let mut out = Parameters::new();
        for c in &self.components {
            for p in c.make_params().iter() {
                out.insert(p.clone());
            }
        }
        out
    }

    /// Sum of all components; all zeros for the empty model.
    pub fn eval(&self, params: &Parameters, x: &[f64]) -> Result<Vec<f64>, ModelError> {
        let mut total = vec![0.0; x.len()];
        for c in &self.components {
            for (t, v) in total.iter_mut().zip(c.eval(params, x)?) {
                *t += v;
            }
        }
        Ok(total)
    }

    /// One curve per component, keyed by prefix, in insertion order.
    pub fn eval_components(
        &self,
        params: &Parameters,
        x: &[f64],
    ) -> Result<Vec<(String, Vec<f64>)>, ModelError> {
        self.components
            .iter()
            .map(|c| Ok((c.prefix().to_string(), c.eval(params, x)?)))
            .collect()
    }

    /// Only single-component models offer a guess.
    pub fn guess(&self, data: &[f64], x: &[f64]) -> Option<Parameters> {
        match self.components.as_slice() {
            [only] => only.guess(data, x),
            _ => None,
        }
    }

    /// `(A + B + ...)`, a bare component name, or `<empty>`.
    pub fn name(&self) -> String {
        match self.components.as_slice() {
            [] => "<empty>".to_string(),
            [only] => only.name(),
            many => {
                let parts: Vec<String> = many.iter().map(Component::name).collect();
                format!("({})", parts.join(" + "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_params_includes_derived_constraints() {
        let c = Component::new(ModelKind::Gaussian, "g0_");
        let params = c.make_params();
        let names: Vec<&str> = params.names().collect();
        assert_eq!(
            names,
            vec!["g0_amplitude", "g0_center", "g0_fwhm", "g0_height", "g0_sigma"]
        );
        assert_eq!(params.get("g0_sigma").unwrap().min, Some(0.0));
        let fwhm = params.get("g0_fwhm").unwrap();
        assert_eq!(fwhm.expr.as_deref(), Some("2.3548200*g0_sigma"));
        assert!(!fwhm.vary);
    }

    #[test]
    fn combine_rejects_shared_prefix() {
        let model = CompositeModel::new()
            .combine(Component::new(ModelKind::Gaussian, "p0_"))
            .unwrap();
        let err = model
            .combine(Component::new(ModelKind::Lorentzian, "p0_"))
            .unwrap_err();
        assert!(matches!(err, ModelError::DuplicatePrefix { .. }));

        let ok = model.combine(Component::new(ModelKind::Lorentzian, "p1_")).unwrap();
        assert_eq!(ok.len(), 2);
        assert_eq!(model.len(), 1, "combine must not mutate the receiver");
    }

    #[test]
    fn combine_rejects_shared_prefix_without_shared_names() {
        let model = CompositeModel::new()
            .combine(Component::new(ModelKind::Constant, "p0_"))
            .unwrap();
        let err = model
            .combine(Component::new(ModelKind::Linear, "p0_"))
            .unwrap_err();
        assert_eq!(
            err,
            ModelError::DuplicatePrefix {
                prefix: "p0_".to_string()
            }
        );
    }

    #[test]
    fn combine_rejects_name_overlap_across_prefixes() {
        // "" + "sigma" and "sigm" + "a" spell the same name.
        let model = CompositeModel::new()
            .combine(Component::new(ModelKind::Gaussian, ""))
            .unwrap();
        let err = model
            .combine(Component::new(ModelKind::Quadratic, "sigm"))
            .unwrap_err();
        assert_eq!(
            err,
            ModelError::NameCollision {
                name: "sigma".to_string()
            }
        );
    }

    #[test]
    fn eval_sums_components() {
        let model = CompositeModel::new()
            .combine(Component::new(ModelKind::Constant, "c0_"))
            .unwrap()
            .combine(Component::new(ModelKind::Linear, "l0_"))
            .unwrap();
        let mut params = model.make_params();
        params.get_mut("c0_c").unwrap().value = 2.0;
        params.get_mut("l0_slope").unwrap().value = 3.0;

        let x = [0.0, 1.0, 2.0];
        assert_eq!(model.eval(&params, &x).unwrap(), vec![2.0, 5.0, 8.0]);

        let parts = model.eval_components(&params, &x).unwrap();
        assert_eq!(parts[0], ("c0_".to_string(), vec![2.0, 2.0, 2.0]));
        assert_eq!(parts[1], ("l0_".to_string(), vec![0.0, 3.0, 6.0]));
    }

    #[test]
    fn eval_reports_missing_parameters() {
        let model = CompositeModel::new()
            .combine(Component::new(ModelKind::Constant, "c0_"))
            .unwrap();
        let err = model.eval(&Parameters::new(), &[0.0]).unwrap_err();
        assert_eq!(
            err,
            ModelError::MissingParameter {
                name: "c0_c".to_string()
            }
        );
    }

    #[test]
    fn empty_model_evaluates_to_zero() {
        let model = CompositeModel::new();
        assert_eq!(model.eval(&Parameters::new(), &[1.0, 2.0]).unwrap(), vec![0.0, 0.0]);
        assert_eq!(model.name(), "<empty>");
    }

    #[test]
    fn guess_only_for_single_component() {
        let x: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|&v| 2.0 * v + 1.0).collect();

        let single = CompositeModel::new()
            .combine(Component::new(ModelKind::Linear, "l0_"))
            .unwrap();
        let guessed = single.guess(&y, &x).unwrap();
        assert!((guessed.value("l0_slope").unwrap() - 2.0).abs() < 1e-9);
        assert!((guessed.value("l0_intercept").unwrap() - 1.0).abs() < 1e-9);

        let double = single
            .combine(Component::new(ModelKind::Constant, "c0_"))
            .unwrap();
        assert!(double.guess(&y, &x).is_none());
    }
}
