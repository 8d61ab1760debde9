//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory by the session and the optimizer
//! - exported to JSON/CSV
//! - reloaded later for plotting or comparisons

use std::collections::BTreeMap;
use std::collections::btree_map;

use serde::{Deserialize, Serialize};

use crate::fit::FitOptions;
use crate::math::expr::{Expr, ExprError, is_builtin_name};

/// A named, boundable, optionally fixed scalar consumed by the optimizer.
///
/// Bounds are `None` when unbounded. The ±∞ sentinel only exists at the
/// control boundary (see `binding`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Full name including the component prefix, e.g. `gaussian0_sigma`.
    pub name: String,
    /// Current value. Kept inside `[min, max]` when edited through the controls.
    pub value: f64,
    /// Lower bound; `None` is unbounded.
    pub min: Option<f64>,
    /// Upper bound; `None` is unbounded.
    pub max: Option<f64>,
    /// Whether the optimizer may change this parameter.
    pub vary: bool,
    /// Constraint expression over other parameter names. When set, the value
    /// is computed from it and `vary` is false.
    pub expr: Option<String>,
    /// Standard error. Populated only by a fit.
    pub stderr: Option<f64>,
    /// Grid step for brute-force searches. Carried with the user state but
    /// unused by the Levenberg-Marquardt optimizer.
    pub brute_step: Option<f64>,
}

impl Parameter {
    /// Unbounded, varying, unconstrained parameter.
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            min: None,
            max: None,
            vary: true,
            expr: None,
            stderr: None,
            brute_step: None,
        }
    }

    /// Builder form of setting both bounds.
    pub fn with_bounds(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// Builder form of [`Parameter::set_expr`].
    pub fn with_expr(mut self, expr: impl Into<String>) -> Self {
        self.set_expr(Some(expr.into()));
        self
    }

    /// Allowing a parameter to vary drops any constraint expression.
    pub fn set_vary(&mut self, vary: bool) {
        self.vary = vary;
        if vary {
            self.expr = None;
        }
    }

    /// A constrained parameter is never varied directly by the optimizer.
    pub fn set_expr(&mut self, expr: Option<String>) {
        if expr.is_some() {
            self.vary = false;
        }
        self.expr = expr;
    }

    /// Pull `value` back inside `[min, max]`; `true` when it moved.
    pub fn clip_to_bounds(&mut self) -> bool {
        let before = self.value;
        if let Some(hi) = self.max {
            if self.value > hi {
                self.value = hi;
            }
        }
        if let Some(lo) = self.min {
            if self.value < lo {
                self.value = lo;
            }
        }
        self.value != before
    }

    /// `true` when the value comes from an expression.
    pub fn is_constrained(&self) -> bool {
        self.expr.is_some()
    }

    /// Free for the optimizer: varying and not tied to an expression.
    pub fn is_free(&self) -> bool {
        self.vary && self.expr.is_none()
    }

    /// Copy user-editable state from `other` (uncertainty is not carried).
    pub fn update_from(&mut self, other: &Parameter) {
        self.value = other.value;
        self.vary = other.vary;
        self.min = other.min;
        self.max = other.max;
        self.expr = other.expr.clone();
        self.brute_step = other.brute_step;
    }
}

/// Mapping from parameter name to [`Parameter`], iterated in name order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters(BTreeMap<String, Parameter>);

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace by name.
    pub fn insert(&mut self, param: Parameter) {
        self.0.insert(param.name.clone(), param);
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.0.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.0.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Parameters in name order.
    pub fn iter(&self) -> btree_map::Values<'_, String, Parameter> {
        self.0.values()
    }

    pub fn iter_mut(&mut self) -> btree_map::ValuesMut<'_, String, Parameter> {
        self.0.values_mut()
    }

    /// Value of `name`, if present.
    pub fn value(&self, name: &str) -> Option<f64> {
        self.0.get(name).map(|p| p.value)
    }

    /// For every name present in both sets, copy `previous`'s user state into `self`.
    ///
    /// Names only in `self` keep their defaults; names only in `previous` are dropped.
    pub fn merge_from(&mut self, previous: &Parameters) -> usize {
        let mut carried = 0;
        for (name, param) in self.0.iter_mut() {
            if let Some(old) = previous.get(name) {
                param.update_from(old);
                carried += 1;
            }
        }
        carried
    }

    /// Re-evaluate every constrained parameter from the current values.
    ///
    /// Expressions may reference other constrained parameters; they are
    /// resolved in dependency order.
    pub fn update_constraints(&mut self) -> Result<(), ExprError> {
        let mut pending: Vec<(String, Expr)> = Vec::new();
        let mut resolved: BTreeMap<String, f64> = BTreeMap::new();
        for p in self.0.values() {
            match &p.expr {
                Some(src) => pending.push((p.name.clone(), Expr::parse(src)?)),
                None => {
                    resolved.insert(p.name.clone(), p.value);
                }
            }
        }

        while !pending.is_empty() {
            let before = pending.len();
            let mut i = 0;
            while i < pending.len() {
                let ready = pending[i]
                    .1
                    .names()
                    .iter()
                    .all(|n| resolved.contains_key(n) || (!self.0.contains_key(n) && is_builtin_name(n)));
                if ready {
                    let (name, expr) = pending.swap_remove(i);
                    let value = expr.eval(&|n: &str| resolved.get(n).copied())?;
                    resolved.insert(name, value);
                } else {
                    i += 1;
                }
            }

            if pending.len() == before {
                // Nothing resolved this round: either a dangling reference or a cycle.
                for (_, expr) in &pending {
                    for dep in expr.names() {
                        if !self.0.contains_key(&dep) && !is_builtin_name(&dep) {
                            return Err(ExprError::UnknownName(dep));
                        }
                    }
                }
                let mut names: Vec<&String> = pending.iter().map(|(n, _)| n).collect();
                names.sort();
                return Err(ExprError::Cycle(names[0].clone()));
            }
        }

        for (name, value) in resolved {
            if let Some(p) = self.0.get_mut(&name) {
                p.value = value;
            }
        }
        Ok(())
    }

    /// Check that `expr` parses and only references known names.
    pub fn validate_expr(&self, expr: &str) -> Result<Expr, ExprError> {
        let parsed = Expr::parse(expr)?;
        for dep in parsed.names() {
            if !self.0.contains_key(&dep) && !is_builtin_name(&dep) {
                return Err(ExprError::UnknownName(dep));
            }
        }
        Ok(parsed)
    }
}

impl<'a> IntoIterator for &'a Parameters {
    type Item = &'a Parameter;
    type IntoIter = btree_map::Values<'a, String, Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.values()
    }
}

/// Observed series: `y` values at abscissae `x`.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSeries {
    /// Independent variable, one entry per observation.
    pub x: Vec<f64>,
    /// Observed values; same length as `x`.
    pub y: Vec<f64>,
}

impl DataSeries {
    /// Number of observations.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// `(min, max)` of `x`, or `None` for an empty or degenerate series.
    pub fn x_range(&self) -> Option<(f64, f64)> {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for &v in &self.x {
            lo = lo.min(v);
            hi = hi.max(v);
        }
        if lo.is_finite() && hi.is_finite() && hi >= lo {
            Some((lo, hi))
        } else {
            None
        }
    }
}

/// Session-wide settings.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Upper bound on prefix suffixes tried per `add_component`.
    pub max_prefix_probes: usize,
    /// Number of grid points used for plotted model curves.
    pub plot_points: usize,
    /// Options handed to the optimizer for every fit.
    pub fit: FitOptions,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_prefix_probes: 10_000,
            plot_points: 1000,
            fit: FitOptions::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(list: Vec<Parameter>) -> Parameters {
        let mut out = Parameters::new();
        for p in list {
            out.insert(p);
        }
        out
    }

    #[test]
    fn vary_and_expr_are_mutually_informative() {
        let mut p = Parameter::new("a", 1.0).with_expr("2*b");
        assert!(!p.vary);
        assert!(p.is_constrained());
        p.set_vary(true);
        assert!(p.expr.is_none());
        assert!(p.is_free());
    }

    #[test]
    fn merge_copies_user_state_but_not_stderr() {
        let mut old = Parameter::new("g0_sigma", 2.5).with_bounds(Some(0.1), Some(9.0));
        old.vary = false;
        old.stderr = Some(0.3);
        old.brute_step = Some(0.05);
        let previous = params(vec![old, Parameter::new("gone", 1.0)]);

        let mut fresh = params(vec![Parameter::new("g0_sigma", 1.0), Parameter::new("g1_sigma", 1.0)]);
        let carried = fresh.merge_from(&previous);

        assert_eq!(carried, 1);
        let p = fresh.get("g0_sigma").unwrap();
        assert_eq!(p.value, 2.5);
        assert!(!p.vary);
        assert_eq!(p.min, Some(0.1));
        assert_eq!(p.max, Some(9.0));
        assert_eq!(p.brute_step, Some(0.05));
        assert_eq!(p.stderr, None);
        assert_eq!(fresh.get("g1_sigma").unwrap().value, 1.0);
        assert!(!fresh.contains("gone"));
    }

    #[test]
    fn constraints_resolve_in_dependency_order() {
        let mut set = params(vec![
            Parameter::new("a", 2.0),
            Parameter::new("c", 0.0).with_expr("b + 1"),
            Parameter::new("b", 0.0).with_expr("3*a"),
        ]);
        set.update_constraints().unwrap();
        assert_eq!(set.value("b"), Some(6.0));
        assert_eq!(set.value("c"), Some(7.0));
    }

    #[test]
    fn constraint_cycles_and_dangling_names_are_reported() {
        let mut cyc = params(vec![
            Parameter::new("a", 0.0).with_expr("b"),
            Parameter::new("b", 0.0).with_expr("a"),
        ]);
        assert_eq!(cyc.update_constraints(), Err(ExprError::Cycle("a".to_string())));

        let mut dangling = params(vec![Parameter::new("a", 0.0).with_expr("zzz * 2")]);
        assert_eq!(
            dangling.update_constraints(),
            Err(ExprError::UnknownName("zzz".to_string()))
        );
    }

    #[test]
    fn iteration_is_name_ordered() {
        let set = params(vec![
            Parameter::new("z", 0.0),
            Parameter::new("a", 0.0),
            Parameter::new("m", 0.0),
        ]);
        let names: Vec<&str> = set.names().collect();
        assert_eq!(names, vec!["a", "m", "z"]);
    }
}
