//! Component kinds and their parameter declarations.
//!
//! Each kind declares:
//! - its independent parameters (default value + optional bounds), in the
//!   order the formula consumes them
//! - derived parameters, written as constraint expressions over the
//!   independent ones (`{p}` stands for the component prefix)

use serde::{Deserialize, Serialize};

use crate::math::lineshape;

/// A parametric curve family in the component library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Constant,
    Linear,
    Quadratic,
    Polynomial,
    Exponential,
    PowerLaw,
    Gaussian,
    Lorentzian,
    SplitLorentzian,
    PseudoVoigt,
    Step,
    Rectangle,
}

/// Declared independent parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamHint {
    pub name: &'static str,
    pub value: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Declared derived parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedHint {
    pub name: &'static str,
    pub expr: &'static str,
}

const fn free(name: &'static str, value: f64) -> ParamHint {
    ParamHint {
        name,
        value,
        min: None,
        max: None,
    }
}

const fn bounded(name: &'static str, value: f64, min: Option<f64>, max: Option<f64>) -> ParamHint {
    ParamHint {
        name,
        value,
        min,
        max,
    }
}

const fn derived(name: &'static str, expr: &'static str) -> DerivedHint {
    DerivedHint { name, expr }
}

const CONSTANT: &[ParamHint] = &[free("c", 0.0)];
const LINEAR: &[ParamHint] = &[free("slope", 1.0), free("intercept", 0.0)];
const QUADRATIC: &[ParamHint] = &[free("a", 0.0), free("b", 0.0), free("c", 0.0)];
const POLYNOMIAL: &[ParamHint] = &[
    free("c0", 0.0),
    free("c1", 0.0),
    free("c2", 0.0),
    free("c3", 0.0),
    free("c4", 0.0),
    free("c5", 0.0),
    free("c6", 0.0),
    free("c7", 0.0),
];
const EXPONENTIAL: &[ParamHint] = &[free("amplitude", 1.0), free("decay", 1.0)];
const POWERLAW: &[ParamHint] = &[free("amplitude", 1.0), free("exponent", 1.0)];
const PEAK: &[ParamHint] = &[
    free("amplitude", 1.0),
    free("center", 0.0),
    bounded("sigma", 1.0, Some(0.0), None),
];
const SPLIT_LORENTZIAN: &[ParamHint] = &[
    free("amplitude", 1.0),
    free("center", 0.0),
    bounded("sigma", 1.0, Some(0.0), None),
    bounded("sigma_r", 1.0, Some(0.0), None),
];
const PSEUDO_VOIGT: &[ParamHint] = &[
    free("amplitude", 1.0),
    free("center", 0.0),
    bounded("sigma", 1.0, Some(0.0), None),
    bounded("fraction", 0.5, Some(0.0), Some(1.0)),
];
const STEP: &[ParamHint] = &[free("amplitude", 1.0), free("center", 0.0), free("sigma", 1.0)];
const RECTANGLE: &[ParamHint] = &[
    free("amplitude", 1.0),
    free("center1", 0.0),
    free("sigma1", 1.0),
    free("center2", 1.0),
    free("sigma2", 1.0),
];

const GAUSSIAN_DERIVED: &[DerivedHint] = &[
    derived("fwhm", "2.3548200*{p}sigma"),
    derived("height", "0.3989423*{p}amplitude/max(1e-15, {p}sigma)"),
];
const LORENTZIAN_DERIVED: &[DerivedHint] = &[
    derived("fwhm", "2.0000000*{p}sigma"),
    derived("height", "0.3183099*{p}amplitude/max(1e-15, {p}sigma)"),
];
const SPLIT_LORENTZIAN_DERIVED: &[DerivedHint] = &[
    derived("fwhm", "{p}sigma+{p}sigma_r"),
    derived("height", "2*{p}amplitude/(pi*max(1e-15, {p}sigma+{p}sigma_r))"),
];
const PSEUDO_VOIGT_DERIVED: &[DerivedHint] = &[
    derived("fwhm", "2.0000000*{p}sigma"),
    derived(
        "height",
        "(((1-{p}fraction)*{p}amplitude)/max(1e-15, ({p}sigma/sqrt(log(2)))*sqrt(pi)) + ({p}fraction*{p}amplitude)/max(1e-15, pi*{p}sigma))",
    ),
];
const RECTANGLE_DERIVED: &[DerivedHint] = &[derived("midpoint", "({p}center1+{p}center2)/2.0")];

impl ModelKind {
    pub const ALL: [ModelKind; 12] = [
        ModelKind::Constant,
        ModelKind::Linear,
        ModelKind::Quadratic,
        ModelKind::Polynomial,
        ModelKind::Exponential,
        ModelKind::PowerLaw,
        ModelKind::Gaussian,
        ModelKind::Lorentzian,
        ModelKind::SplitLorentzian,
        ModelKind::PseudoVoigt,
        ModelKind::Step,
        ModelKind::Rectangle,
    ];

    /// Human-readable label for pickers and listings.
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::Constant => "Constant",
            ModelKind::Linear => "Linear",
            ModelKind::Quadratic => "Quadratic",
            ModelKind::Polynomial => "Polynomial",
            ModelKind::Exponential => "Exponential",
            ModelKind::PowerLaw => "PowerLaw",
            ModelKind::Gaussian => "Gaussian",
            ModelKind::Lorentzian => "Lorentzian",
            ModelKind::SplitLorentzian => "SplitLorentzian",
            ModelKind::PseudoVoigt => "PseudoVoigt",
            ModelKind::Step => "Step",
            ModelKind::Rectangle => "Rectangle",
        }
    }

    /// Name of the underlying formula; also the base of generated prefixes.
    pub fn canonical_name(self) -> &'static str {
        match self {
            ModelKind::Constant => "constant",
            ModelKind::Linear => "linear",
            ModelKind::Quadratic => "parabolic",
            ModelKind::Polynomial => "polynomial",
            ModelKind::Exponential => "exponential",
            ModelKind::PowerLaw => "powerlaw",
            ModelKind::Gaussian => "gaussian",
            ModelKind::Lorentzian => "lorentzian",
            ModelKind::SplitLorentzian => "split_lorentzian",
            ModelKind::PseudoVoigt => "pvoigt",
            ModelKind::Step => "step",
            ModelKind::Rectangle => "rectangle",
        }
    }

    pub fn params(self) -> &'static [ParamHint] {
        match self {
            ModelKind::Constant => CONSTANT,
            ModelKind::Linear => LINEAR,
            ModelKind::Quadratic => QUADRATIC,
            ModelKind::Polynomial => POLYNOMIAL,
            ModelKind::Exponential => EXPONENTIAL,
            ModelKind::PowerLaw => POWERLAW,
            ModelKind::Gaussian | ModelKind::Lorentzian => PEAK,
            ModelKind::SplitLorentzian => SPLIT_LORENTZIAN,
            ModelKind::PseudoVoigt => PSEUDO_VOIGT,
            ModelKind::Step => STEP,
            ModelKind::Rectangle => RECTANGLE,
        }
    }

    pub fn derived(self) -> &'static [DerivedHint] {
        match self {
            ModelKind::Gaussian => GAUSSIAN_DERIVED,
            ModelKind::Lorentzian => LORENTZIAN_DERIVED,
            ModelKind::SplitLorentzian => SPLIT_LORENTZIAN_DERIVED,
            ModelKind::PseudoVoigt => PSEUDO_VOIGT_DERIVED,
            ModelKind::Rectangle => RECTANGLE_DERIVED,
            _ => &[],
        }
    }

    /// Evaluate at `x` with independent parameter values `v` (in `params()` order).
    ///
    /// # Panics
    /// Panics if `v` is shorter than `self.params()`. Callers build `v` from
    /// the declaration.
    pub fn eval_point(self, x: f64, v: &[f64]) -> f64 {
        match self {
            ModelKind::Constant => v[0],
            ModelKind::Linear => v[0] * x + v[1],
            ModelKind::Quadratic => v[0] * x * x + v[1] * x + v[2],
            ModelKind::Polynomial => lineshape::polynomial(x, v),
            ModelKind::Exponential => lineshape::exponential(x, v[0], v[1]),
            ModelKind::PowerLaw => lineshape::powerlaw(x, v[0], v[1]),
            ModelKind::Gaussian => lineshape::gaussian(x, v[0], v[1], v[2]),
            ModelKind::Lorentzian => lineshape::lorentzian(x, v[0], v[1], v[2]),
            ModelKind::SplitLorentzian => lineshape::split_lorentzian(x, v[0], v[1], v[2], v[3]),
            ModelKind::PseudoVoigt => lineshape::pseudo_voigt(x, v[0], v[1], v[2], v[3]),
            ModelKind::Step => lineshape::step(x, v[0], v[1], v[2]),
            ModelKind::Rectangle => lineshape::rectangle(x, v[0], v[1], v[2], v[3], v[4]),
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}
