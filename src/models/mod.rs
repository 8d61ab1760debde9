//! Component model library.
//!
//! Formulas live in `math::lineshape`; this module attaches parameter
//! declarations, prefixing, summation and initial guesses to them so that
//! session and fitting code can stay generic over the component kind.

pub mod component;
pub mod guess;
pub mod kind;

pub use component::{Component, CompositeModel};
pub use kind::{DerivedHint, ModelKind, ParamHint};
