//! Mathematical utilities: lineshapes, linear least squares, constraint expressions.

pub mod expr;
pub mod lineshape;
pub mod ols;

pub use ols::*;
