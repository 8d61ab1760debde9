//! Domain types used throughout the session.
//!
//! This module defines:
//!
//! - parameters and parameter sets (`Parameter`, `Parameters`)
//! - the observed data series (`DataSeries`)
//! - session configuration (`SessionConfig`)

pub mod types;

pub use types::*;
