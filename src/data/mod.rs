//! Data sources other than user files.

pub mod sample;

pub use sample::{PeakSpec, SampleSpec, generate_sample};
