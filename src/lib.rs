//! `composite-fit` library crate.
//!
//! The binary (`cfit`) is a thin wrapper around this library so that:
//!
//! - the session controller is testable without a terminal
//! - the headless CLI and the TUI share one code path

pub mod app;
pub mod binding;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod registry;
pub mod report;
pub mod session;
pub mod tui;
