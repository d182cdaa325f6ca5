//! `pl-fit` library crate.
//!
//! The binary (`plfit`) is a thin wrapper around this library so that:
//!
//! - the fitting engine is testable without spawning processes
//! - a UI or loader can drive `FitDispatcher` directly
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod math;
pub mod models;
pub mod report;
