//! Input data for the fitting engine.

pub mod synthetic;

pub use synthetic::*;
