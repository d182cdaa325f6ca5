//! Domain types used throughout the engine.
//!
//! This module defines:
//!
//! - fit configuration (`FitConfig`, `PeakSpec`, `BackgroundSpec`, `BoundsPolicy`)
//! - the input series (`SpectrumSeries`)
//! - structured parameter identities (`ParamId`) and per-spectrum outputs (`FitResult`)

pub mod types;

pub use types::*;
