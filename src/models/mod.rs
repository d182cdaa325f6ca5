//! Composite spectral models.
//!
//! - `shapes`: peak and background line shapes
//! - `model`: additive composite model and bounded parameter set
//! - `builder`: `FitConfig` → model + initial parameters
//! - `summary`: human-readable model description

pub mod builder;
pub mod model;
pub mod shapes;
pub mod summary;

pub use builder::*;
pub use model::*;
pub use shapes::*;
pub use summary::*;
