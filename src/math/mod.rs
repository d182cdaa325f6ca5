//! Mathematical utilities: special functions, linear solvers, fit statistics.

pub mod faddeeva;
pub mod lstsq;
pub mod stats;

pub use faddeeva::*;
pub use lstsq::*;
pub use stats::*;
