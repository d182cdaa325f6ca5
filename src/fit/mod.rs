//! Spectral fitting.
//!
//! Responsibilities:
//!
//! - bounded Levenberg–Marquardt optimizer (`lm`)
//! - fit one spectrum in isolation, never failing across the boundary (`worker`)
//! - seed guesses from solved neighbours (`smart_init`)
//! - run a whole series on a bounded pool (`dispatcher`)

pub mod dispatcher;
pub mod lm;
pub mod smart_init;
pub mod worker;

pub use dispatcher::*;
pub use lm::*;
pub use smart_init::*;
pub use worker::*;
