//! Line shapes for peaks and backgrounds.
//!
//! Peak shapes are area-normalised, so `amplitude` is the integrated intensity:
//!
//! - Gaussian: `A / (σ√(2π)) · exp(−(x−c)² / 2σ²)`
//! - Lorentzian: `A/π · σ / ((x−c)² + σ²)`
//! - Voigt: `A · Re w(z) / (σ√(2π))` with `z = (x − c + iγ) / (σ√2)`
//!
//! Parameter slices are laid out in the order listed by [`Shape::param_kinds`].

use std::f64::consts::{PI, SQRT_2};

use nalgebra::Complex;

use crate::domain::{PeakKind, ParamKind};
use crate::math::faddeeva;

const SQRT_2PI: f64 = 2.506_628_274_631_000_2;

/// Exponential decay constants are kept away from zero to avoid `x/0`.
const MIN_DECAY: f64 = 1e-9;

/// A single additive sub-model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Linear,
    Polynomial { degree: usize },
    Exponential,
    Peak(PeakKind),
}

impl Shape {
    pub fn param_count(self) -> usize {
        match self {
            Shape::Linear => 2,
            Shape::Polynomial { degree } => degree + 1,
            Shape::Exponential => 3,
            Shape::Peak(kind) => kind.param_count(),
        }
    }

    /// Meaning of each slot in this shape's parameter slice.
    pub fn param_kinds(self) -> Vec<ParamKind> {
        match self {
            Shape::Linear => vec![ParamKind::Slope, ParamKind::Intercept],
            Shape::Polynomial { degree } => (0..=degree).map(ParamKind::Coefficient).collect(),
            Shape::Exponential => vec![ParamKind::Amplitude, ParamKind::Decay, ParamKind::Offset],
            Shape::Peak(PeakKind::Voigt) => vec![
                ParamKind::Center,
                ParamKind::Amplitude,
                ParamKind::Sigma,
                ParamKind::Gamma,
            ],
            Shape::Peak(_) => vec![ParamKind::Center, ParamKind::Amplitude, ParamKind::Sigma],
        }
    }

    pub fn eval(self, x: f64, p: &[f64]) -> f64 {
        match self {
            Shape::Linear => p[0] * x + p[1],
            Shape::Polynomial { .. } => p.iter().rev().fold(0.0, |acc, c| acc * x + c),
            Shape::Exponential => p[0] * (-x / p[1].max(MIN_DECAY)).exp() + p[2],
            Shape::Peak(PeakKind::Gaussian) => gaussian(x, p[0], p[1], p[2]),
            Shape::Peak(PeakKind::Lorentzian) => lorentzian(x, p[0], p[1], p[2]),
            Shape::Peak(PeakKind::Voigt) => voigt(x, p[0], p[1], p[2], p[3]),
        }
    }
}

pub fn gaussian(x: f64, center: f64, amplitude: f64, sigma: f64) -> f64 {
    let d = (x - center) / sigma;
    amplitude / (sigma * SQRT_2PI) * (-0.5 * d * d).exp()
}

pub fn lorentzian(x: f64, center: f64, amplitude: f64, sigma: f64) -> f64 {
    let d = x - center;
    amplitude / PI * sigma / (d * d + sigma * sigma)
}

pub fn voigt(x: f64, center: f64, amplitude: f64, sigma: f64, gamma: f64) -> f64 {
    let z = Complex::new(x - center, gamma) / (sigma * SQRT_2);
    amplitude * faddeeva(z).re / (sigma * SQRT_2PI)
}

/// Peak maximum for a fitted peak (the shape evaluated at its center).
pub fn peak_height(kind: PeakKind, amplitude: f64, sigma: f64, gamma: Option<f64>) -> f64 {
    match kind {
        PeakKind::Gaussian => amplitude / (sigma * SQRT_2PI),
        PeakKind::Lorentzian => amplitude / (PI * sigma),
        PeakKind::Voigt => voigt(0.0, 0.0, amplitude, sigma, gamma.unwrap_or(0.0)),
    }
}
