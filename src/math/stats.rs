//! Goodness-of-fit statistics.
//!
//! Conventions follow the usual nonlinear least-squares reporting:
//!
//! - `χ² = Σ r²` (unweighted)
//! - `ν = max(1, n − k)`
//! - `AIC = n·ln(χ²/n) + 2k`
//! - `BIC = n·ln(χ²/n) + k·ln(n)`
//!
//! `χ²` is floored at `1e-250` inside the logarithm so a noiseless fit still
//! yields finite information criteria.

use serde::{Deserialize, Serialize};

const CHI2_FLOOR: f64 = 1e-250;

/// Summary statistics for one fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitStatistics {
    pub chi_squared: f64,
    pub reduced_chi_squared: f64,
    pub r_squared: f64,
    pub aic: f64,
    pub bic: f64,
}

/// Compute statistics from observations and residuals (`observed − fitted`).
pub fn fit_statistics(observed: &[f64], residuals: &[f64], n_params: usize) -> FitStatistics {
    let n = residuals.len();
    let chi_squared: f64 = residuals.iter().map(|r| r * r).sum();
    let nfree = n.saturating_sub(n_params).max(1);

    let log_term = n as f64 * (chi_squared.max(CHI2_FLOOR) / n.max(1) as f64).ln();
    let k = n_params as f64;

    FitStatistics {
        chi_squared,
        reduced_chi_squared: chi_squared / nfree as f64,
        r_squared: r_squared(observed, chi_squared),
        aic: log_term + 2.0 * k,
        bic: log_term + k * (n.max(1) as f64).ln(),
    }
}

/// Coefficient of determination `1 − SSR/SST`.
///
/// A flat spectrum (`SST = 0`) reports 1 for a perfect fit and 0 otherwise.
pub fn r_squared(observed: &[f64], ssr: f64) -> f64 {
    if observed.is_empty() {
        return f64::NAN;
    }
    let mean = observed.iter().sum::<f64>() / observed.len() as f64;
    let sst: f64 = observed.iter().map(|y| (y - mean) * (y - mean)).sum();
    if sst <= 0.0 {
        return if ssr <= 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ssr / sst
}

/// Pearson correlation coefficient. `None` for fewer than two pairs or zero variance.
pub fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    let n = a.len().min(b.len());
    if n < 2 {
        return None;
    }
    let ma = a[..n].iter().sum::<f64>() / n as f64;
    let mb = b[..n].iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut va = 0.0;
    let mut vb = 0.0;
    for (x, y) in a[..n].iter().zip(&b[..n]) {
        let dx = x - ma;
        let dy = y - mb;
        cov += dx * dy;
        va += dx * dx;
        vb += dy * dy;
    }
    if va <= 0.0 || vb <= 0.0 {
        return None;
    }
    Some(cov / (va * vb).sqrt())
}
