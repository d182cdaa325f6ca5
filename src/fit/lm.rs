//! Bounded Levenberg–Marquardt least squares.
//!
//! Minimises `Σ (y_i − f(x_i; p))²` over `p` inside box bounds:
//!
//! - Jacobian by central differences (the Voigt profile has no cheap analytic form)
//! - Marquardt scaling: the damping term is `λ·diag(JᵀJ)`
//! - bounds are enforced by projecting every trial point onto the box
//! - the covariance is `(JᵀJ)⁻¹ · χ²/ν` at the solution
//!
//! An optional deadline is checked once per iteration.

use std::time::Instant;

use nalgebra::{DMatrix, DVector};

use crate::error::FitError;
use crate::math::{invert_spd, solve_spd};
use crate::models::{FitModel, Parameters};

/// Relative finite-difference step (≈ cube root of machine epsilon).
const FD_STEP: f64 = 6e-6;

/// Diagonal entries of `JᵀJ` are floored here before damping.
const DIAG_FLOOR: f64 = 1e-12;

const LAMBDA_MIN: f64 = 1e-15;
const LAMBDA_MAX: f64 = 1e16;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LmConfig {
    pub max_iterations: usize,
    /// Stop when the relative drop in χ² falls below this.
    pub ftol: f64,
    /// Stop when every parameter moves less than this (relative).
    pub xtol: f64,
    pub initial_lambda: f64,
    pub lambda_up: f64,
    pub lambda_down: f64,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            ftol: 1e-10,
            xtol: 1e-10,
            initial_lambda: 1e-3,
            lambda_up: 10.0,
            lambda_down: 0.1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LmOutcome {
    pub params: Vec<f64>,
    pub chi_squared: f64,
    pub converged: bool,
    pub iterations: usize,
    /// Scaled covariance; `None` if `JᵀJ` is singular at the solution.
    /// Rows and columns of parameters the data cannot see are NaN.
    pub covariance: Option<DMatrix<f64>>,
}

impl LmOutcome {
    /// Standard error of parameter `i`, if the covariance is usable.
    pub fn stderr(&self, i: usize) -> Option<f64> {
        let var = self.covariance.as_ref()?[(i, i)];
        (var.is_finite() && var >= 0.0).then(|| var.sqrt())
    }
}

/// Fit `model` to `(xs, ys)` starting from `params`.
///
/// Returns `Err` only for unusable inputs, non-finite model output, or an
/// elapsed deadline. Hitting `max_iterations` is reported via `converged = false`.
pub fn minimize<M: FitModel>(
    model: &M,
    xs: &[f64],
    ys: &[f64],
    params: &Parameters,
    config: &LmConfig,
    deadline: Option<Instant>,
) -> Result<LmOutcome, FitError> {
    let n = xs.len();
    let m = model.n_params();

    if ys.len() != n {
        return Err(FitError::InvalidInput(format!(
            "{} wavelengths but {} intensities",
            n,
            ys.len()
        )));
    }
    if params.len() != m {
        return Err(FitError::Configuration(format!(
            "model expects {m} parameters, got {}",
            params.len()
        )));
    }
    if n < m {
        return Err(FitError::Convergence(format!(
            "{n} data points cannot determine {m} parameters"
        )));
    }
    if xs.iter().chain(ys).any(|v| !v.is_finite()) {
        return Err(FitError::InvalidInput("spectrum contains non-finite values".to_string()));
    }

    let started = Instant::now();
    let y_scale: f64 = ys.iter().map(|y| y * y).sum::<f64>().max(f64::MIN_POSITIVE);

    let mut p = params.initial_values();
    let mut r = DVector::zeros(n);
    let mut chi2 = residuals(model, xs, ys, &p, &mut r)?;

    let mut jac = DMatrix::zeros(n, m);
    let mut lambda = config.initial_lambda;
    let mut converged = false;
    let mut iterations = 0;

    let mut trial = vec![0.0; m];
    let mut r_trial = DVector::zeros(n);

    while iterations < config.max_iterations {
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                return Err(FitError::Timeout {
                    elapsed_ms: started.elapsed().as_millis(),
                });
            }
        }
        iterations += 1;

        if chi2 <= f64::EPSILON * f64::EPSILON * y_scale {
            converged = true;
            break;
        }

        jacobian(model, xs, &p, &mut jac);
        let jtj = jac.transpose() * &jac;
        let g = jac.transpose() * &r;

        // Inner loop: raise λ until a step lowers χ² or λ saturates.
        let mut accepted = false;
        while lambda <= LAMBDA_MAX {
            let mut a = jtj.clone();
            for i in 0..m {
                a[(i, i)] += lambda * jtj[(i, i)].max(DIAG_FLOOR);
            }
            let Some(delta) = solve_spd(&a, &g) else {
                lambda *= config.lambda_up;
                continue;
            };

            for i in 0..m {
                trial[i] = p[i] + delta[i];
            }
            params.project(&mut trial);

            let chi2_trial = match residuals(model, xs, ys, &trial, &mut r_trial) {
                Ok(v) => v,
                Err(_) => f64::INFINITY,
            };

            if chi2_trial < chi2 {
                let rel_drop = (chi2 - chi2_trial) / chi2;
                let small_step = p
                    .iter()
                    .zip(&trial)
                    .all(|(old, new)| (new - old).abs() <= config.xtol * (old.abs() + config.xtol));

                p.copy_from_slice(&trial);
                std::mem::swap(&mut r, &mut r_trial);
                chi2 = chi2_trial;
                lambda = (lambda * config.lambda_down).max(LAMBDA_MIN);
                accepted = true;

                if rel_drop < config.ftol || small_step {
                    converged = true;
                }
                break;
            }
            lambda *= config.lambda_up;
        }

        if !accepted {
            // No direction lowers χ²: we are at a (possibly bound-constrained) minimum.
            converged = true;
        }
        if converged {
            break;
        }
    }

    let nfree = n.saturating_sub(m).max(1) as f64;
    jacobian(model, xs, &p, &mut jac);
    let covariance = covariance(&(jac.transpose() * &jac), chi2 / nfree);

    Ok(LmOutcome {
        params: p,
        chi_squared: chi2,
        converged,
        iterations,
        covariance,
    })
}

/// `(JᵀJ)⁻¹ · scale` over the columns that carry information.
///
/// A column with a vanishing diagonal (e.g. a background term that underflows
/// on this grid) would make the whole matrix singular; it is left out of the
/// inversion and its entries are NaN.
fn covariance(jtj: &DMatrix<f64>, scale: f64) -> Option<DMatrix<f64>> {
    let m = jtj.nrows();
    let max_diag = (0..m).map(|i| jtj[(i, i)]).fold(0.0, f64::max);
    let live: Vec<usize> = (0..m)
        .filter(|&i| jtj[(i, i)] > f64::EPSILON * max_diag)
        .collect();
    if live.is_empty() {
        return None;
    }

    let inv = invert_spd(&jtj.select_rows(&live).select_columns(&live))?;
    let mut cov = DMatrix::from_element(m, m, f64::NAN);
    for (a, &i) in live.iter().enumerate() {
        for (b, &j) in live.iter().enumerate() {
            cov[(i, j)] = inv[(a, b)] * scale;
        }
    }
    Some(cov)
}

/// Fill `out` with `y − f(x; p)` and return `Σ out²`.
fn residuals<M: FitModel>(
    model: &M,
    xs: &[f64],
    ys: &[f64],
    p: &[f64],
    out: &mut DVector<f64>,
) -> Result<f64, FitError> {
    let mut chi2 = 0.0;
    for (i, (&x, &y)) in xs.iter().zip(ys).enumerate() {
        let ri = y - model.eval(x, p);
        out[i] = ri;
        chi2 += ri * ri;
    }
    if chi2.is_finite() {
        Ok(chi2)
    } else {
        Err(FitError::Convergence("model produced non-finite values".to_string()))
    }
}

/// Central-difference Jacobian of `f` (not of the residual) with respect to `p`.
///
/// Steps are not projected: every shape is defined slightly outside its bounds.
fn jacobian<M: FitModel>(model: &M, xs: &[f64], p: &[f64], out: &mut DMatrix<f64>) {
    let mut shifted = p.to_vec();
    for j in 0..p.len() {
        let h = FD_STEP * p[j].abs().max(1.0);

        shifted[j] = p[j] + h;
        let plus: Vec<f64> = xs.iter().map(|&x| model.eval(x, &shifted)).collect();
        shifted[j] = p[j] - h;
        for (i, &x) in xs.iter().enumerate() {
            out[(i, j)] = (plus[i] - model.eval(x, &shifted)) / (2.0 * h);
        }
        shifted[j] = p[j];
    }
}
