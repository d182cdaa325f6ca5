//! Linear solvers for the Levenberg–Marquardt step.
//!
//! Every LM iteration solves a small damped normal-equation system:
//!
//! ```text
//! (JᵀJ + λ·D) δ = Jᵀr
//! ```
//!
//! The matrix is symmetric positive (semi-)definite, so Cholesky is tried
//! first. When a background column is numerically dead (e.g. an exponential
//! with `exp(-x/τ) ≈ 0` across the grid) Cholesky fails and we fall back to an
//! SVD pseudo-solve, which zeroes the step along the dead direction.

use nalgebra::{DMatrix, DVector};

/// Minimum-norm solution of `a·x = b` by SVD.
///
/// Singular values below the cutoff count as zero, so `x` has no component
/// along directions the data cannot see. The cutoff is relaxed step by step
/// until the solution is finite.
pub fn solve_least_squares(a: &DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = a.clone().svd(true, true);
    let scale = svd.singular_values.max().max(f64::MIN_POSITIVE);

    for &rel in &[1e-14, 1e-12, 1e-10] {
        if let Ok(x) = svd.solve(b, rel * scale) {
            if x.iter().all(|v| v.is_finite()) {
                return Some(x);
            }
        }
    }

    None
}

/// Solve a symmetric positive-definite system, falling back to SVD.
pub fn solve_spd(a: &DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    if let Some(chol) = a.clone().cholesky() {
        let x = chol.solve(b);
        if x.iter().all(|v| v.is_finite()) {
            return Some(x);
        }
    }
    solve_least_squares(a, b)
}

/// Invert a symmetric matrix, returning `None` if it is singular or the result is not finite.
pub fn invert_spd(a: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let inv = match a.clone().cholesky() {
        Some(chol) => chol.inverse(),
        None => a.clone().try_inverse()?,
    };
    if inv.iter().all(|v| v.is_finite()) {
        Some(inv)
    } else {
        None
    }
}
