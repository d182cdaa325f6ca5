//! Faddeeva function `w(z) = exp(-z²)·erfc(-iz)` for the Voigt profile.
//!
//! Uses Humlicek's W4 rational approximation (JQSRT 27, 1982), split into four
//! regions of the upper half plane. Relative accuracy is about 1e-4, which is
//! well inside the noise of a measured PL spectrum.
//!
//! Only `Im z >= 0` is needed: the Voigt width `γ` is bounded away from zero.

use nalgebra::Complex;

/// Evaluate `w(x + iy)` for `y >= 0`.
pub fn faddeeva(z: Complex<f64>) -> Complex<f64> {
    let x = z.re;
    let y = z.im.max(0.0);
    let t = Complex::new(y, -x);
    let s = x.abs() + y;

    if s >= 15.0 {
        // Region I: one-pole asymptotic form.
        let denom = t * t + 0.5;
        return t * 0.564_189_6 / denom;
    }

    if s >= 5.5 {
        // Region II.
        let u = t * t;
        let num = t * (u * 0.564_189_6 + 1.410_474);
        let den = u * (u + 3.0) + 0.75;
        return num / den;
    }

    if y >= 0.195 * x.abs() - 0.176 {
        // Region III.
        let num = (((t * 0.564_223_6 + 3.778_987) * t + 11.964_82) * t + 20.209_33) * t + 16.4955;
        let den = ((((t + 6.699_398) * t + 21.692_74) * t + 39.271_21) * t + 38.823_63) * t + 16.4955;
        return num / den;
    }

    // Region IV: close to the real axis.
    let u = t * t;
    let mut num = -(u * 0.56419) + 1.320_522;
    num = -(u * num) + 35.766_83;
    num = -(u * num) + 219.0313;
    num = -(u * num) + 1540.787;
    num = -(u * num) + 3321.9905;
    num = -(u * num) + 36183.31;

    let mut den = -u + 1.841_439;
    den = -(u * den) + 61.570_37;
    den = -(u * den) + 364.2191;
    den = -(u * den) + 2186.181;
    den = -(u * den) + 9022.228;
    den = -(u * den) + 24322.84;
    den = -(u * den) + 32066.6;

    u.exp() - t * num / den
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_at_origin_is_one() {
        let w = faddeeva(Complex::new(0.0, 0.0));
        assert!((w.re - 1.0).abs() < 1e-6);
        assert!(w.im.abs() < 1e-6);
    }

    #[test]
    fn purely_imaginary_argument_matches_erfc() {
        // w(i) = e · erfc(1)
        let w = faddeeva(Complex::new(0.0, 1.0));
        assert!((w.re - 0.427_583_8).abs() < 1e-4);
    }

    #[test]
    fn real_axis_matches_gaussian() {
        // Re w(x) = exp(-x²) on the real axis.
        for &x in &[0.3, 1.0, 2.0, 3.0] {
            let w = faddeeva(Complex::new(x, 0.0));
            let expected = (-x * x).exp();
            assert!((w.re - expected).abs() < 1e-4, "x={x}: {} vs {expected}", w.re);
        }
    }

    #[test]
    fn far_field_matches_lorentzian_limit() {
        // w(z) ≈ i / (√π z) for large |z|.
        let z = Complex::new(40.0, 2.0);
        let w = faddeeva(z);
        let approx = Complex::new(0.0, 1.0) / (z * std::f64::consts::PI.sqrt());
        assert!((w - approx).norm() / approx.norm() < 1e-3);
    }
}
