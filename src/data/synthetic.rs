//! Synthetic drifting-peak PL series.
//!
//! One peak whose center moves linearly from `center_start` to `center_end`
//! over the series, on top of an optional linear background, with optional
//! Gaussian noise. Deterministic for a given seed.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{PeakKind, SpectrumSeries};
use crate::error::FitError;
use crate::models::Shape;

#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSpec {
    pub n_spectra: usize,
    pub wl_min: f64,
    pub wl_max: f64,
    pub n_points: usize,
    pub kind: PeakKind,
    pub center_start: f64,
    pub center_end: f64,
    /// Peak height (maximum of the peak above background).
    pub height: f64,
    pub sigma: f64,
    pub slope: f64,
    pub intercept: f64,
    /// Standard deviation of additive noise; 0 disables noise.
    pub noise_sd: f64,
    /// Seconds between consecutive spectra.
    pub time_step: f64,
    pub seed: u64,
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        Self {
            n_spectra: 100,
            wl_min: 500.0,
            wl_max: 720.0,
            n_points: 221,
            kind: PeakKind::Gaussian,
            center_start: 600.0,
            center_end: 620.0,
            height: 1000.0,
            sigma: 20.0,
            slope: 0.0,
            intercept: 0.0,
            noise_sd: 5.0,
            time_step: 1.0,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyntheticSeries {
    pub series: SpectrumSeries,
    /// True peak center of each spectrum.
    pub true_centers: Vec<f64>,
}

pub fn generate_series(spec: &SyntheticSpec) -> Result<SyntheticSeries, FitError> {
    if spec.n_points < 2 {
        return Err(FitError::InvalidInput("Need at least 2 wavelength points.".into()));
    }
    if !(spec.wl_min.is_finite() && spec.wl_max.is_finite() && spec.wl_max > spec.wl_min) {
        return Err(FitError::InvalidInput("Invalid wavelength range.".into()));
    }
    if !(spec.sigma.is_finite() && spec.sigma > 0.0) {
        return Err(FitError::InvalidInput("Peak sigma must be > 0.".into()));
    }
    if !(spec.noise_sd.is_finite() && spec.noise_sd >= 0.0) {
        return Err(FitError::InvalidInput("Noise level must be >= 0.".into()));
    }

    let mut rng = StdRng::seed_from_u64(spec.seed);
    let noise = Normal::new(0.0, spec.noise_sd)
        .map_err(|e| FitError::InvalidInput(format!("Noise distribution error: {e}")))?;

    let step = (spec.wl_max - spec.wl_min) / (spec.n_points - 1) as f64;
    let wavelengths: Vec<f64> = (0..spec.n_points).map(|i| spec.wl_min + i as f64 * step).collect();
    let timestamps: Vec<f64> = (0..spec.n_spectra).map(|i| i as f64 * spec.time_step).collect();

    let shape = Shape::Peak(spec.kind);
    let amplitude = spec.kind.amplitude_from_height(spec.height, spec.sigma);
    let span = spec.n_spectra.saturating_sub(1).max(1) as f64;

    let mut true_centers = Vec::with_capacity(spec.n_spectra);
    let mut intensities = Vec::with_capacity(spec.n_spectra);

    for i in 0..spec.n_spectra {
        let center = spec.center_start + (spec.center_end - spec.center_start) * i as f64 / span;
        true_centers.push(center);

        // Voigt gets gamma = sigma, matching the builder's starting guess.
        let params = match spec.kind {
            PeakKind::Voigt => vec![center, amplitude, spec.sigma, spec.sigma],
            _ => vec![center, amplitude, spec.sigma],
        };

        let row: Vec<f64> = wavelengths
            .iter()
            .map(|&x| {
                let clean = spec.slope * x + spec.intercept + shape.eval(x, &params);
                if spec.noise_sd > 0.0 {
                    clean + noise.sample(&mut rng)
                } else {
                    clean
                }
            })
            .collect();
        intensities.push(row);
    }

    let series = SpectrumSeries::new(wavelengths, timestamps, intensities)?;
    Ok(SyntheticSeries { series, true_centers })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centers_drift_linearly_between_endpoints() {
        let spec = SyntheticSpec {
            n_spectra: 11,
            noise_sd: 0.0,
            ..SyntheticSpec::default()
        };
        let out = generate_series(&spec).unwrap();

        assert_eq!(out.series.len(), 11);
        assert_eq!(out.true_centers.len(), 11);
        assert!((out.true_centers[0] - 600.0).abs() < 1e-12);
        assert!((out.true_centers[5] - 610.0).abs() < 1e-12);
        assert!((out.true_centers[10] - 620.0).abs() < 1e-12);
    }

    #[test]
    fn noiseless_peak_reaches_requested_height() {
        let spec = SyntheticSpec {
            n_spectra: 1,
            center_start: 610.0,
            center_end: 610.0,
            noise_sd: 0.0,
            ..SyntheticSpec::default()
        };
        let out = generate_series(&spec).unwrap();
        let row = out.series.row(0).unwrap();
        let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        // 610 lies exactly on the 1 nm grid.
        assert!((max - 1000.0).abs() < 1e-6, "max = {max}");
    }

    #[test]
    fn linear_background_and_time_step_are_applied() {
        let spec = SyntheticSpec {
            n_spectra: 3,
            center_start: 610.0,
            center_end: 610.0,
            slope: 0.5,
            intercept: -100.0,
            noise_sd: 0.0,
            time_step: 2.5,
            ..SyntheticSpec::default()
        };
        let out = generate_series(&spec).unwrap();

        assert_eq!(out.series.timestamps(), &[0.0, 2.5, 5.0]);
        let row = out.series.row(1).unwrap();
        let wl = out.series.wavelengths();
        // Far from the peak only the background remains.
        assert!((row[0] - (0.5 * wl[0] - 100.0)).abs() < 1e-3);
        // At the center, peak height sits on top of the background.
        let at_center = wl.iter().position(|&x| (x - 610.0).abs() < 1e-9).unwrap();
        assert!((row[at_center] - (1000.0 + 0.5 * 610.0 - 100.0)).abs() < 1e-6);
    }

    #[test]
    fn same_seed_same_series() {
        let spec = SyntheticSpec {
            n_spectra: 3,
            ..SyntheticSpec::default()
        };
        let a = generate_series(&spec).unwrap();
        let b = generate_series(&spec).unwrap();
        assert_eq!(a.series.row(2), b.series.row(2));

        let c = generate_series(&SyntheticSpec { seed: 7, ..spec }).unwrap();
        assert_ne!(a.series.row(2), c.series.row(2));
    }

    #[test]
    fn rejects_bad_ranges() {
        let bad = SyntheticSpec {
            wl_min: 700.0,
            wl_max: 500.0,
            ..SyntheticSpec::default()
        };
        assert!(matches!(generate_series(&bad), Err(FitError::InvalidInput(_))));

        let flat = SyntheticSpec {
            sigma: 0.0,
            ..SyntheticSpec::default()
        };
        assert!(generate_series(&flat).is_err());
    }
}
