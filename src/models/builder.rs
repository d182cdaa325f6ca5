//! Turn a declarative [`FitConfig`] into a composite model and its starting parameters.
//!
//! The background (if any) is added first under the `bg_` prefix, then one
//! component per peak in config order under `p{i}_`. Peak guesses:
//!
//! - Gaussian: `amplitude = h·σ·√(2π)`, center ± margin, σ ∈ [σ_min, σ_max]
//! - Lorentzian: `amplitude = h·σ·π`, same bounds
//! - Voigt: Gaussian rules plus `γ = σ`, γ ∈ [γ_min, γ_max]
//!
//! Amplitudes are bounded below by zero.
//!
//! Background guesses are fixed, except the exponential, whose scale depends
//! on where the grid sits; [`guess_background`] derives it from the spectrum.

use crate::domain::{BackgroundSpec, Component, FitConfig, ParamId, ParamKind, PeakKind, PeakSpec};
use crate::error::FitError;
use crate::models::model::{CompositeModel, Parameter, Parameters};
use crate::models::shapes::Shape;

/// Build the composite model and initial parameters for `config`.
pub fn build_model(config: &FitConfig) -> Result<(CompositeModel, Parameters), FitError> {
    let mut model = CompositeModel::new();
    let mut params = Parameters::new();

    if let Some(shape) = background_shape(config.background()) {
        model.push(Component::Background, shape);
        push_background_params(shape, &mut params);
    }

    for (i, peak) in config.peaks().iter().enumerate() {
        model.push(Component::Peak(i), Shape::Peak(peak.kind));
        push_peak_params(i, peak, config, &mut params);
    }

    if model.is_empty() {
        return Err(FitError::Configuration(
            "model has no background and no peaks".to_string(),
        ));
    }
    debug_assert_eq!(params.len(), config.param_count());

    Ok((model, params))
}

fn background_shape(bg: BackgroundSpec) -> Option<Shape> {
    match bg {
        BackgroundSpec::None => None,
        BackgroundSpec::Linear => Some(Shape::Linear),
        BackgroundSpec::Polynomial { degree } => Some(Shape::Polynomial { degree }),
        BackgroundSpec::Exponential => Some(Shape::Exponential),
    }
}

fn push_background_params(shape: Shape, params: &mut Parameters) {
    for kind in shape.param_kinds() {
        let id = ParamId::background(kind);
        let param = match kind {
            ParamKind::Amplitude => Parameter::free(id, 1.0),
            ParamKind::Decay => Parameter::bounded(id, 1.0, 1e-9, f64::INFINITY),
            _ => Parameter::free(id, 0.0),
        };
        params.push(param);
    }
}

/// Fraction of the grid at each end used to read the background level.
const EDGE_FRACTION: usize = 10;

/// Replace grid-independent background guesses with ones read from the data.
///
/// Only the exponential needs this: with `A·exp(−x/τ)` on a wavelength grid
/// the default `τ = 1` underflows to zero and the background never moves.
/// The decay is taken from the two grid edges, the offset from the minimum.
pub fn guess_background(config: &FitConfig, params: &mut Parameters, xs: &[f64], ys: &[f64]) {
    if config.background() != BackgroundSpec::Exponential || xs.len() < 6 || xs.len() != ys.len() {
        return;
    }

    let mut points: Vec<(f64, f64)> = xs.iter().copied().zip(ys.iter().copied()).collect();
    points.sort_by(|a, b| a.0.total_cmp(&b.0));

    let edge = (points.len() / EDGE_FRACTION).max(3);
    let mean = |pts: &[(f64, f64)]| {
        let n = pts.len() as f64;
        let (sx, sy) = pts.iter().fold((0.0, 0.0), |(sx, sy), (x, y)| (sx + x, sy + y));
        (sx / n, sy / n)
    };
    let (x_left, y_left) = mean(&points[..edge]);
    let (x_right, y_right) = mean(&points[points.len() - edge..]);

    let span = points[points.len() - 1].0 - points[0].0;
    let offset = points.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
    if !(span.is_finite() && span > 0.0 && offset.is_finite()) {
        return;
    }

    let d_left = y_left - offset;
    let d_right = y_right - offset;
    let decay = if d_left > d_right && d_right > 0.0 {
        ((x_right - x_left) / (d_left / d_right).ln()).clamp(span / 50.0, span * 10.0)
    } else {
        span
    };
    let amplitude = d_left.max(f64::EPSILON) * (x_left / decay).exp();
    if !(amplitude.is_finite() && decay.is_finite()) {
        return;
    }

    params.set_value(ParamId::background(ParamKind::Amplitude), amplitude);
    params.set_value(ParamId::background(ParamKind::Decay), decay);
    params.set_value(ParamId::background(ParamKind::Offset), offset);
}

fn push_peak_params(i: usize, peak: &PeakSpec, config: &FitConfig, params: &mut Parameters) {
    let b = config.bounds();
    let amplitude = peak.kind.amplitude_from_height(peak.height, peak.sigma);

    params.push(Parameter::bounded(
        ParamId::peak(i, ParamKind::Center),
        peak.center,
        peak.center - b.center_margin,
        peak.center + b.center_margin,
    ));
    params.push(Parameter::bounded(
        ParamId::peak(i, ParamKind::Amplitude),
        amplitude,
        0.0,
        f64::INFINITY,
    ));
    params.push(Parameter::bounded(
        ParamId::peak(i, ParamKind::Sigma),
        peak.sigma,
        b.sigma_min,
        b.sigma_max,
    ));
    if peak.kind == PeakKind::Voigt {
        params.push(Parameter::bounded(
            ParamId::peak(i, ParamKind::Gamma),
            peak.sigma,
            b.gamma_min,
            b.gamma_max,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::model::FitModel;

    fn peak(kind: PeakKind) -> PeakSpec {
        PeakSpec::new(kind, 650.0, 1000.0, 20.0)
    }

    #[test]
    fn parameter_count_matches_config() {
        let cases = [
            (BackgroundSpec::None, vec![peak(PeakKind::Gaussian)], 3),
            (BackgroundSpec::Linear, vec![peak(PeakKind::Voigt)], 6),
            (
                BackgroundSpec::Polynomial { degree: 2 },
                vec![peak(PeakKind::Lorentzian), peak(PeakKind::Voigt)],
                3 + 3 + 4,
            ),
            (BackgroundSpec::Exponential, vec![], 3),
        ];
        for (bg, peaks, expected) in cases {
            let config = FitConfig::new(bg, peaks).unwrap();
            let (model, params) = build_model(&config).unwrap();
            assert_eq!(params.len(), expected);
            assert_eq!(model.n_params(), expected);
            assert_eq!(config.param_count(), expected);
        }
    }

    #[test]
    fn gaussian_initial_values_and_bounds() {
        let config = FitConfig::new(BackgroundSpec::None, vec![peak(PeakKind::Gaussian)]).unwrap();
        let (_, params) = build_model(&config).unwrap();

        let amp = params.get(ParamId::peak(0, ParamKind::Amplitude)).unwrap();
        let expected = 1000.0 * 20.0 * (2.0 * std::f64::consts::PI).sqrt();
        assert!((amp.value - expected).abs() < 1e-9);
        assert_eq!(amp.min, 0.0);

        let center = params.get(ParamId::peak(0, ParamKind::Center)).unwrap();
        assert_eq!((center.min, center.max), (600.0, 700.0));

        let sigma = params.get(ParamId::peak(0, ParamKind::Sigma)).unwrap();
        assert_eq!((sigma.min, sigma.max), (1.0, 100.0));
    }

    #[test]
    fn lorentzian_amplitude_uses_pi() {
        let config = FitConfig::new(BackgroundSpec::None, vec![peak(PeakKind::Lorentzian)]).unwrap();
        let (_, params) = build_model(&config).unwrap();
        let amp = params.get(ParamId::peak(0, ParamKind::Amplitude)).unwrap();
        assert!((amp.value - 1000.0 * 20.0 * std::f64::consts::PI).abs() < 1e-9);
    }

    #[test]
    fn voigt_gamma_starts_at_sigma() {
        let config = FitConfig::new(BackgroundSpec::None, vec![peak(PeakKind::Voigt)]).unwrap();
        let (_, params) = build_model(&config).unwrap();
        let gamma = params.get(ParamId::peak(0, ParamKind::Gamma)).unwrap();
        assert_eq!(gamma.value, 20.0);
        assert_eq!((gamma.min, gamma.max), (0.1, 100.0));
    }

    #[test]
    fn background_comes_first_and_peaks_keep_config_order() {
        let config = FitConfig::new(
            BackgroundSpec::Linear,
            vec![peak(PeakKind::Gaussian), peak(PeakKind::Lorentzian)],
        )
        .unwrap();
        let (model, params) = build_model(&config).unwrap();

        let components: Vec<Component> = model.slots().iter().map(|s| s.component).collect();
        assert_eq!(
            components,
            vec![Component::Background, Component::Peak(0), Component::Peak(1)]
        );
        let names: Vec<String> = params.iter().map(|p| p.id.to_string()).collect();
        assert_eq!(names[0], "bg_slope");
        assert_eq!(names[2], "p0_center");
        assert_eq!(names[5], "p1_center");
    }

    #[test]
    fn exponential_guess_comes_from_the_grid() {
        let xs: Vec<f64> = (0..=500).map(|i| 400.0 + i as f64).collect();
        let ys: Vec<f64> = xs.iter().map(|&x| 500.0 * (-(x - 400.0) / 100.0).exp() + 10.0).collect();
        let config = FitConfig::new(BackgroundSpec::Exponential, Vec::new()).unwrap();
        let (model, mut params) = build_model(&config).unwrap();
        guess_background(&config, &mut params, &xs, &ys);

        let decay = params.get(ParamId::background(ParamKind::Decay)).unwrap().value;
        assert!(decay > 10.0 && decay < 1000.0, "decay {decay}");

        // The starting curve already sits near the data at the left edge.
        let start = model.eval(400.0, &params.initial_values());
        assert!((start - 510.0).abs() < 0.5 * 510.0, "start {start}");
    }

    #[test]
    fn other_backgrounds_keep_fixed_guesses() {
        let xs: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let ys = vec![3.0; xs.len()];
        let config = FitConfig::new(BackgroundSpec::Linear, Vec::new()).unwrap();
        let (_, mut params) = build_model(&config).unwrap();
        let before = params.clone();
        guess_background(&config, &mut params, &xs, &ys);
        assert_eq!(params, before);
    }

    #[test]
    fn custom_bounds_are_applied() {
        let bounds = crate::domain::BoundsPolicy {
            center_margin: 10.0,
            ..Default::default()
        };
        let config =
            FitConfig::with_bounds(BackgroundSpec::None, vec![peak(PeakKind::Gaussian)], bounds).unwrap();
        let (_, params) = build_model(&config).unwrap();
        let center = params.get(ParamId::peak(0, ParamKind::Center)).unwrap();
        assert_eq!((center.min, center.max), (640.0, 660.0));
    }
}
