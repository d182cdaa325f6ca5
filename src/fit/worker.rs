//! Fit a single spectrum in isolation.
//!
//! A [`FitTask`] owns everything it needs (its own copy of the wavelength grid,
//! one intensity row and a config), so it can run on any pool thread without
//! touching shared state. [`fit_spectrum`] never fails and never unwinds: any
//! error or panic becomes a `FitResult` with `success = false`.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::{Duration, Instant};

use crate::domain::{Component, FitConfig, FitResult, ParamEstimate, ParamId, ParamKind};
use crate::error::FitError;
use crate::fit::lm::{LmConfig, minimize};
use crate::math::fit_statistics;
use crate::models::{FitModel, build_model, guess_background, peak_height};

/// Self-contained payload for one spectrum.
#[derive(Debug, Clone)]
pub struct FitTask {
    pub index: usize,
    pub time: f64,
    pub wavelengths: Vec<f64>,
    pub intensities: Vec<f64>,
    pub config: FitConfig,
    pub smart_init_used: bool,
    pub lm: LmConfig,
    pub timeout: Option<Duration>,
}

/// Run one fit, converting every failure mode into a failure record.
pub fn fit_spectrum(task: &FitTask) -> FitResult {
    isolated(task, || try_fit(task))
}

/// Call `fit`, turning its error or an unwinding panic into a failure record for `task`.
fn isolated<F>(task: &FitTask, fit: F) -> FitResult
where
    F: FnOnce() -> Result<FitResult, FitError>,
{
    match catch_unwind(AssertUnwindSafe(fit)) {
        Ok(Ok(result)) => result,
        Ok(Err(err)) => FitResult::failure(task.index, task.time, err.to_string(), task.smart_init_used),
        Err(payload) => {
            let msg = if let Some(s) = payload.downcast_ref::<&str>() {
                (*s).to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic".to_string()
            };
            let err = FitError::WorkerCrash(msg);
            FitResult::failure(task.index, task.time, err.to_string(), task.smart_init_used)
        }
    }
}

fn try_fit(task: &FitTask) -> Result<FitResult, FitError> {
    let deadline = task.timeout.map(|t| Instant::now() + t);
    let (model, mut params) = build_model(&task.config)?;
    guess_background(&task.config, &mut params, &task.wavelengths, &task.intensities);

    let outcome = minimize(
        &model,
        &task.wavelengths,
        &task.intensities,
        &params,
        &task.lm,
        deadline,
    )?;

    let mut fitted_curve = vec![0.0; task.wavelengths.len()];
    model.eval_into(&task.wavelengths, &outcome.params, &mut fitted_curve);
    let residuals: Vec<f64> = task
        .intensities
        .iter()
        .zip(&fitted_curve)
        .map(|(y, f)| y - f)
        .collect();

    let stats = fit_statistics(&task.intensities, &residuals, model.n_params());

    let mut parameters: Vec<ParamEstimate> = params
        .iter()
        .enumerate()
        .map(|(i, p)| ParamEstimate {
            id: p.id,
            value: outcome.params[i],
            stderr: outcome.stderr(i),
            min: p.min,
            max: p.max,
        })
        .collect();
    append_peak_heights(&task.config, &mut parameters);

    let error = (!outcome.converged).then(|| {
        FitError::Convergence(format!(
            "no convergence within {} iterations",
            outcome.iterations
        ))
        .to_string()
    });

    Ok(FitResult {
        index: task.index,
        time: task.time,
        success: outcome.converged,
        r_squared: Some(stats.r_squared),
        chi_squared: Some(stats.chi_squared),
        reduced_chi_squared: Some(stats.reduced_chi_squared),
        aic: Some(stats.aic),
        bic: Some(stats.bic),
        parameters,
        fitted_curve,
        residuals,
        error,
        smart_init_used: task.smart_init_used,
        iterations: outcome.iterations,
    })
}

/// Add a derived `p{i}_height` estimate for every peak.
///
/// The height is linear in amplitude, so its error is scaled from the
/// amplitude error (width covariance is ignored).
fn append_peak_heights(config: &FitConfig, parameters: &mut Vec<ParamEstimate>) {
    let mut heights = Vec::with_capacity(config.peaks().len());
    for (i, peak) in config.peaks().iter().enumerate() {
        let find = |kind| parameters.iter().find(|p| p.id == ParamId::peak(i, kind));
        let (Some(amp), Some(sigma)) = (find(ParamKind::Amplitude), find(ParamKind::Sigma)) else {
            continue;
        };
        let gamma = find(ParamKind::Gamma).map(|g| g.value);

        let height = peak_height(peak.kind, amp.value, sigma.value, gamma);
        let stderr = amp.stderr.and_then(|se| {
            if amp.value != 0.0 {
                Some((height * se / amp.value).abs())
            } else {
                None
            }
        });
        heights.push(ParamEstimate {
            id: ParamId {
                component: Component::Peak(i),
                kind: ParamKind::Height,
            },
            value: height,
            stderr,
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
        });
    }
    parameters.extend(heights);
}
