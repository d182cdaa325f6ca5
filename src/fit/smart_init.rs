//! Seed a fit from the nearest already-solved neighbour.
//!
//! Consecutive spectra in a PL time series usually differ only slightly, so the
//! fitted peaks of spectrum `i ± k` are a far better starting point for
//! spectrum `i` than the user's static guesses.

use std::collections::BTreeMap;

use crate::domain::{FitConfig, FitResult, ParamId, ParamKind, PeakSpec};

/// Default index distance within which neighbours are considered.
pub const DEFAULT_SEARCH_RADIUS: usize = 5;

/// Nearest successful result with `|index − target| <= radius`.
///
/// Ties resolve to the lower index.
pub fn nearest_successful<'a>(
    target: usize,
    registry: &'a BTreeMap<usize, FitResult>,
    radius: usize,
) -> Option<&'a FitResult> {
    let lo = target.saturating_sub(radius);
    let hi = target.saturating_add(radius);
    registry
        .range(lo..=hi)
        .filter(|(_, r)| r.success)
        .min_by_key(|(idx, _)| (idx.abs_diff(target), **idx))
        .map(|(_, r)| r)
}

/// Peak guesses for `target`, taken from the nearest successful neighbour.
///
/// Returns `None` (use the base config unchanged) when no neighbour qualifies.
/// Heights are recovered from the fitted amplitude with each peak kind's own
/// inversion; a peak whose fitted width is unusable keeps its base height.
pub fn smart_init_config(
    base: &FitConfig,
    target: usize,
    registry: &BTreeMap<usize, FitResult>,
    radius: usize,
) -> Option<FitConfig> {
    let neighbor = nearest_successful(target, registry, radius)?;

    let peaks: Vec<PeakSpec> = base
        .peaks()
        .iter()
        .enumerate()
        .map(|(i, peak)| {
            let mut seeded = *peak;
            let value = |kind| neighbor.param_value(ParamId::peak(i, kind));

            if let Some(center) = value(ParamKind::Center) {
                seeded.center = center;
            }
            if let Some(sigma) = value(ParamKind::Sigma).filter(|s| s.is_finite() && *s > 0.0) {
                seeded.sigma = sigma;
                if let Some(height) = value(ParamKind::Amplitude)
                    .and_then(|amp| peak.kind.height_from_amplitude(amp, sigma))
                {
                    seeded.height = height;
                }
            }
            seeded
        })
        .collect();

    log::debug!(
        "spectrum {target}: seeding from neighbour {} (distance {})",
        neighbor.index,
        neighbor.index.abs_diff(target)
    );
    Some(base.with_peak_guesses(peaks))
}
