//! The fit workflow shared by the CLI and the integration tests:
//! synthetic series -> dispatcher -> aggregated table.

use log::info;

use crate::data::{SyntheticSpec, generate_series};
use crate::domain::{FitConfig, ParamId, ParamKind};
use crate::error::AppError;
use crate::fit::{FitDispatcher, RunOptions};
use crate::math::pearson;
use crate::report::{FitResultTable, aggregate};

/// All computed outputs of a single `plfit fit` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub table: FitResultTable,
    pub true_centers: Vec<f64>,
    pub workers: usize,
    /// Pearson r between the fitted first-peak center and the true center.
    pub center_correlation: Option<f64>,
}

pub fn run_fit(config: &FitConfig, options: &RunOptions, synthetic: &SyntheticSpec) -> Result<RunOutput, AppError> {
    let generated = generate_series(synthetic)?;
    let series = generated.series;

    let dispatcher = FitDispatcher::new(options.clone());
    let workers = dispatcher.worker_count(series.len());

    let total = series.len();
    let step = (total / 10).max(1);
    let outcome = dispatcher.run_with_progress(&series, config, |p| {
        if p.completed % step == 0 || p.completed == p.total {
            info!("progress: {}/{} spectra", p.completed, p.total);
        }
    })?;

    let table = aggregate(outcome);
    let center_correlation = center_correlation(&table, &generated.true_centers);

    Ok(RunOutput {
        table,
        true_centers: generated.true_centers,
        workers,
        center_correlation,
    })
}

/// Correlation of fitted `p0_center` with the truth over successful rows.
pub fn center_correlation(table: &FitResultTable, true_centers: &[f64]) -> Option<f64> {
    let id = ParamId::peak(0, ParamKind::Center);
    let col = table.columns.iter().position(|c| c.id == id)?;

    let (fitted, truth): (Vec<f64>, Vec<f64>) = table
        .rows
        .iter()
        .filter_map(|row| {
            let v = row.values[col]?;
            let t = *true_centers.get(row.index)?;
            Some((v, t))
        })
        .unzip();
    pearson(&fitted, &truth)
}
