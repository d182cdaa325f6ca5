//! Batch fitting over a spectral time series.
//!
//! One task per spectrum runs on a bounded rayon pool. The calling thread is the
//! only owner of the completed-results registry:
//!
//! 1. keep up to `max_workers` tasks in flight
//! 2. block on the result channel for the next completion (any order)
//! 3. record it, emit one progress tick, and dispatch the next task
//!
//! With smart init enabled, a task's starting guesses are derived when it is
//! dispatched, from whatever has completed by then (wavefront scheduling).
//! With `max_workers = 1` this degenerates to a strictly sequential sweep in
//! which every spectrum after the first is seeded from its predecessor.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use serde::Serialize;

use crate::domain::{FitConfig, FitResult, SpectrumSeries};
use crate::error::FitError;
use crate::fit::lm::LmConfig;
use crate::fit::smart_init::{DEFAULT_SEARCH_RADIUS, smart_init_config};
use crate::fit::worker::{FitTask, fit_spectrum};
use crate::models::build_model;

/// Run-level options supplied by the caller (CLI, UI, tests).
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Pool size; `None` means `min(available cores, spectra)`.
    pub max_workers: Option<usize>,
    pub smart_init: bool,
    pub search_radius: usize,
    /// Per-task wall-clock limit, checked once per optimizer iteration.
    pub task_timeout: Option<Duration>,
    pub lm: LmConfig,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_workers: None,
            smart_init: true,
            search_radius: DEFAULT_SEARCH_RADIUS,
            task_timeout: None,
            lm: LmConfig::default(),
        }
    }
}

/// Cooperative cancellation shared between the caller and a running batch.
///
/// Cancelling stops further dispatch; tasks already running finish normally.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One completion event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub index: usize,
    pub success: bool,
}

/// Everything a batch produced, keyed by original spectrum index.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchOutcome {
    pub requested: usize,
    pub results: BTreeMap<usize, FitResult>,
    /// Indices never dispatched because the batch was cancelled.
    pub cancelled: Vec<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct FitDispatcher {
    options: RunOptions,
    cancel: CancellationToken,
}

impl FitDispatcher {
    pub fn new(options: RunOptions) -> Self {
        Self {
            options,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Pool size for a series of `n` spectra.
    pub fn worker_count(&self, n: usize) -> usize {
        let requested = self.options.max_workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });
        requested.min(n).max(1)
    }

    pub fn run(&self, series: &SpectrumSeries, config: &FitConfig) -> Result<BatchOutcome, FitError> {
        self.run_with_progress(series, config, |_| {})
    }

    /// Fit every spectrum in `series`, calling `on_progress` once per completion.
    ///
    /// Only configuration and pool errors are returned; per-spectrum failures
    /// are recorded in the outcome.
    pub fn run_with_progress<F>(
        &self,
        series: &SpectrumSeries,
        config: &FitConfig,
        mut on_progress: F,
    ) -> Result<BatchOutcome, FitError>
    where
        F: FnMut(Progress),
    {
        // Fail fast on a bad config before any thread is spawned.
        build_model(config)?;

        let total = series.len();
        let mut outcome = BatchOutcome {
            requested: total,
            ..BatchOutcome::default()
        };
        if total == 0 {
            return Ok(outcome);
        }

        let workers = self.worker_count(total);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("plfit-worker-{i}"))
            .build()
            .map_err(|e| FitError::Pool(format!("failed to create thread pool: {e}")))?;

        log::info!(
            "fitting {total} spectra on {workers} workers (smart init: {}, radius {})",
            self.options.smart_init,
            self.options.search_radius
        );

        let (tx, rx) = mpsc::channel::<FitResult>();
        let milestone = (total / 10).max(1);
        let mut next = 0usize;
        let mut in_flight = 0usize;
        let mut completed = 0usize;

        loop {
            while in_flight < workers && next < total {
                if self.cancel.is_cancelled() {
                    log::info!("batch cancelled; skipping {} undispatched spectra", total - next);
                    outcome.cancelled.extend(next..total);
                    next = total;
                    break;
                }
                let task = self.make_task(series, config, next, &outcome.results)?;
                let tx = tx.clone();
                pool.spawn(move || {
                    let result = fit_spectrum(&task);
                    // The receiver outlives every task; a send error means the
                    // dispatcher itself is gone and there is nobody to report to.
                    let _ = tx.send(result);
                });
                in_flight += 1;
                next += 1;
            }

            if in_flight == 0 {
                break;
            }

            let result = rx
                .recv()
                .map_err(|e| FitError::Pool(format!("result channel closed: {e}")))?;
            in_flight -= 1;
            completed += 1;

            if !result.success {
                log::warn!(
                    "spectrum {} (t={}) failed: {}",
                    result.index,
                    result.time,
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
            if completed % milestone == 0 || completed == total {
                log::info!("fitted {completed}/{total} spectra");
            }

            on_progress(Progress {
                completed,
                total,
                index: result.index,
                success: result.success,
            });
            outcome.results.insert(result.index, result);
        }

        let failed = outcome.results.values().filter(|r| !r.success).count();
        log::info!(
            "batch finished: {} succeeded, {failed} failed, {} cancelled",
            outcome.results.len() - failed,
            outcome.cancelled.len()
        );

        Ok(outcome)
    }

    fn make_task(
        &self,
        series: &SpectrumSeries,
        base: &FitConfig,
        index: usize,
        registry: &BTreeMap<usize, FitResult>,
    ) -> Result<FitTask, FitError> {
        let row = series
            .row(index)
            .ok_or_else(|| FitError::InvalidInput(format!("no intensity row {index}")))?;

        let seeded = if self.options.smart_init {
            smart_init_config(base, index, registry, self.options.search_radius)
        } else {
            None
        };
        let smart_init_used = seeded.is_some();

        Ok(FitTask {
            index,
            time: series.timestamps()[index],
            wavelengths: series.wavelengths().to_vec(),
            intensities: row.to_vec(),
            config: seeded.unwrap_or_else(|| base.clone()),
            smart_init_used,
            lm: self.options.lm,
            timeout: self.options.task_timeout,
        })
    }
}
