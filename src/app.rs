//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - builds the fit configuration and run options
//! - runs the batch and prints the report

use std::time::Duration;

use clap::Parser;

use crate::cli::{BackgroundArg, Command, FitArgs, ModelArgs};
use crate::data::SyntheticSpec;
use crate::domain::{BackgroundSpec, BoundsPolicy, FitConfig};
use crate::error::AppError;
use crate::fit::{LmConfig, RunOptions};
use crate::models::ModelSummary;

pub mod pipeline;

/// Entry point for the `plfit` binary.
pub fn run() -> Result<(), AppError> {
    // A missing .env is the normal case.
    dotenvy::dotenv().ok();

    let cli = crate::cli::Cli::parse();
    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Summary(args) => handle_summary(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(&args.model)?;
    let options = run_options_from_args(&args);
    let synthetic = synthetic_spec_from_args(&args);

    let run = pipeline::run_fit(&config, &options, &synthetic)?;

    if args.json {
        let json = serde_json::to_string_pretty(&run.table)
            .map_err(|e| AppError::new(4, format!("Failed to serialize results: {e}")))?;
        println!("{json}");
        return Ok(());
    }

    println!("{}", crate::report::format_run_header(&config, &options, run.workers));
    println!("{}", crate::report::format_table(&run.table, args.rows));
    println!("{}", crate::report::format_summary(&run.table));
    if let Some(r) = run.center_correlation {
        println!("Fitted vs true center correlation: r = {r:.5}");
    }

    if run.table.all_failed() {
        return Err(AppError::new(4, "Every spectrum failed to fit."));
    }
    Ok(())
}

fn handle_summary(args: ModelArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(&args)?;
    print!("{}", ModelSummary::from_config(&config).format());
    Ok(())
}

pub fn fit_config_from_args(args: &ModelArgs) -> Result<FitConfig, AppError> {
    let background = match args.background {
        BackgroundArg::None => BackgroundSpec::None,
        BackgroundArg::Linear => BackgroundSpec::Linear,
        BackgroundArg::Polynomial => BackgroundSpec::Polynomial {
            degree: args.poly_degree,
        },
        BackgroundArg::Exponential => BackgroundSpec::Exponential,
    };
    let bounds = BoundsPolicy {
        center_margin: args.center_margin,
        ..BoundsPolicy::default()
    };
    Ok(FitConfig::with_bounds(background, args.peaks.clone(), bounds)?)
}

pub fn run_options_from_args(args: &FitArgs) -> RunOptions {
    RunOptions {
        max_workers: args.max_workers,
        smart_init: !args.no_smart_init,
        search_radius: args.search_radius,
        task_timeout: args.task_timeout_ms.map(Duration::from_millis),
        lm: LmConfig {
            max_iterations: args.max_iterations,
            ..LmConfig::default()
        },
    }
}

fn synthetic_spec_from_args(args: &FitArgs) -> SyntheticSpec {
    SyntheticSpec {
        n_spectra: args.spectra,
        wl_min: args.wl_min,
        wl_max: args.wl_max,
        n_points: args.points,
        kind: args.true_kind,
        center_start: args.center_start,
        center_end: args.center_end,
        height: args.true_height,
        sigma: args.true_sigma,
        slope: args.true_slope,
        intercept: args.true_intercept,
        noise_sd: args.noise,
        time_step: args.time_step,
        seed: args.seed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;

    fn fit_args(argv: &[&str]) -> FitArgs {
        let mut full = vec!["plfit", "fit"];
        full.extend_from_slice(argv);
        match Cli::parse_from(full).command {
            Command::Fit(args) => args,
            Command::Summary(_) => panic!("expected fit"),
        }
    }

    #[test]
    fn args_map_to_domain_config() {
        let args = fit_args(&["--background", "polynomial", "--poly-degree", "3", "--center-margin", "20"]);
        let config = fit_config_from_args(&args.model).unwrap();
        assert_eq!(config.background(), BackgroundSpec::Polynomial { degree: 3 });
        assert_eq!(config.bounds().center_margin, 20.0);
        assert_eq!(config.param_count(), 4 + 3);
    }

    #[test]
    fn invalid_model_maps_to_config_exit_code() {
        let args = fit_args(&["--background", "polynomial", "--poly-degree", "12"]);
        let err = fit_config_from_args(&args.model).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn synthetic_background_flags_reach_the_generator() {
        let args = fit_args(&["--true-slope", "0.5", "--true-intercept", "-20", "--time-step", "2.5"]);
        let spec = synthetic_spec_from_args(&args);
        assert_eq!(spec.slope, 0.5);
        assert_eq!(spec.intercept, -20.0);
        assert_eq!(spec.time_step, 2.5);
    }

    #[test]
    fn run_options_follow_flags() {
        let args = fit_args(&["--no-smart-init", "--max-workers", "3", "--task-timeout-ms", "250"]);
        let options = run_options_from_args(&args);
        assert!(!options.smart_init);
        assert_eq!(options.max_workers, Some(3));
        assert_eq!(options.task_timeout, Some(Duration::from_millis(250)));
    }
}
