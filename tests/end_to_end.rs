use pl_fit::app::pipeline::{center_correlation, run_fit};
use pl_fit::data::{SyntheticSpec, generate_series};
use pl_fit::domain::{BackgroundSpec, FitConfig, ParamId, ParamKind, PeakKind, PeakSpec};
use pl_fit::fit::{FitDispatcher, RunOptions};
use pl_fit::report::aggregate;

fn drift_spec() -> SyntheticSpec {
    SyntheticSpec {
        n_spectra: 100,
        center_start: 600.0,
        center_end: 620.0,
        height: 1000.0,
        sigma: 20.0,
        noise_sd: 2.0,
        seed: 11,
        ..SyntheticSpec::default()
    }
}

fn drift_config() -> FitConfig {
    FitConfig::new(
        BackgroundSpec::Linear,
        vec![PeakSpec::new(PeakKind::Gaussian, 610.0, 800.0, 25.0)],
    )
    .unwrap()
}

fn options() -> RunOptions {
    RunOptions {
        max_workers: Some(4),
        smart_init: true,
        search_radius: 5,
        ..RunOptions::default()
    }
}

#[test]
fn drifting_peak_is_tracked_across_the_series() {
    let run = run_fit(&drift_config(), &options(), &drift_spec()).unwrap();
    let table = &run.table;

    assert_eq!(table.requested, 100);
    assert!(table.succeeded() >= 95, "only {} fits succeeded", table.succeeded());

    let r = run.center_correlation.expect("correlation");
    assert!(r > 0.99, "center correlation r = {r}");

    // Fitted centers stay close to the truth, not just correlated with it.
    for (t, c) in table.parameter_series(ParamId::peak(0, ParamKind::Center)) {
        let truth = run.true_centers[t as usize];
        assert!((c - truth).abs() < 1.0, "t={t}: fitted {c}, true {truth}");
    }
}

#[test]
fn table_rows_match_successes_in_index_order() {
    let generated = generate_series(&drift_spec()).unwrap();
    let outcome = FitDispatcher::new(options())
        .run(&generated.series, &drift_config())
        .unwrap();

    let successes = outcome.results.values().filter(|r| r.success).count();
    let table = aggregate(outcome);

    assert_eq!(table.rows.len(), successes);
    assert_eq!(table.rows.len() + table.failures.count, table.requested);
    assert!(table.rows.windows(2).all(|w| w[0].index < w[1].index));
    assert!(center_correlation(&table, &generated.true_centers).is_some());
}

#[test]
fn smart_init_off_matches_across_pool_sizes() {
    let spec = SyntheticSpec {
        n_spectra: 20,
        ..drift_spec()
    };
    let generated = generate_series(&spec).unwrap();
    let config = drift_config();

    let run = |workers: usize| {
        let opts = RunOptions {
            max_workers: Some(workers),
            smart_init: false,
            ..RunOptions::default()
        };
        aggregate(FitDispatcher::new(opts).run(&generated.series, &config).unwrap())
    };

    let one = run(1);
    let eight = run(8);
    assert_eq!(one.rows, eight.rows);
}
