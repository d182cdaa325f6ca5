//! Assemble per-spectrum results into an ordered parameter table.
//!
//! Rows are successful fits only, in ascending spectrum index regardless of
//! completion order. Failed spectra are listed separately so that a run in
//! which everything failed never looks like a run with nothing to fit.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::domain::{FitResult, ParamId};
use crate::fit::BatchOutcome;

/// Fixed leading columns of every table.
pub const BASE_COLUMNS: [&str; 6] = ["index", "time", "r_squared", "chi_squared", "aic", "bic"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamColumn {
    pub id: ParamId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub index: usize,
    pub time: f64,
    pub r_squared: f64,
    pub chi_squared: f64,
    pub aic: f64,
    pub bic: f64,
    /// Aligned with `FitResultTable::columns`.
    pub values: Vec<Option<f64>>,
    pub stderrs: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FailureSummary {
    pub count: usize,
    pub indices: Vec<usize>,
    pub messages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitResultTable {
    /// Number of spectra the batch was asked to fit.
    pub requested: usize,
    pub columns: Vec<ParamColumn>,
    pub rows: Vec<TableRow>,
    pub failures: FailureSummary,
    pub cancelled: Vec<usize>,
    /// Every result (successes and failures), ordered by index, for curve plots.
    pub results: Vec<FitResult>,
}

impl FitResultTable {
    pub fn succeeded(&self) -> usize {
        self.rows.len()
    }

    /// Nothing was requested (as opposed to everything failing).
    pub fn is_empty_request(&self) -> bool {
        self.requested == 0
    }

    pub fn all_failed(&self) -> bool {
        self.requested > 0 && self.rows.is_empty() && self.failures.count > 0
    }

    /// Full header: base columns, then `<param>` and `<param>_stderr` pairs.
    pub fn column_names(&self) -> Vec<String> {
        let mut names: Vec<String> = BASE_COLUMNS.iter().map(|s| s.to_string()).collect();
        for col in &self.columns {
            names.push(col.name.clone());
            names.push(format!("{}_stderr", col.name));
        }
        names
    }

    /// `(time, value)` pairs of one parameter across successful fits.
    pub fn parameter_series(&self, id: ParamId) -> Vec<(f64, f64)> {
        let Some(col) = self.columns.iter().position(|c| c.id == id) else {
            return Vec::new();
        };
        self.rows
            .iter()
            .filter_map(|row| row.values[col].map(|v| (row.time, v)))
            .collect()
    }
}

/// Consume a batch outcome and build the table.
pub fn aggregate(outcome: BatchOutcome) -> FitResultTable {
    let BatchOutcome {
        requested,
        results,
        cancelled,
    } = outcome;

    // BTreeMap iteration is already index-ordered.
    let results: Vec<FitResult> = results.into_values().collect();

    let ids: BTreeSet<ParamId> = results
        .iter()
        .filter(|r| r.success)
        .flat_map(|r| r.parameters.iter().map(|p| p.id))
        .filter(|id| id.kind.is_tabulated())
        .collect();
    let columns: Vec<ParamColumn> = ids
        .into_iter()
        .map(|id| ParamColumn {
            id,
            name: id.to_string(),
        })
        .collect();

    let mut rows = Vec::new();
    let mut failures = FailureSummary::default();

    for r in &results {
        if !r.success {
            failures.count += 1;
            failures.indices.push(r.index);
            failures
                .messages
                .push(r.error.clone().unwrap_or_else(|| "unknown error".to_string()));
            continue;
        }

        let (values, stderrs): (Vec<Option<f64>>, Vec<Option<f64>>) = columns
            .iter()
            .map(|c| match r.param(c.id) {
                Some(p) => (Some(p.value), p.stderr),
                None => (None, None),
            })
            .unzip();

        rows.push(TableRow {
            index: r.index,
            time: r.time,
            r_squared: r.r_squared.unwrap_or(f64::NAN),
            chi_squared: r.chi_squared.unwrap_or(f64::NAN),
            aic: r.aic.unwrap_or(f64::NAN),
            bic: r.bic.unwrap_or(f64::NAN),
            values,
            stderrs,
        });
    }

    FitResultTable {
        requested,
        columns,
        rows,
        failures,
        cancelled,
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::domain::{ParamEstimate, ParamKind};

    fn success(index: usize) -> FitResult {
        let mut r = FitResult::failure(index, index as f64 * 2.0, "", false);
        r.success = true;
        r.error = None;
        r.r_squared = Some(0.99);
        r.chi_squared = Some(1.0);
        r.aic = Some(-10.0);
        r.bic = Some(-8.0);
        r.parameters = vec![
            ParamEstimate {
                id: ParamId::peak(0, ParamKind::Center),
                value: 600.0 + index as f64,
                stderr: Some(0.1),
                min: 550.0,
                max: 650.0,
            },
            ParamEstimate {
                id: ParamId::background(ParamKind::Slope),
                value: 0.5,
                stderr: None,
                min: f64::NEG_INFINITY,
                max: f64::INFINITY,
            },
        ];
        r
    }

    fn outcome(results: Vec<FitResult>, requested: usize) -> BatchOutcome {
        BatchOutcome {
            requested,
            results: results.into_iter().map(|r| (r.index, r)).collect::<BTreeMap<_, _>>(),
            cancelled: Vec::new(),
        }
    }

    #[test]
    fn rows_are_successes_in_index_order() {
        // Insertion order mimics out-of-order completion.
        let results = vec![
            success(4),
            FitResult::failure(2, 4.0, "diverged", false),
            success(0),
            success(3),
        ];
        let table = aggregate(outcome(results, 5));

        let idx: Vec<usize> = table.rows.iter().map(|r| r.index).collect();
        assert_eq!(idx, vec![0, 3, 4]);
        assert_eq!(table.succeeded(), 3);
        assert_eq!(table.failures.count, 1);
        assert_eq!(table.failures.indices, vec![2]);
        assert_eq!(table.failures.messages, vec!["diverged".to_string()]);
        assert_eq!(table.results.len(), 4);
    }

    #[test]
    fn only_peak_shape_parameters_become_columns() {
        let table = aggregate(outcome(vec![success(0)], 1));
        assert_eq!(table.columns.len(), 1);
        assert_eq!(table.columns[0].name, "p0_center");
        assert_eq!(
            table.column_names(),
            vec!["index", "time", "r_squared", "chi_squared", "aic", "bic", "p0_center", "p0_center_stderr"]
        );
        assert_eq!(table.rows[0].stderrs, vec![Some(0.1)]);
    }

    #[test]
    fn total_failure_is_distinguishable_from_empty_request() {
        let all_failed = aggregate(outcome(vec![FitResult::failure(0, 0.0, "x", false)], 1));
        assert!(all_failed.all_failed());
        assert!(!all_failed.is_empty_request());
        assert!(all_failed.rows.is_empty());

        let empty = aggregate(outcome(Vec::new(), 0));
        assert!(empty.is_empty_request());
        assert!(!empty.all_failed());
    }

    #[test]
    fn parameter_series_follows_time() {
        let table = aggregate(outcome(vec![success(1), success(0)], 2));
        let series = table.parameter_series(ParamId::peak(0, ParamKind::Center));
        assert_eq!(series, vec![(0.0, 600.0), (2.0, 601.0)]);
        assert!(table.parameter_series(ParamId::peak(5, ParamKind::Center)).is_empty());
    }
}
