//! Formatted terminal output for batch results.
//!
//! Formatting lives here so the fitting code stays free of presentation.

use chrono::Local;

use crate::domain::FitConfig;
use crate::fit::RunOptions;
use crate::models::ModelSummary;
use crate::report::table::{BASE_COLUMNS, FitResultTable};

/// Run header: model description and run options.
pub fn format_run_header(config: &FitConfig, options: &RunOptions, workers: usize) -> String {
    let mut out = String::new();
    out.push_str("=== plfit - PL peak fitting ===\n");
    out.push_str(&format!("Run: {}\n", Local::now().format("%Y-%m-%d %H:%M:%S")));
    out.push_str(&ModelSummary::from_config(config).format());
    out.push_str(&format!(
        "Workers: {workers} | smart init: {} (radius {}) | timeout: {}\n",
        if options.smart_init { "on" } else { "off" },
        options.search_radius,
        options
            .task_timeout
            .map(|t| format!("{} ms", t.as_millis()))
            .unwrap_or_else(|| "none".to_string()),
    ));
    out
}

/// Success/failure counts plus the list of failed spectra.
pub fn format_summary(table: &FitResultTable) -> String {
    let mut out = String::new();

    if table.is_empty_request() {
        out.push_str("No spectra requested.\n");
        return out;
    }

    out.push_str(&format!(
        "Spectra: requested={} succeeded={} failed={} cancelled={}\n",
        table.requested,
        table.succeeded(),
        table.failures.count,
        table.cancelled.len()
    ));
    if table.all_failed() {
        out.push_str("All fits failed.\n");
    }

    if table.failures.count > 0 {
        out.push_str("\nFailed spectra:\n");
        for (idx, msg) in table.failures.indices.iter().zip(&table.failures.messages) {
            out.push_str(&format!("  #{idx:<6} {msg}\n"));
        }
    }

    out
}

/// Parameter table, showing at most `max_rows` rows (head only).
pub fn format_table(table: &FitResultTable, max_rows: usize) -> String {
    let mut out = String::new();

    let mut header = format!(
        "{:>6} {:>10} {:>9} {:>12} {:>10} {:>10}",
        BASE_COLUMNS[0], BASE_COLUMNS[1], BASE_COLUMNS[2], BASE_COLUMNS[3], BASE_COLUMNS[4], BASE_COLUMNS[5]
    );
    for col in &table.columns {
        header.push_str(&format!(" {:>14} {:>10}", truncate(&col.name, 14), "±"));
    }
    out.push_str(header.trim_end());
    out.push('\n');
    out.push_str(&"-".repeat(header.trim_end().chars().count()));
    out.push('\n');

    for row in table.rows.iter().take(max_rows) {
        let mut line = format!(
            "{:>6} {:>10.3} {:>9.6} {:>12.4e} {:>10.2} {:>10.2}",
            row.index, row.time, row.r_squared, row.chi_squared, row.aic, row.bic
        );
        for (v, se) in row.values.iter().zip(&row.stderrs) {
            line.push_str(&format!(" {:>14} {:>10}", fmt_opt(*v, 4), fmt_opt(*se, 4)));
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }

    if table.rows.len() > max_rows {
        out.push_str(&format!("... {} more rows\n", table.rows.len() - max_rows));
    }

    out
}

fn fmt_opt(v: Option<f64>, digits: usize) -> String {
    match v {
        Some(x) if x.is_finite() => format!("{x:.digits$}"),
        Some(_) => "inf".to_string(),
        None => "-".to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}
