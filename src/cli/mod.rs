//! Command-line parsing for the PL peak fitter.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! fitting code. Conversion into domain types happens in `app`.

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::domain::{PeakKind, PeakSpec};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "plfit", version, about = "Parallel PL spectral peak fitting")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit a synthetic drifting-peak series and print the result table.
    Fit(FitArgs),
    /// Describe the model a configuration would build, without fitting.
    Summary(ModelArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackgroundArg {
    None,
    Linear,
    Polynomial,
    Exponential,
}

/// Model definition shared by every subcommand.
#[derive(Debug, Args, Clone)]
pub struct ModelArgs {
    /// Peak as kind:center:height:sigma (repeatable).
    #[arg(long = "peak", value_name = "SPEC", default_value = "gaussian:610:800:25")]
    pub peaks: Vec<PeakSpec>,

    /// Background component.
    #[arg(long, value_enum, default_value_t = BackgroundArg::Linear)]
    pub background: BackgroundArg,

    /// Degree for `--background polynomial`.
    #[arg(long, default_value_t = 2)]
    pub poly_degree: usize,

    /// Allowed distance of each peak center from its starting guess.
    #[arg(long, default_value_t = 50.0)]
    pub center_margin: f64,
}

/// Options for `plfit fit`.
#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// Number of spectra in the synthetic series.
    #[arg(short = 'n', long, default_value_t = 100)]
    pub spectra: usize,

    /// Number of wavelength points per spectrum.
    #[arg(long, default_value_t = 221)]
    pub points: usize,

    /// Lower end of the wavelength grid (nm).
    #[arg(long, default_value_t = 500.0)]
    pub wl_min: f64,

    /// Upper end of the wavelength grid (nm).
    #[arg(long, default_value_t = 720.0)]
    pub wl_max: f64,

    /// Line shape of the generated peak.
    #[arg(long, default_value = "gaussian", value_parser = parse_kind)]
    pub true_kind: PeakKind,

    /// True peak center of the first spectrum (nm).
    #[arg(long, default_value_t = 600.0)]
    pub center_start: f64,

    /// True peak center of the last spectrum (nm).
    #[arg(long, default_value_t = 620.0)]
    pub center_end: f64,

    /// True peak height.
    #[arg(long, default_value_t = 1000.0)]
    pub true_height: f64,

    /// True peak sigma (nm).
    #[arg(long, default_value_t = 20.0)]
    pub true_sigma: f64,

    /// Slope of the generated linear background.
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub true_slope: f64,

    /// Intercept of the generated linear background.
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub true_intercept: f64,

    /// Seconds between consecutive spectra.
    #[arg(long, default_value_t = 1.0)]
    pub time_step: f64,

    /// Standard deviation of additive Gaussian noise.
    #[arg(long, default_value_t = 5.0)]
    pub noise: f64,

    /// Random seed for the synthetic series.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Worker pool size (defaults to min(cores, spectra)).
    #[arg(long, env = "PLFIT_MAX_WORKERS")]
    pub max_workers: Option<usize>,

    /// Fit every spectrum from the configured guesses only.
    #[arg(long)]
    pub no_smart_init: bool,

    /// How far (in indices) to look for a solved neighbour.
    #[arg(long, env = "PLFIT_SEARCH_RADIUS", default_value_t = 5)]
    pub search_radius: usize,

    /// Per-spectrum time limit in milliseconds.
    #[arg(long, env = "PLFIT_TASK_TIMEOUT_MS")]
    pub task_timeout_ms: Option<u64>,

    /// Optimizer iteration cap.
    #[arg(long, default_value_t = 500)]
    pub max_iterations: usize,

    /// Rows shown in the terminal table.
    #[arg(long, default_value_t = 20)]
    pub rows: usize,

    /// Print the result table as JSON on stdout instead of text.
    #[arg(long)]
    pub json: bool,
}

fn parse_kind(s: &str) -> Result<PeakKind, String> {
    s.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_defaults_parse() {
        let cli = Cli::parse_from(["plfit", "fit"]);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.spectra, 100);
        assert_eq!(args.model.peaks, vec![PeakSpec::new(PeakKind::Gaussian, 610.0, 800.0, 25.0)]);
        assert_eq!(args.model.background, BackgroundArg::Linear);
        assert!(!args.no_smart_init);
    }

    #[test]
    fn repeated_peaks_are_collected() {
        let cli = Cli::parse_from([
            "plfit",
            "summary",
            "--peak",
            "gaussian:600:100:10",
            "--peak",
            "voigt:650:50:8",
            "--background",
            "polynomial",
            "--poly-degree",
            "3",
        ]);
        let Command::Summary(args) = cli.command else {
            panic!("expected summary");
        };
        assert_eq!(args.peaks.len(), 2);
        assert_eq!(args.peaks[1].kind, PeakKind::Voigt);
        assert_eq!(args.poly_degree, 3);
    }

    #[test]
    fn malformed_peak_is_rejected() {
        assert!(Cli::try_parse_from(["plfit", "summary", "--peak", "gaussian:600"]).is_err());
    }
}
