//! Shared domain types.
//!
//! These types are kept plain and serializable so they can be:
//!
//! - copied into self-contained fit tasks
//! - handed to a downstream visualizer as JSON
//! - compared across runs in tests

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FitError;

/// Highest polynomial background degree accepted.
pub const MAX_POLY_DEGREE: usize = 7;

/// Peak line shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeakKind {
    Gaussian,
    Voigt,
    Lorentzian,
}

impl PeakKind {
    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            PeakKind::Gaussian => "Gaussian",
            PeakKind::Voigt => "Voigt",
            PeakKind::Lorentzian => "Lorentzian",
        }
    }

    /// Number of free parameters contributed by one peak of this kind.
    pub fn param_count(self) -> usize {
        match self {
            PeakKind::Gaussian | PeakKind::Lorentzian => 3,
            PeakKind::Voigt => 4,
        }
    }

    /// Initial area parameter for a peak of the given height and width.
    ///
    /// Voigt shares the Gaussian convention; the γ contribution is ignored here.
    pub fn amplitude_from_height(self, height: f64, sigma: f64) -> f64 {
        match self {
            PeakKind::Gaussian | PeakKind::Voigt => height * sigma * (2.0 * std::f64::consts::PI).sqrt(),
            PeakKind::Lorentzian => height * sigma * std::f64::consts::PI,
        }
    }

    /// Inverse of [`PeakKind::amplitude_from_height`].
    ///
    /// Returns `None` when `sigma` is not a usable width.
    pub fn height_from_amplitude(self, amplitude: f64, sigma: f64) -> Option<f64> {
        if !(sigma.is_finite() && sigma > 0.0 && amplitude.is_finite()) {
            return None;
        }
        let h = match self {
            PeakKind::Gaussian | PeakKind::Voigt => amplitude / (sigma * (2.0 * std::f64::consts::PI).sqrt()),
            PeakKind::Lorentzian => amplitude / (sigma * std::f64::consts::PI),
        };
        Some(h)
    }
}

impl FromStr for PeakKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gaussian" | "gauss" | "g" => Ok(PeakKind::Gaussian),
            "voigt" | "v" => Ok(PeakKind::Voigt),
            "lorentzian" | "lorentz" | "l" => Ok(PeakKind::Lorentzian),
            other => Err(format!("unknown peak kind '{other}' (expected gaussian, voigt or lorentzian)")),
        }
    }
}

/// One peak requested by the user, with its starting guesses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakSpec {
    pub kind: PeakKind,
    pub center: f64,
    pub height: f64,
    pub sigma: f64,
}

impl PeakSpec {
    pub fn new(kind: PeakKind, center: f64, height: f64, sigma: f64) -> Self {
        Self {
            kind,
            center,
            height,
            sigma,
        }
    }
}

/// Parses `kind:center:height:sigma`, e.g. `gaussian:650:1000:20`.
impl FromStr for PeakSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 4 {
            return Err(format!("peak '{s}' must look like kind:center:height:sigma"));
        }
        let kind = parts[0].parse::<PeakKind>()?;
        let num = |label: &str, raw: &str| -> Result<f64, String> {
            raw.trim()
                .parse::<f64>()
                .map_err(|e| format!("peak '{s}': invalid {label} '{raw}': {e}"))
        };
        Ok(PeakSpec::new(
            kind,
            num("center", parts[1])?,
            num("height", parts[2])?,
            num("sigma", parts[3])?,
        ))
    }
}

/// Background component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum BackgroundSpec {
    None,
    Linear,
    Polynomial { degree: usize },
    Exponential,
}

impl BackgroundSpec {
    pub fn display_name(self) -> String {
        match self {
            BackgroundSpec::None => "None".to_string(),
            BackgroundSpec::Linear => "Linear".to_string(),
            BackgroundSpec::Polynomial { degree } => format!("Polynomial (degree {degree})"),
            BackgroundSpec::Exponential => "Exponential".to_string(),
        }
    }

    /// Number of free parameters (slope+intercept, c0..cd, or amplitude+decay+offset).
    pub fn param_count(self) -> usize {
        match self {
            BackgroundSpec::None => 0,
            BackgroundSpec::Linear => 2,
            BackgroundSpec::Polynomial { degree } => degree + 1,
            BackgroundSpec::Exponential => 3,
        }
    }
}

/// Bound margins applied to every peak.
///
/// The defaults are tuned to PL peaks measured in nm: centers may move ±50 from
/// their guess and widths stay within [1, 100].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundsPolicy {
    pub center_margin: f64,
    pub sigma_min: f64,
    pub sigma_max: f64,
    pub gamma_min: f64,
    pub gamma_max: f64,
}

impl Default for BoundsPolicy {
    fn default() -> Self {
        Self {
            center_margin: 50.0,
            sigma_min: 1.0,
            sigma_max: 100.0,
            gamma_min: 0.1,
            gamma_max: 100.0,
        }
    }
}

/// A validated, immutable description of the composite model to fit.
///
/// Construct with [`FitConfig::new`]; there is no way to obtain a config
/// without a background and without peaks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitConfig {
    background: BackgroundSpec,
    peaks: Vec<PeakSpec>,
    bounds: BoundsPolicy,
}

impl FitConfig {
    pub fn new(background: BackgroundSpec, peaks: Vec<PeakSpec>) -> Result<Self, FitError> {
        Self::with_bounds(background, peaks, BoundsPolicy::default())
    }

    pub fn with_bounds(
        background: BackgroundSpec,
        peaks: Vec<PeakSpec>,
        bounds: BoundsPolicy,
    ) -> Result<Self, FitError> {
        let config = Self {
            background,
            peaks,
            bounds,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn background(&self) -> BackgroundSpec {
        self.background
    }

    pub fn peaks(&self) -> &[PeakSpec] {
        &self.peaks
    }

    pub fn bounds(&self) -> &BoundsPolicy {
        &self.bounds
    }

    /// Total number of free parameters in the composite model.
    pub fn param_count(&self) -> usize {
        self.background.param_count() + self.peaks.iter().map(|p| p.kind.param_count()).sum::<usize>()
    }

    /// A copy of this config with replacement peak guesses.
    ///
    /// Kinds and order must match the current peaks; only guesses change.
    pub(crate) fn with_peak_guesses(&self, peaks: Vec<PeakSpec>) -> Self {
        debug_assert_eq!(peaks.len(), self.peaks.len());
        Self {
            background: self.background,
            peaks,
            bounds: self.bounds,
        }
    }

    fn validate(&self) -> Result<(), FitError> {
        if self.background == BackgroundSpec::None && self.peaks.is_empty() {
            return Err(FitError::Configuration(
                "model has no background and no peaks".to_string(),
            ));
        }
        if let BackgroundSpec::Polynomial { degree } = self.background {
            if degree > MAX_POLY_DEGREE {
                return Err(FitError::Configuration(format!(
                    "polynomial degree {degree} exceeds {MAX_POLY_DEGREE}"
                )));
            }
        }
        let b = &self.bounds;
        if !(b.center_margin.is_finite() && b.center_margin > 0.0) {
            return Err(FitError::Configuration("center margin must be finite and > 0".to_string()));
        }
        if !(b.sigma_min > 0.0 && b.sigma_max > b.sigma_min && b.sigma_max.is_finite()) {
            return Err(FitError::Configuration(format!(
                "invalid sigma bounds [{}, {}]",
                b.sigma_min, b.sigma_max
            )));
        }
        if !(b.gamma_min > 0.0 && b.gamma_max > b.gamma_min && b.gamma_max.is_finite()) {
            return Err(FitError::Configuration(format!(
                "invalid gamma bounds [{}, {}]",
                b.gamma_min, b.gamma_max
            )));
        }
        for (i, p) in self.peaks.iter().enumerate() {
            if !(p.center.is_finite() && p.height.is_finite()) {
                return Err(FitError::Configuration(format!("peak {i}: center and height must be finite")));
            }
            if !(p.sigma.is_finite() && p.sigma > 0.0) {
                return Err(FitError::Configuration(format!(
                    "peak {i}: sigma must be finite and > 0 (got {})",
                    p.sigma
                )));
            }
        }
        Ok(())
    }
}

/// A time series of spectra sharing one wavelength grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpectrumSeries {
    wavelengths: Vec<f64>,
    timestamps: Vec<f64>,
    intensities: Vec<Vec<f64>>,
}

impl SpectrumSeries {
    /// Build a series, checking that every row matches the wavelength grid.
    pub fn new(wavelengths: Vec<f64>, timestamps: Vec<f64>, intensities: Vec<Vec<f64>>) -> Result<Self, FitError> {
        if timestamps.len() != intensities.len() {
            return Err(FitError::InvalidInput(format!(
                "{} timestamps but {} intensity rows",
                timestamps.len(),
                intensities.len()
            )));
        }
        if let Some((i, row)) = intensities
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != wavelengths.len())
        {
            return Err(FitError::InvalidInput(format!(
                "row {i} has {} points but the wavelength grid has {}",
                row.len(),
                wavelengths.len()
            )));
        }
        Ok(Self {
            wavelengths,
            timestamps,
            intensities,
        })
    }

    pub fn wavelengths(&self) -> &[f64] {
        &self.wavelengths
    }

    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    pub fn row(&self, index: usize) -> Option<&[f64]> {
        self.intensities.get(index).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Which sub-model a parameter belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    Background,
    Peak(usize),
}

/// What a parameter means within its component.
///
/// Declaration order is the column order used in result tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Center,
    Amplitude,
    Sigma,
    Gamma,
    /// Peak maximum derived from the fitted amplitude and widths.
    Height,
    Slope,
    Intercept,
    Coefficient(usize),
    Decay,
    Offset,
}

impl ParamKind {
    /// Whether this parameter is reported in the peak parameter table.
    pub fn is_tabulated(self) -> bool {
        matches!(
            self,
            ParamKind::Center | ParamKind::Amplitude | ParamKind::Sigma | ParamKind::Gamma | ParamKind::Height
        )
    }
}

/// Structured parameter identity.
///
/// `Display` renders the lab naming (`bg_slope`, `p0_center`); nothing parses it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParamId {
    pub component: Component,
    pub kind: ParamKind,
}

impl ParamId {
    pub fn background(kind: ParamKind) -> Self {
        Self {
            component: Component::Background,
            kind,
        }
    }

    pub fn peak(index: usize, kind: ParamKind) -> Self {
        Self {
            component: Component::Peak(index),
            kind,
        }
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.component {
            Component::Background => write!(f, "bg_")?,
            Component::Peak(i) => write!(f, "p{i}_")?,
        }
        match self.kind {
            ParamKind::Center => write!(f, "center"),
            ParamKind::Amplitude => write!(f, "amplitude"),
            ParamKind::Sigma => write!(f, "sigma"),
            ParamKind::Gamma => write!(f, "gamma"),
            ParamKind::Height => write!(f, "height"),
            ParamKind::Slope => write!(f, "slope"),
            ParamKind::Intercept => write!(f, "intercept"),
            ParamKind::Coefficient(k) => write!(f, "c{k}"),
            ParamKind::Decay => write!(f, "decay"),
            ParamKind::Offset => write!(f, "offset"),
        }
    }
}

/// Fitted value of one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamEstimate {
    pub id: ParamId,
    pub value: f64,
    /// `None` when the covariance matrix could not be estimated.
    pub stderr: Option<f64>,
    pub min: f64,
    pub max: f64,
}

/// Outcome of fitting one spectrum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub index: usize,
    pub time: f64,
    pub success: bool,
    pub r_squared: Option<f64>,
    pub chi_squared: Option<f64>,
    pub reduced_chi_squared: Option<f64>,
    pub aic: Option<f64>,
    pub bic: Option<f64>,
    pub parameters: Vec<ParamEstimate>,
    pub fitted_curve: Vec<f64>,
    /// Observed minus fitted, per wavelength.
    pub residuals: Vec<f64>,
    pub error: Option<String>,
    /// True when the starting guesses came from a neighbouring fit.
    pub smart_init_used: bool,
    pub iterations: usize,
}

impl FitResult {
    /// A record for a spectrum that produced no usable fit.
    pub fn failure(index: usize, time: f64, error: impl Into<String>, smart_init_used: bool) -> Self {
        Self {
            index,
            time,
            success: false,
            r_squared: None,
            chi_squared: None,
            reduced_chi_squared: None,
            aic: None,
            bic: None,
            parameters: Vec::new(),
            fitted_curve: Vec::new(),
            residuals: Vec::new(),
            error: Some(error.into()),
            smart_init_used,
            iterations: 0,
        }
    }

    pub fn param(&self, id: ParamId) -> Option<&ParamEstimate> {
        self.parameters.iter().find(|p| p.id == id)
    }

    pub fn param_value(&self, id: ParamId) -> Option<f64> {
        self.param(id).map(|p| p.value)
    }
}
