//! Human-readable description of a fit configuration.

use serde::Serialize;

use crate::domain::{FitConfig, PeakKind};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeakSummary {
    pub index: usize,
    pub kind: PeakKind,
    pub initial_center: f64,
    pub initial_height: f64,
    pub initial_sigma: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    pub background: String,
    pub peaks: Vec<PeakSummary>,
    pub total_parameters: usize,
}

impl ModelSummary {
    pub fn from_config(config: &FitConfig) -> Self {
        let peaks = config
            .peaks()
            .iter()
            .enumerate()
            .map(|(index, p)| PeakSummary {
                index,
                kind: p.kind,
                initial_center: p.center,
                initial_height: p.height,
                initial_sigma: p.sigma,
            })
            .collect();

        Self {
            background: config.background().display_name(),
            peaks,
            total_parameters: config.param_count(),
        }
    }

    pub fn format(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Background: {}\n", self.background));
        for p in &self.peaks {
            out.push_str(&format!(
                "Peak p{}_: {:<10} center={:.2} height={:.2} sigma={:.2}\n",
                p.index,
                p.kind.display_name(),
                p.initial_center,
                p.initial_height,
                p.initial_sigma
            ));
        }
        out.push_str(&format!("Free parameters: {}\n", self.total_parameters));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BackgroundSpec, PeakSpec};

    #[test]
    fn summary_counts_parameters() {
        let config = FitConfig::new(
            BackgroundSpec::Linear,
            vec![PeakSpec::new(PeakKind::Voigt, 700.0, 10.0, 8.0)],
        )
        .unwrap();
        let summary = ModelSummary::from_config(&config);
        assert_eq!(summary.total_parameters, 6);
        assert_eq!(summary.peaks.len(), 1);

        let text = summary.format();
        assert!(text.contains("Background: Linear"));
        assert!(text.contains("Voigt"));
        assert!(text.contains("Free parameters: 6"));
    }
}
