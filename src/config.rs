//! Configuration for the analysis pipeline.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{
    AR_STEPS, CONCENTRATIONS, DURATIONS, IMAGES_PER_RUN, MAX_EFFECT, ONSETS, SMOOTH_SIGMA,
    Z_THRESHOLD,
};
use crate::error::{AnalysisError, Result};

/// Configuration options for [`Pipeline`](crate::Pipeline).
///
/// Every switch that controls which stages run lives here and is fixed for
/// the lifetime of a pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Run the external motion-correction and smoothing tools (default: false).
    pub run_preprocessing: bool,

    /// Run the GLM analysis (default: true).
    pub run_analysis: bool,

    /// Hand each design matrix to the visualizer (default: true).
    pub plot_design_matrix: bool,

    /// Hand each contrast overlay to the visualizer (default: true).
    pub plot_contrast: bool,

    /// Write the effect-size map next to the z map (default: false).
    pub write_effect_map: bool,

    /// Write each design matrix as JSON (default: false).
    pub export_design_matrix: bool,

    /// Tests to run, 1-based (default: all five).
    pub tests: Vec<u8>,

    /// Prefix for every output file name (default: none).
    pub label: Option<String>,

    /// Run tests concurrently (default: false).
    pub parallel_tests: bool,

    /// Threads of the dedicated pool used when `parallel_tests` is set
    /// (default: none, the global rayon pool is used).
    pub threads: Option<usize>,

    /// Run length and stimulus timing.
    pub acquisition: Acquisition,

    /// Model-fitting options.
    pub glm: GlmOptions,

    /// Display and counting thresholds.
    pub thresholds: Thresholds,

    /// Sigma of the Gaussian kernel used by the smoothing tool (default: 3.0).
    pub smooth_sigma: f64,
}

/// Run length and stimulus timing shared by all tests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Acquisition {
    /// Frames per run (default: 232).
    pub images_per_run: usize,
    /// Odor onsets within a run, in frames (default: [73, 93]).
    pub onsets: Vec<f64>,
    /// Odor durations, in frames (default: [11, 11]).
    pub durations: Vec<f64>,
    /// Concentrations of the graded runs (default: [1e-6, 1e-4, 1e-3, 1e-2]).
    pub amplitudes: Vec<f64>,
}

/// Noise model used by the voxel-wise fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NoiseModel {
    /// Ordinary least squares, white noise.
    Ols,
    /// First-order autoregressive noise, prewhitened refit.
    #[default]
    Ar1,
}

/// Options for design construction and model fitting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GlmOptions {
    /// Noise model (default: AR(1)).
    pub noise_model: NoiseModel,
    /// AR(1) bins per unit of autocorrelation (default: 100).
    pub ar_steps: usize,
    /// FIR delays in frames, one regressor per delay and condition (default: [0]).
    pub fir_delays: Vec<usize>,
    /// Polynomial drift order for tests that model drift (default: 2).
    pub drift_order: usize,
}

/// Thresholds used for overlays and summary counts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Thresholds {
    /// Z-score significance threshold (default: 3.74).
    pub z_threshold: f64,
    /// Effect cap above which overlays are not drawn (default: 100).
    pub max_effect: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            run_preprocessing: false,
            run_analysis: true,
            plot_design_matrix: true,
            plot_contrast: true,
            write_effect_map: false,
            export_design_matrix: false,
            tests: vec![1, 2, 3, 4, 5],
            label: None,
            parallel_tests: false,
            threads: None,
            acquisition: Acquisition::default(),
            glm: GlmOptions::default(),
            thresholds: Thresholds::default(),
            smooth_sigma: SMOOTH_SIGMA,
        }
    }
}

impl Default for Acquisition {
    fn default() -> Self {
        Self {
            images_per_run: IMAGES_PER_RUN,
            onsets: ONSETS.to_vec(),
            durations: DURATIONS.to_vec(),
            amplitudes: CONCENTRATIONS.to_vec(),
        }
    }
}

impl Default for GlmOptions {
    fn default() -> Self {
        Self {
            noise_model: NoiseModel::Ar1,
            ar_steps: AR_STEPS,
            fir_delays: vec![0],
            drift_order: 2,
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            z_threshold: Z_THRESHOLD,
            max_effect: MAX_EFFECT,
        }
    }
}

impl PipelineConfig {
    /// Configuration for small synthetic runs: figures disabled.
    pub fn quick() -> Self {
        Self {
            plot_design_matrix: false,
            plot_contrast: false,
            ..Self::default()
        }
    }

    /// Load a configuration from a TOML file. Missing keys keep their defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| AnalysisError::io(path, e))?;
        Self::from_toml_str(&text)
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| AnalysisError::config(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<()> {
        if let Some(bad) = self.tests.iter().find(|&&t| !(1..=5).contains(&t)) {
            return Err(AnalysisError::config(format!(
                "test index {bad} outside 1..5"
            )));
        }
        let acq = &self.acquisition;
        if acq.images_per_run == 0 {
            return Err(AnalysisError::config("images_per_run must be positive"));
        }
        if acq.onsets.len() != 2 || acq.durations.len() != 2 {
            return Err(AnalysisError::config(
                "exactly two odor onsets and two durations are required",
            ));
        }
        if acq.amplitudes.iter().any(|a| !a.is_finite() || *a < 0.0) {
            return Err(AnalysisError::config("amplitudes must be finite and non-negative"));
        }
        if self.glm.ar_steps == 0 {
            return Err(AnalysisError::config("ar_steps must be positive"));
        }
        if self.glm.fir_delays.is_empty() {
            return Err(AnalysisError::config("at least one FIR delay is required"));
        }
        if !(self.thresholds.z_threshold > 0.0) {
            return Err(AnalysisError::config("z_threshold must be positive"));
        }
        Ok(())
    }

    /// Output-file prefix, including the trailing underscore when a label is set.
    pub fn file_prefix(&self) -> String {
        match &self.label {
            Some(label) if !label.is_empty() => format!("{label}_"),
            _ => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_protocol() {
        let config = PipelineConfig::default();
        assert_eq!(config.acquisition.images_per_run, 232);
        assert_eq!(config.acquisition.onsets, vec![73.0, 93.0]);
        assert_eq!(config.glm.noise_model, NoiseModel::Ar1);
        assert_eq!(config.tests, vec![1, 2, 3, 4, 5]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = PipelineConfig::from_toml_str(
            r#"
            tests = [1, 5]
            label = "bee1"

            [glm]
            noise_model = "ols"

            [thresholds]
            z_threshold = 2.5
            "#,
        )
        .unwrap();

        assert_eq!(config.tests, vec![1, 5]);
        assert_eq!(config.file_prefix(), "bee1_");
        assert_eq!(config.glm.noise_model, NoiseModel::Ols);
        assert_eq!(config.glm.ar_steps, 100);
        assert!((config.thresholds.z_threshold - 2.5).abs() < 1e-12);
        assert!((config.thresholds.max_effect - 100.0).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_bad_test_index() {
        let err = PipelineConfig::from_toml_str("tests = [0, 6]").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
    }

    #[test]
    fn test_acquisition_holds_timing_only() {
        let text = toml::to_string(&Acquisition::default()).unwrap();
        assert!(text.contains("images_per_run = 232"));
        assert!(!text.contains("xdim"));
        assert!(!text.contains("ydim"));
    }

    #[test]
    fn test_empty_label_has_no_prefix() {
        let config = PipelineConfig {
            label: Some(String::new()),
            ..PipelineConfig::default()
        };
        assert_eq!(config.file_prefix(), "");
    }
}
