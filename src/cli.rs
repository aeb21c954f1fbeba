//! CLI argument parsing for calcium-glm

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::{NoiseModel, PipelineConfig};
use crate::error::Result;

/// Report format printed to stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary (default)
    Text,
    /// JSON run report
    Json,
}

/// Noise model selectable on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NoiseArg {
    /// Ordinary least squares
    Ols,
    /// AR(1) prewhitened refit
    Ar1,
}

impl From<NoiseArg> for NoiseModel {
    fn from(arg: NoiseArg) -> Self {
        match arg {
            NoiseArg::Ols => NoiseModel::Ols,
            NoiseArg::Ar1 => NoiseModel::Ar1,
        }
    }
}

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "calcium-glm")]
#[command(version)]
#[command(about = "Voxel-wise AR(1) GLM analysis of calcium-imaging volumes", long_about = None)]
pub struct Cli {
    /// Directory holding the preprocessed `{label}smooth_test{n}.nii.gz` volumes
    #[arg(value_name = "INPUT_DIR")]
    pub input_dir: PathBuf,

    /// Directory for z maps, figures, and reports
    #[arg(value_name = "OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// Prefix for every file name (`{label}_...`)
    #[arg(value_name = "LABEL")]
    pub label: Option<String>,

    /// TOML configuration file; command-line flags override it
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Tests to run (e.g., --tests 1,2,5)
    #[arg(short, long, value_delimiter = ',', value_name = "N")]
    pub tests: Option<Vec<u8>>,

    /// Run motion correction and smoothing (FSL) before the analysis
    #[arg(long)]
    pub preprocess: bool,

    /// Skip the analysis (preprocess only)
    #[arg(long)]
    pub no_analysis: bool,

    /// Do not render design-matrix and contrast figures
    #[arg(long)]
    pub no_figures: bool,

    /// Also write effect maps
    #[arg(long)]
    pub effect_maps: bool,

    /// Also write each design matrix as JSON
    #[arg(long)]
    pub export_design: bool,

    /// Noise model for the voxel fit
    #[arg(long, value_enum, value_name = "MODEL")]
    pub noise_model: Option<NoiseArg>,

    /// Run tests concurrently
    #[arg(short, long)]
    pub parallel: bool,

    /// Worker threads for concurrent tests
    #[arg(long, value_name = "N")]
    pub threads: Option<usize>,

    /// Report format
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Also write the JSON run report to this file
    #[arg(long, value_name = "FILE")]
    pub json: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Load the configuration file (if any) and apply command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns an I/O error for an unreadable configuration file and a
    /// configuration error for invalid settings.
    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_toml_file(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(label) = &self.label {
            config.label = Some(label.clone());
        }
        if let Some(tests) = &self.tests {
            config.tests = tests.clone();
        }
        if self.preprocess {
            config.run_preprocessing = true;
        }
        if self.no_analysis {
            config.run_analysis = false;
        }
        if self.no_figures {
            config.plot_design_matrix = false;
            config.plot_contrast = false;
        }
        if self.effect_maps {
            config.write_effect_map = true;
        }
        if self.export_design {
            config.export_design_matrix = true;
        }
        if let Some(model) = self.noise_model {
            config.glm.noise_model = model.into();
        }
        if self.parallel {
            config.parallel_tests = true;
        }
        if self.threads.is_some() {
            config.threads = self.threads;
        }

        config.validate()?;
        Ok(config)
    }
}
