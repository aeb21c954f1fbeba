//! # calcium-glm
//!
//! Voxel-wise general linear model analysis of calcium-imaging volumes.
//!
//! For each of five stimulation tests this crate builds an event paradigm,
//! turns it into an FIR design matrix (with polynomial drift for the
//! long-timescale tests), scales the masked volume to percent signal change,
//! fits an AR(1)-prewhitened GLM per voxel, and evaluates a test-specific
//! contrast, producing:
//! - A z-statistic map per test (`{label}zmap_test{n}.nii.gz`)
//! - Optional effect-size maps and design-matrix exports
//! - Design-matrix and contrast-overlay figures
//! - A per-test run report (terminal or JSON)
//!
//! A test whose mask selects no voxel is reported as skipped and produces
//! no z map. Every other failure is reported with the stage it occurred in.
//!
//! ## Quick Start
//!
//! ```ignore
//! use calcium_glm::{Pipeline, PipelineConfig};
//!
//! let report = Pipeline::new(PipelineConfig::default())
//!     .label("bee3")
//!     .tests(vec![1, 5])
//!     .run_all("data/bee3".as_ref(), "results/bee3".as_ref())?;
//!
//! for test in report.completed() {
//!     println!("test {}: max z {:.2}", test.test, test.summary.as_ref().map_or(0.0, |s| s.max_z));
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
mod config;
mod error;
mod pipeline;
mod result;
pub mod constants;
pub mod types;

// Functional modules
pub mod cli;
pub mod design;
pub mod glm;
pub mod helpers;
pub mod output;
pub mod paradigm;
pub mod preprocess;
pub mod statistics;
pub mod thread_pool;
pub mod volume;

// Re-exports for public API
pub use config::{Acquisition, GlmOptions, NoiseModel, PipelineConfig, Thresholds};
pub use design::{DesignMatrix, DesignMatrixBuilder, DriftModel, FirBasis, Regressor};
pub use error::{AnalysisError, ErrorKind, Result, Stage, StageError};
pub use glm::{compute_contrast, Contrast, ContrastMaps, GeneralLinearModel, GlmFit};
pub use paradigm::{ContrastDefinition, Event, Paradigm, TestCatalog, TestDefinition};
pub use pipeline::{Pipeline, TestAnalysis, TestArtifacts, TestPaths};
pub use result::{ContrastSummary, FailureInfo, Metadata, Outcome, RunReport, TestReport};
pub use volume::Mask;

use std::path::Path;

/// Convenience function: run the five standard tests with default settings.
///
/// # Arguments
///
/// * `input_dir` - Directory holding `{label}_smooth_test{n}.nii.gz`
/// * `output_dir` - Directory receiving z maps and figures
/// * `label` - Optional file-name prefix
///
/// # Returns
///
/// A `RunReport` with one entry per test. Per-test failures are recorded in
/// the report rather than returned.
///
/// # Errors
///
/// Returns an error only if the run cannot start (e.g. the output directory
/// cannot be created).
pub fn analyze_directory(input_dir: &Path, output_dir: &Path, label: Option<&str>) -> Result<RunReport> {
    let mut pipeline = Pipeline::new(PipelineConfig::default());
    if let Some(label) = label {
        pipeline = pipeline.label(label);
    }
    pipeline.run_all(input_dir, output_dir)
}
