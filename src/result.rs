//! Per-test and per-run report types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::NoiseModel;
use crate::error::{ErrorKind, Stage, StageError};

/// How a test's pipeline ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Outcome {
    /// Every stage ran and the z map was written.
    Completed,
    /// The mask selected no voxel; later stages were skipped.
    SkippedEmptyMask,
    /// A stage failed with a configuration, fit, or I/O error.
    Failed,
}

/// Complete report for one test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestReport {
    /// Test index (1-based).
    pub test: u8,

    /// What the test compares.
    pub description: String,

    /// How the pipeline ended.
    pub outcome: Outcome,

    /// Model and contrast summary (present when the fit completed).
    pub summary: Option<ContrastSummary>,

    /// Failure details (present unless completed).
    pub failure: Option<FailureInfo>,

    /// Files written for this test.
    pub outputs: Vec<PathBuf>,

    /// Timing and model metadata.
    pub metadata: Metadata,
}

/// Summary statistics of a computed contrast.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContrastSummary {
    /// Frames in the design (T).
    pub n_frames: usize,

    /// Design columns (R).
    pub n_regressors: usize,

    /// Voxels selected by the mask.
    pub masked_voxels: usize,

    /// Voxels in the volume.
    pub total_voxels: usize,

    /// Residual degrees of freedom.
    pub dof: usize,

    /// Number of distinct AR(1) bins used in the refit.
    pub n_ar1_bins: usize,

    /// Voxel-weighted mean of the AR(1) coefficients.
    pub mean_ar1: f64,

    /// Largest z-score.
    pub max_z: f64,

    /// Smallest z-score.
    pub min_z: f64,

    /// Largest effect.
    pub max_effect: f64,

    /// Threshold used for the voxel counts.
    pub z_threshold: f64,

    /// Voxels with z above the threshold.
    pub voxels_above_threshold: usize,

    /// Voxels with z below minus the threshold.
    pub voxels_below_threshold: usize,

    /// Masked voxels with zero contrast variance.
    pub degenerate_voxels: usize,

    /// Whether an overlay figure was requested.
    pub overlay_drawn: bool,
}

/// Where and why a test stopped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailureInfo {
    /// Stage that failed.
    pub stage: Stage,
    /// Error classification.
    pub kind: ErrorKind,
    /// Rendered error message.
    pub message: String,
}

impl From<&StageError> for FailureInfo {
    fn from(err: &StageError) -> Self {
        Self {
            stage: err.stage,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Metadata for debugging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    /// Noise model used for the fit.
    pub noise_model: NoiseModel,

    /// Wall-clock time for the test, in seconds.
    pub runtime_secs: f64,
}

/// Reports for every test of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Output label, if any.
    pub label: Option<String>,

    /// One report per requested test, in test order.
    pub tests: Vec<TestReport>,

    /// Wall-clock time for the whole run, in seconds.
    pub runtime_secs: f64,
}

impl RunReport {
    /// Reports of tests that completed.
    pub fn completed(&self) -> impl Iterator<Item = &TestReport> {
        self.tests.iter().filter(|t| t.outcome == Outcome::Completed)
    }

    /// Reports of tests that failed (empty-mask skips excluded).
    pub fn failed(&self) -> impl Iterator<Item = &TestReport> {
        self.tests.iter().filter(|t| t.outcome == Outcome::Failed)
    }

    /// Whether no test failed. Empty-mask skips do not count as failures.
    pub fn all_succeeded(&self) -> bool {
        self.failed().next().is_none()
    }

    /// Report for a given test.
    pub fn test(&self, id: u8) -> Option<&TestReport> {
        self.tests.iter().find(|t| t.test == id)
    }
}
