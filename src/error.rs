//! Error types for the analysis pipeline.
//!
//! Every failure belongs to one of four kinds (see [`ErrorKind`]). Errors
//! raised inside a test's pipeline are wrapped in a [`StageError`] that
//! records which test and which stage failed, so the caller can log the
//! failure and move on to the next test.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias for fallible analysis operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Broad classification of an [`AnalysisError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Invalid test index, contrast length, or paradigm timing.
    Configuration,
    /// No voxel survived masking.
    EmptyMask,
    /// Singular design or non-finite estimates.
    Fit,
    /// Unreadable input or unwritable output.
    Io,
}

/// Errors raised by the analysis stages.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Invalid parameters or inconsistent inputs.
    #[error("configuration error: {reason}")]
    Configuration {
        /// What was wrong
        reason: String,
    },

    /// The mask selected zero voxels.
    #[error("mask selected no voxels out of {total_voxels}")]
    EmptyMask {
        /// Number of voxels inspected by the mask
        total_voxels: usize,
    },

    /// The design matrix does not have full column rank.
    #[error("design matrix is rank deficient: rank {rank} < {columns} columns")]
    RankDeficient {
        /// Numerical rank of the design
        rank: usize,
        /// Number of design columns
        columns: usize,
    },

    /// Fitting produced unusable estimates.
    #[error("GLM fit failed: {reason}")]
    Fit {
        /// Description of the numerical failure
        reason: String,
    },

    /// Filesystem failure.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File or directory involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The NIfTI reader or writer rejected a volume.
    #[error("volume error on {}: {source}", path.display())]
    Volume {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: nifti::NiftiError,
    },

    /// A figure could not be encoded or saved.
    #[error("figure error on {}: {source}", path.display())]
    Figure {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: image::ImageError,
    },

    /// An external preprocessing tool exited unsuccessfully.
    #[error("external tool `{program}` failed: {reason}")]
    ExternalTool {
        /// Program that was invoked
        program: String,
        /// Exit status or spawn failure
        reason: String,
    },
}

impl AnalysisError {
    /// Build a configuration error from anything printable.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Build a fit error from anything printable.
    pub fn fit(reason: impl Into<String>) -> Self {
        Self::Fit {
            reason: reason.into(),
        }
    }

    /// Wrap an I/O error with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The kind this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::EmptyMask { .. } => ErrorKind::EmptyMask,
            Self::RankDeficient { .. } | Self::Fit { .. } => ErrorKind::Fit,
            Self::Io { .. }
            | Self::Volume { .. }
            | Self::Figure { .. }
            | Self::ExternalTool { .. } => ErrorKind::Io,
        }
    }
}

/// Stages of a single test's pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Running the external motion-correction and smoothing tools.
    Preprocess,
    /// Generating the test's events.
    BuildParadigm,
    /// Convolving events and appending drift terms.
    BuildDesignMatrix,
    /// Reading the preprocessed volume.
    LoadVolume,
    /// Selecting voxels with positive summed intensity.
    ComputeMask,
    /// Converting voxel series to percent signal change.
    ScaleData,
    /// Fitting the voxel-wise model.
    FitGlm,
    /// Computing effect, variance, and z maps.
    ComputeContrast,
    /// Writing maps and handing figures to the visualizer.
    Export,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Preprocess => "preprocess",
            Stage::BuildParadigm => "build-paradigm",
            Stage::BuildDesignMatrix => "build-design-matrix",
            Stage::LoadVolume => "load-volume",
            Stage::ComputeMask => "compute-mask",
            Stage::ScaleData => "scale-data",
            Stage::FitGlm => "fit-glm",
            Stage::ComputeContrast => "compute-contrast",
            Stage::Export => "export",
        };
        f.write_str(name)
    }
}

/// A failure of one test's pipeline, tagged with where it happened.
#[derive(Error, Debug)]
#[error("test {test} failed during {stage}: {source}")]
pub struct StageError {
    /// Test index (1-based)
    pub test: u8,
    /// Stage that failed
    pub stage: Stage,
    /// Underlying error
    #[source]
    pub source: AnalysisError,
}

impl StageError {
    /// Kind of the underlying error.
    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }

    /// Whether this failure is the documented empty-mask skip.
    pub fn is_empty_mask(&self) -> bool {
        self.kind() == ErrorKind::EmptyMask
    }
}

/// Attach test and stage context to a fallible stage result.
pub(crate) trait StageContext<T> {
    fn at_stage(self, test: u8, stage: Stage) -> std::result::Result<T, StageError>;
}

impl<T> StageContext<T> for Result<T> {
    fn at_stage(self, test: u8, stage: Stage) -> std::result::Result<T, StageError> {
        self.map_err(|source| StageError {
            test,
            stage,
            source,
        })
    }
}
