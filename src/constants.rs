//! Acquisition and model constants shared by every test.
//!
//! These values describe the calcium-imaging protocol: run length,
//! stimulus timing within a run, and the odor concentrations presented in
//! the graded-concentration runs.

/// Number of frames acquired per run.
pub const IMAGES_PER_RUN: usize = 232;

/// Odor onsets within a run, in frames.
pub const ONSETS: [f64; 2] = [73.0, 93.0];

/// Odor presentation durations, in frames.
pub const DURATIONS: [f64; 2] = [11.0, 11.0];

/// Odor concentrations of the graded runs, weakest first.
pub const CONCENTRATIONS: [f64; 4] = [0.000_001, 0.0001, 0.001, 0.01];

/// Sigma of the Gaussian smoothing kernel handed to the smoothing tool.
pub const SMOOTH_SIGMA: f64 = 3.0;

/// Z-score threshold used for overlays and voxel counts.
pub const Z_THRESHOLD: f64 = 3.74;

/// Largest effect size still drawn as an overlay.
pub const MAX_EFFECT: f64 = 100.0;

/// Number of AR(1) bins per unit of autocorrelation.
pub const AR_STEPS: usize = 100;

/// Means smaller than this are treated as zero when scaling.
pub const MEAN_EPSILON: f64 = 1e-8;

/// Extension of every volume written by the pipeline.
pub const VOLUME_EXT: &str = ".nii.gz";
