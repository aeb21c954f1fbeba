//! Statistical building blocks shared by the model stages.
//!
//! - Residual autocorrelation and its quantization for the AR(1) model
//! - Percent-signal-change scaling of voxel series

mod autocorrelation;
mod scaling;

pub use autocorrelation::{ar1_bin, residual_ar1};
pub use scaling::{scale_to_percent_signal, ScaledData};
