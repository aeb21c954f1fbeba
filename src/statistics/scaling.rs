//! Percent-signal-change scaling of voxel time series.

use crate::constants::MEAN_EPSILON;
use crate::error::{AnalysisError, Result};
use crate::types::{Map3, TimeSeriesMatrix};
use crate::volume::Mask;

/// Scaled voxel series and the mean image used as a display background.
#[derive(Debug, Clone)]
pub struct ScaledData {
    /// T × V matrix in percent signal change
    pub data: TimeSeriesMatrix,
    /// Temporal mean per voxel, in volume geometry (zero outside the mask)
    pub mean_image: Map3,
    /// Voxels whose mean was too close to zero to divide by; demeaned only
    pub near_zero_means: usize,
}

/// Express each column of `data` in percent signal change.
///
/// For every voxel, `y' = 100 * (y / mean(y) - 1)`. Voxels whose mean is
/// within `MEAN_EPSILON` of zero are only demeaned.
///
/// # Arguments
///
/// * `data` - T × V matrix of masked voxel series, column order of `mask`
/// * `mask` - Mask that produced `data`
///
/// # Errors
///
/// Returns [`AnalysisError::EmptyMask`] when the mask selected no voxel, and
/// a configuration error when `data` does not have one column per voxel.
pub fn scale_to_percent_signal(data: &TimeSeriesMatrix, mask: &Mask) -> Result<ScaledData> {
    if mask.is_empty() || data.ncols() == 0 {
        return Err(AnalysisError::EmptyMask {
            total_voxels: mask.total_voxels(),
        });
    }
    if data.ncols() != mask.count() {
        return Err(AnalysisError::config(format!(
            "{} voxel series for a mask of {} voxels",
            data.ncols(),
            mask.count()
        )));
    }
    if data.nrows() == 0 {
        return Err(AnalysisError::config("voxel series have no frames"));
    }

    let mut scaled = data.clone();
    let mut means = Vec::with_capacity(data.ncols());
    let mut near_zero_means = 0;

    for mut column in scaled.column_iter_mut() {
        let mean = column.mean();
        if mean.abs() < MEAN_EPSILON {
            near_zero_means += 1;
            column.add_scalar_mut(-mean);
        } else {
            column.apply(|y| *y = 100.0 * (*y / mean - 1.0));
        }
        means.push(mean);
    }

    if near_zero_means > 0 {
        tracing::debug!(near_zero_means, "voxels with near-zero mean were only demeaned");
    }

    Ok(ScaledData {
        data: scaled,
        mean_image: mask.unmask(&means),
        near_zero_means,
    })
}
