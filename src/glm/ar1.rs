//! AR(1) prewhitening and the grouped refit.
//!
//! After an OLS pass, each voxel's lag-1 residual autocorrelation is
//! quantized toward zero. Voxels that share a quantized coefficient are
//! refit together against one whitened design, which bounds the number of
//! factorizations regardless of how many voxels there are.

use std::collections::BTreeMap;

use nalgebra::DMatrix;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::ols::OlsSolver;
use crate::error::Result;
use crate::statistics::{ar1_bin, residual_ar1};
use crate::types::TimeSeriesMatrix;

/// Apply the AR(1) filter to every column of `m`.
///
/// The first row is kept; row `t > 0` becomes `m[t] - rho * m[t - 1]`.
pub fn whiten(m: &DMatrix<f64>, rho: f64) -> DMatrix<f64> {
    let mut out = m.clone();
    if rho == 0.0 {
        return out;
    }
    for t in (1..m.nrows()).rev() {
        for c in 0..m.ncols() {
            out[(t, c)] = m[(t, c)] - rho * m[(t - 1, c)];
        }
    }
    out
}

/// Voxels sharing one quantized coefficient.
#[derive(Debug, Clone)]
pub(crate) struct Ar1Bin {
    pub rho: f64,
    pub voxels: Vec<usize>,
}

/// Group voxels by the quantized AR(1) coefficient of their residuals.
///
/// Bins are ordered by coefficient; voxels inside a bin keep column order.
pub(crate) fn bin_voxels(residuals: &TimeSeriesMatrix, steps: usize) -> Vec<Ar1Bin> {
    // Storage is column-major: each chunk is one voxel's residual series.
    let columns = residuals.as_slice();
    let n_frames = residuals.nrows().max(1);
    let estimate = |series: &[f64]| ar1_bin(residual_ar1(series), steps);

    #[cfg(feature = "parallel")]
    let voxel_bins: Vec<i64> = columns.par_chunks(n_frames).map(estimate).collect();

    #[cfg(not(feature = "parallel"))]
    let voxel_bins: Vec<i64> = columns.chunks(n_frames).map(estimate).collect();

    let mut bins: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (v, bin) in voxel_bins.into_iter().enumerate() {
        bins.entry(bin).or_default().push(v);
    }
    bins.into_iter()
        .map(|(bin, voxels)| Ar1Bin {
            rho: bin as f64 / steps as f64,
            voxels,
        })
        .collect()
}

/// Refit result of one bin.
#[derive(Debug, Clone)]
pub(crate) struct BinFit {
    pub rho: f64,
    pub voxels: Vec<usize>,
    /// R × n betas for the bin's voxels
    pub betas: DMatrix<f64>,
    pub dispersion: Vec<f64>,
    /// `(XwᵀXw)⁻¹` of the bin's whitened design
    pub normalized_cov: DMatrix<f64>,
}

/// Whiten design and data per bin and refit.
///
/// # Errors
///
/// Propagates rank and degrees-of-freedom errors of a whitened design.
pub(crate) fn refit_bins(
    design: &DMatrix<f64>,
    y: &TimeSeriesMatrix,
    bins: Vec<Ar1Bin>,
) -> Result<Vec<BinFit>> {
    let fit_bin = |bin: Ar1Bin| -> Result<BinFit> {
        let xw = whiten(design, bin.rho);
        let solver = OlsSolver::new(&xw)?;
        let yw = whiten(&y.select_columns(bin.voxels.iter()), bin.rho);
        let est = solver.fit(&yw);
        Ok(BinFit {
            rho: bin.rho,
            voxels: bin.voxels,
            betas: est.betas,
            dispersion: est.dispersion,
            normalized_cov: solver.normalized_cov().clone(),
        })
    };

    #[cfg(feature = "parallel")]
    let fits: Vec<Result<BinFit>> = bins.into_par_iter().map(fit_bin).collect();

    #[cfg(not(feature = "parallel"))]
    let fits: Vec<Result<BinFit>> = bins.into_iter().map(fit_bin).collect();

    fits.into_iter().collect()
}
