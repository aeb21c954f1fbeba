//! Autocorrelation of model residuals.
//!
//! The AR(1) noise model needs one lag-1 coefficient per voxel. Residuals of
//! a model with an intercept already have zero mean, so the estimator does
//! not re-center the series.

/// Lag-1 autocorrelation of a residual series, without mean removal.
///
/// # Arguments
///
/// * `residuals` - Residuals in temporal order
///
/// # Returns
///
/// The coefficient, or 0.0 if the series has fewer than 2 elements or
/// zero energy.
///
/// # Formula
///
/// ```text
/// rho = sum(r_t * r_{t-1}) / sum(r_t^2)
/// ```
pub fn residual_ar1(residuals: &[f64]) -> f64 {
    if residuals.len() < 2 {
        return 0.0;
    }

    let energy: f64 = residuals.iter().map(|r| r * r).sum();
    if energy == 0.0 {
        return 0.0;
    }

    let lagged: f64 = residuals.windows(2).map(|w| w[0] * w[1]).sum();
    lagged / energy
}

/// Bin of a coefficient on a grid of `steps` bins per unit, rounding
/// toward zero. Bin `k` stands for the coefficient `k / steps`.
///
/// Voxels sharing a bin share one whitened design, so the number of
/// distinct refits is bounded by `2 * steps + 1`. Non-finite coefficients
/// and a zero step count land in bin 0.
pub fn ar1_bin(rho: f64, steps: usize) -> i64 {
    if !rho.is_finite() {
        return 0;
    }
    (rho * steps as f64).trunc() as i64
}
