//! Ordinary least squares via the SVD pseudo-inverse.

use nalgebra::DMatrix;

use crate::error::{AnalysisError, Result};
use crate::types::{BetaMatrix, TimeSeriesMatrix};

/// A design factored for repeated least-squares solves.
#[derive(Debug, Clone)]
pub(crate) struct OlsSolver {
    design: DMatrix<f64>,
    /// R × T pseudo-inverse
    pinv: DMatrix<f64>,
    /// `pinv * pinvᵀ`, equal to `(XᵀX)⁻¹` for a full-rank design
    normalized_cov: DMatrix<f64>,
}

/// Estimates for a block of voxels sharing one design.
#[derive(Debug, Clone)]
pub(crate) struct OlsEstimate {
    /// R × V parameter estimates
    pub betas: BetaMatrix,
    /// T × V residuals
    pub residuals: TimeSeriesMatrix,
    /// Residual sum of squares divided by degrees of freedom, per voxel
    pub dispersion: Vec<f64>,
}

impl OlsSolver {
    /// Factor a T × R design.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::RankDeficient`] when the numerical rank is
    /// below R, and a fit error when there are no residual degrees of
    /// freedom (T ≤ R).
    pub fn new(design: &DMatrix<f64>) -> Result<Self> {
        let (n_frames, n_regressors) = design.shape();
        if n_frames <= n_regressors {
            return Err(AnalysisError::fit(format!(
                "{n_frames} frames leave no residual degrees of freedom for {n_regressors} regressors"
            )));
        }

        let svd = design.clone().svd(true, true);
        let s_max = svd.singular_values.max();
        let tol = s_max * n_frames.max(n_regressors) as f64 * f64::EPSILON;
        let rank = svd.rank(tol);
        if rank < n_regressors {
            return Err(AnalysisError::RankDeficient {
                rank,
                columns: n_regressors,
            });
        }

        let pinv = svd.pseudo_inverse(tol).map_err(AnalysisError::fit)?;
        let normalized_cov = &pinv * pinv.transpose();

        Ok(Self {
            design: design.clone(),
            pinv,
            normalized_cov,
        })
    }

    /// Residual degrees of freedom, T − R.
    pub fn dof(&self) -> usize {
        self.design.nrows() - self.design.ncols()
    }

    pub fn normalized_cov(&self) -> &DMatrix<f64> {
        &self.normalized_cov
    }

    /// Solve for every column of `y` (T × V).
    pub fn fit(&self, y: &TimeSeriesMatrix) -> OlsEstimate {
        let betas = &self.pinv * y;
        let residuals = y - &self.design * &betas;
        let dof = self.dof() as f64;
        let dispersion = residuals
            .column_iter()
            .map(|r| r.norm_squared() / dof)
            .collect();
        OlsEstimate {
            betas,
            residuals,
            dispersion,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_fit_recovers_betas() {
        // y = 2 * x0 + 3 * x1 exactly
        let x = DMatrix::from_fn(10, 2, |t, c| if c == 0 { t as f64 } else { 1.0 });
        let y = DMatrix::from_fn(10, 1, |t, _| 2.0 * t as f64 + 3.0);
        let solver = OlsSolver::new(&x).unwrap();
        let est = solver.fit(&y);
        assert!((est.betas[(0, 0)] - 2.0).abs() < 1e-10);
        assert!((est.betas[(1, 0)] - 3.0).abs() < 1e-10);
        assert!(est.dispersion[0] < 1e-18);
        assert_eq!(solver.dof(), 8);
    }

    #[test]
    fn test_normalized_cov_is_inverse_gram() {
        let x = DMatrix::from_fn(6, 2, |t, c| if c == 0 { t as f64 } else { 1.0 });
        let solver = OlsSolver::new(&x).unwrap();
        let gram = x.transpose() * &x;
        let product = gram * solver.normalized_cov();
        let identity = DMatrix::<f64>::identity(2, 2);
        assert!((product - identity).abs().max() < 1e-10);
    }

    #[test]
    fn test_collinear_columns_rejected() {
        let x = DMatrix::from_fn(8, 2, |t, c| (t as f64) * (c as f64 + 1.0));
        let err = OlsSolver::new(&x).unwrap_err();
        assert!(matches!(err, AnalysisError::RankDeficient { rank: 1, columns: 2 }));
    }

    #[test]
    fn test_too_few_frames_rejected() {
        let x = DMatrix::from_fn(2, 2, |t, c| if t == c { 1.0 } else { 0.0 });
        assert_eq!(
            OlsSolver::new(&x).unwrap_err().kind(),
            crate::error::ErrorKind::Fit
        );
    }
}
