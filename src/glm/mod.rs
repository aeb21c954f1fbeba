//! Voxel-wise general linear model.
//!
//! Every voxel's time series is regressed on the same design matrix. With
//! the AR(1) noise model the fit runs in two passes:
//!
//! 1. OLS on all voxels at once
//! 2. Lag-1 autocorrelation of each voxel's residuals, quantized into bins
//! 3. Per bin: whiten design and data, refit, and estimate the dispersion
//!
//! The contrast stage needs, for each voxel, the betas, the dispersion and
//! the normalized covariance of the design that voxel was fit with. Voxels
//! in the same bin share that covariance; [`GlmFit`] stores it once per bin.

mod ar1;
mod contrast;
mod ols;

pub use ar1::whiten;
pub use contrast::{compute_contrast, Contrast, ContrastMaps};

use nalgebra::DMatrix;

use crate::config::{GlmOptions, NoiseModel};
use crate::design::DesignMatrix;
use crate::error::{AnalysisError, Result};
use crate::types::{BetaMatrix, TimeSeriesMatrix};

use ols::OlsSolver;

/// Noise parameters and design covariance shared by a set of voxels.
#[derive(Debug, Clone)]
pub struct NoiseGroup {
    /// Quantized AR(1) coefficient (0 for the OLS model)
    pub rho: f64,
    /// Number of voxels in this group
    pub n_voxels: usize,
    /// `(XᵀX)⁻¹` of the (whitened) design used for this group
    pub normalized_cov: DMatrix<f64>,
}

/// Per-voxel estimates of a fitted model.
#[derive(Debug, Clone)]
pub struct GlmFit {
    betas: BetaMatrix,
    dispersion: Vec<f64>,
    groups: Vec<NoiseGroup>,
    group_of_voxel: Vec<usize>,
    dof: usize,
}

impl GlmFit {
    /// R × V parameter estimates.
    pub fn betas(&self) -> &BetaMatrix {
        &self.betas
    }

    /// Residual variance σ² per voxel.
    pub fn dispersion(&self) -> &[f64] {
        &self.dispersion
    }

    /// Noise groups, ordered by coefficient.
    pub fn groups(&self) -> &[NoiseGroup] {
        &self.groups
    }

    /// Group index of each voxel.
    pub fn group_of_voxel(&self) -> &[usize] {
        &self.group_of_voxel
    }

    /// AR(1) coefficient used for voxel `v`.
    pub fn ar1(&self, v: usize) -> f64 {
        self.groups[self.group_of_voxel[v]].rho
    }

    /// Residual degrees of freedom.
    pub fn dof(&self) -> usize {
        self.dof
    }

    /// Number of fitted voxels.
    pub fn n_voxels(&self) -> usize {
        self.betas.ncols()
    }

    /// Number of regressors.
    pub fn n_regressors(&self) -> usize {
        self.betas.nrows()
    }
}

/// A design prepared for fitting.
#[derive(Debug, Clone)]
pub struct GeneralLinearModel {
    design: DMatrix<f64>,
    solver: OlsSolver,
    options: GlmOptions,
}

impl GeneralLinearModel {
    /// Prepare the model.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::RankDeficient`] if the design does not have
    /// full column rank, and a fit error if it has at least as many columns
    /// as rows.
    pub fn new(design: &DesignMatrix, options: GlmOptions) -> Result<Self> {
        let solver = OlsSolver::new(design.matrix())?;
        Ok(Self {
            design: design.matrix().clone(),
            solver,
            options,
        })
    }

    /// Fit every column of `y` (T × V).
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `y` has the wrong number of frames,
    /// and a fit error if any estimate is non-finite.
    pub fn fit(&self, y: &TimeSeriesMatrix) -> Result<GlmFit> {
        if y.nrows() != self.design.nrows() {
            return Err(AnalysisError::config(format!(
                "{} frames of data for a {}-frame design",
                y.nrows(),
                self.design.nrows()
            )));
        }

        // Step 1: OLS on all voxels
        let ols = self.solver.fit(y);

        let fit = match self.options.noise_model {
            NoiseModel::Ols => GlmFit {
                betas: ols.betas,
                dispersion: ols.dispersion,
                groups: vec![NoiseGroup {
                    rho: 0.0,
                    n_voxels: y.ncols(),
                    normalized_cov: self.solver.normalized_cov().clone(),
                }],
                group_of_voxel: vec![0; y.ncols()],
                dof: self.solver.dof(),
            },
            NoiseModel::Ar1 => {
                // Step 2: bin voxels by residual autocorrelation
                let bins = ar1::bin_voxels(&ols.residuals, self.options.ar_steps);
                tracing::debug!(n_bins = bins.len(), "AR(1) bins");

                // Step 3: whitened refit per bin
                let fits = ar1::refit_bins(&self.design, y, bins)?;
                self.assemble(fits, y.ncols())
            }
        };

        if fit.betas.iter().any(|b| !b.is_finite())
            || fit.dispersion.iter().any(|d| !d.is_finite())
        {
            return Err(AnalysisError::fit("non-finite parameter estimates"));
        }
        Ok(fit)
    }

    fn assemble(&self, fits: Vec<ar1::BinFit>, n_voxels: usize) -> GlmFit {
        let n_regressors = self.design.ncols();
        let mut betas = BetaMatrix::zeros(n_regressors, n_voxels);
        let mut dispersion = vec![0.0; n_voxels];
        let mut group_of_voxel = vec![0; n_voxels];
        let mut groups = Vec::with_capacity(fits.len());

        for (g, fit) in fits.into_iter().enumerate() {
            for (j, &v) in fit.voxels.iter().enumerate() {
                betas.set_column(v, &fit.betas.column(j));
                dispersion[v] = fit.dispersion[j];
                group_of_voxel[v] = g;
            }
            groups.push(NoiseGroup {
                rho: fit.rho,
                n_voxels: fit.voxels.len(),
                normalized_cov: fit.normalized_cov,
            });
        }

        GlmFit {
            betas,
            dispersion,
            groups,
            group_of_voxel,
            dof: self.solver.dof(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::{DesignMatrixBuilder, Regressor};
    use crate::paradigm::{Event, Paradigm};
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn design() -> DesignMatrix {
        let paradigm = Paradigm::new(
            vec![Event {
                condition: 0,
                onset: 10.0,
                duration: 10.0,
                amplitude: 1.0,
            }],
            60,
        )
        .unwrap();
        let box_car = DesignMatrixBuilder::new().build(&paradigm).unwrap();
        let m = box_car.matrix().clone().insert_column(1, 1.0);
        DesignMatrix::from_parts(
            m,
            vec!["odor".into(), "constant".into()],
            vec![Regressor::Condition { id: 0, delay: 0 }, Regressor::Constant],
        )
        .unwrap()
    }

    fn data(design: &DesignMatrix, betas: &[f64], noise_sd: f64, seed: u64) -> TimeSeriesMatrix {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let normal = Normal::new(0.0, noise_sd).unwrap();
        let x = design.matrix();
        DMatrix::from_fn(x.nrows(), betas.len(), |t, v| {
            betas[v] * x[(t, 0)] + normal.sample(&mut rng)
        })
    }

    #[test]
    fn test_ols_recovers_amplitude() {
        let design = design();
        let options = GlmOptions {
            noise_model: NoiseModel::Ols,
            ..GlmOptions::default()
        };
        let model = GeneralLinearModel::new(&design, options).unwrap();
        let y = data(&design, &[5.0, 0.0], 0.1, 1);
        let fit = model.fit(&y).unwrap();
        assert!((fit.betas()[(0, 0)] - 5.0).abs() < 0.2);
        assert!(fit.betas()[(0, 1)].abs() < 0.2);
        assert_eq!(fit.groups().len(), 1);
        assert_eq!(fit.dof(), 58);
        assert!((fit.dispersion()[0] - 0.01).abs() < 0.01);
    }

    #[test]
    fn test_ar1_assigns_every_voxel() {
        let design = design();
        let model = GeneralLinearModel::new(&design, GlmOptions::default()).unwrap();
        let y = data(&design, &[3.0, -2.0, 0.0, 1.0], 0.5, 7);
        let fit = model.fit(&y).unwrap();
        assert_eq!(fit.n_voxels(), 4);
        assert_eq!(fit.n_regressors(), 2);
        let total: usize = fit.groups().iter().map(|g| g.n_voxels).sum();
        assert_eq!(total, 4);
        for v in 0..4 {
            assert!(fit.ar1(v).abs() < 1.0);
        }
        assert!((fit.betas()[(0, 0)] - 3.0).abs() < 0.6);
        assert!((fit.betas()[(0, 1)] + 2.0).abs() < 0.6);
    }

    #[test]
    fn test_frame_mismatch_is_configuration_error() {
        let design = design();
        let model = GeneralLinearModel::new(&design, GlmOptions::default()).unwrap();
        let y = DMatrix::<f64>::zeros(59, 2);
        assert_eq!(
            model.fit(&y).unwrap_err().kind(),
            crate::error::ErrorKind::Configuration
        );
    }

    #[test]
    fn test_non_finite_data_is_fit_error() {
        let design = design();
        let model = GeneralLinearModel::new(&design, GlmOptions::default()).unwrap();
        let mut y = DMatrix::<f64>::zeros(60, 1);
        y[(3, 0)] = f64::NAN;
        assert_eq!(
            model.fit(&y).unwrap_err().kind(),
            crate::error::ErrorKind::Fit
        );
    }

    #[test]
    fn test_rank_deficient_design_rejected() {
        let m = DMatrix::from_element(20, 2, 1.0);
        let design = DesignMatrix::from_parts(
            m,
            vec!["a".into(), "b".into()],
            vec![Regressor::Constant, Regressor::Constant],
        )
        .unwrap();
        let err = GeneralLinearModel::new(&design, GlmOptions::default()).unwrap_err();
        assert!(matches!(err, AnalysisError::RankDeficient { .. }));
    }
}
