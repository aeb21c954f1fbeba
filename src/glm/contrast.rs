//! Linear contrasts of fitted parameters.
//!
//! For weights `c` and each voxel `v`:
//!
//! ```text
//! effect_v   = c · β_v
//! variance_v = σ²_v · c (XᵀX)⁻¹ cᵀ
//! z_v        = effect_v / sqrt(variance_v)
//! ```
//!
//! where `(XᵀX)⁻¹` is the normalized covariance of the design the voxel was
//! fit with (the whitened design of its AR(1) bin).

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use super::GlmFit;
use crate::design::DesignMatrix;
use crate::error::{AnalysisError, Result};
use crate::paradigm::ContrastDefinition;
use crate::types::{Map3, RegressorVector};
use crate::volume::Mask;

/// Contrast weights over the design columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contrast {
    weights: Vec<f64>,
}

impl Contrast {
    /// Contrast with explicit weights, one per design column.
    pub fn new(weights: Vec<f64>) -> Self {
        Self { weights }
    }

    /// Resolve a test's contrast definition against a design.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a referenced condition has no column
    /// in the design.
    pub fn from_definition(design: &DesignMatrix, definition: &ContrastDefinition) -> Result<Self> {
        let column = |id: u32| {
            design.condition_column(id).ok_or_else(|| {
                AnalysisError::config(format!("design has no regressor for condition {id}"))
            })
        };

        let mut weights = vec![0.0; design.n_regressors()];
        match *definition {
            ContrastDefinition::Condition(id) => {
                weights[column(id)?] = 1.0;
            }
            ContrastDefinition::Difference(plus, minus) => {
                weights[column(plus)?] = 1.0;
                weights[column(minus)?] = -1.0;
            }
        }
        Ok(Self { weights })
    }

    /// The weights.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Number of weights.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Whether there are no weights.
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    fn vector(&self) -> RegressorVector {
        DVector::from_column_slice(&self.weights)
    }
}

/// Contrast results in volume geometry. Voxels outside the mask are zero.
#[derive(Debug, Clone)]
pub struct ContrastMaps {
    /// `c · β`
    pub effect: Map3,
    /// Variance of the effect estimate
    pub variance: Map3,
    /// Signed z-score
    pub z: Map3,
    /// Masked voxels whose variance was not positive; their z is 0
    pub degenerate_voxels: usize,
    /// z-scores of the masked voxels, in mask order
    masked_z: Vec<f64>,
    /// Effects of the masked voxels, in mask order
    masked_effect: Vec<f64>,
}

impl ContrastMaps {
    /// Largest value of the whole z map, zeros outside the mask included.
    pub fn max_z(&self) -> f64 {
        self.z.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Largest value of the whole effect map, zeros outside the mask included.
    pub fn max_effect(&self) -> f64 {
        self.effect.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Largest z-score among masked voxels.
    pub fn masked_max_z(&self) -> f64 {
        self.masked_z.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Smallest z-score among masked voxels.
    pub fn masked_min_z(&self) -> f64 {
        self.masked_z.iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// Largest effect among masked voxels.
    pub fn masked_max_effect(&self) -> f64 {
        self.masked_effect.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Largest absolute effect.
    pub fn max_abs_effect(&self) -> f64 {
        self.effect.iter().fold(0.0, |m, e| m.max(e.abs()))
    }

    /// Number of voxels with z above `threshold`.
    pub fn count_above(&self, threshold: f64) -> usize {
        self.z.iter().filter(|&&z| z > threshold).count()
    }

    /// Number of voxels with z below `-threshold`.
    pub fn count_below(&self, threshold: f64) -> usize {
        self.z.iter().filter(|&&z| z < -threshold).count()
    }
}

/// Evaluate a contrast on every fitted voxel.
///
/// # Arguments
///
/// * `fit` - Fitted model, one column per masked voxel
/// * `contrast` - Weights, one per design column
/// * `mask` - Mask that defined the voxel columns
///
/// # Errors
///
/// Returns a configuration error if the contrast length differs from the
/// number of regressors or the fit does not match the mask, and a fit error
/// if any effect or variance is non-finite.
pub fn compute_contrast(fit: &GlmFit, contrast: &Contrast, mask: &Mask) -> Result<ContrastMaps> {
    if contrast.len() != fit.n_regressors() {
        return Err(AnalysisError::config(format!(
            "contrast has {} weights for {} design columns",
            contrast.len(),
            fit.n_regressors()
        )));
    }
    if fit.n_voxels() != mask.count() {
        return Err(AnalysisError::config(format!(
            "fit covers {} voxels but the mask selects {}",
            fit.n_voxels(),
            mask.count()
        )));
    }

    let c = contrast.vector();

    // c (XᵀX)⁻¹ cᵀ, once per noise group
    let group_scale: Vec<f64> = fit
        .groups()
        .iter()
        .map(|g| (c.transpose() * &g.normalized_cov * &c)[(0, 0)])
        .collect();

    let n = fit.n_voxels();
    let mut effect = Vec::with_capacity(n);
    let mut variance = Vec::with_capacity(n);
    let mut z = Vec::with_capacity(n);
    let mut degenerate_voxels = 0;

    for v in 0..n {
        let e = fit.betas().column(v).dot(&c);
        let var = fit.dispersion()[v] * group_scale[fit.group_of_voxel()[v]];
        if !e.is_finite() || !var.is_finite() {
            return Err(AnalysisError::fit(format!("non-finite contrast at voxel {v}")));
        }
        let zv = if var > 0.0 {
            e / var.sqrt()
        } else {
            degenerate_voxels += 1;
            0.0
        };
        effect.push(e);
        variance.push(var);
        z.push(zv);
    }

    if degenerate_voxels > 0 {
        tracing::warn!(degenerate_voxels, "voxels with zero contrast variance set to z = 0");
    }

    Ok(ContrastMaps {
        effect: mask.unmask(&effect),
        variance: mask.unmask(&variance),
        z: mask.unmask(&z),
        degenerate_voxels,
        masked_z: z,
        masked_effect: effect,
    })
}
