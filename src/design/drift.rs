//! Slow-drift regressors.
//!
//! The polynomial basis is built from powers of normalized frame time,
//! `(t / t_max)^k` for `k = 0..=order`. Each power is orthogonalized
//! against the lower ones, and the constant column is moved last:
//!
//! ```text
//! [drift_1, drift_2, ..., drift_order, constant]
//! ```

use serde::{Deserialize, Serialize};

use super::Regressor;

/// A named drift column.
pub(crate) struct DriftColumn {
    pub regressor: Regressor,
    pub name: String,
    pub values: Vec<f64>,
}

/// Drift model appended after the condition regressors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DriftModel {
    /// No drift regressors.
    #[default]
    None,
    /// Orthogonal polynomial basis up to the given order, plus a constant.
    Polynomial {
        /// Highest power of frame time.
        order: usize,
    },
}

impl DriftModel {
    /// Named drift columns sampled at `frame_times`.
    pub(crate) fn columns(&self, frame_times: &[f64]) -> Vec<DriftColumn> {
        match *self {
            DriftModel::None => Vec::new(),
            DriftModel::Polynomial { order } => polynomial_drift(order, frame_times),
        }
    }

    /// Number of columns this model contributes.
    pub fn n_columns(&self) -> usize {
        match *self {
            DriftModel::None => 0,
            DriftModel::Polynomial { order } => order + 1,
        }
    }
}

fn polynomial_drift(order: usize, frame_times: &[f64]) -> Vec<DriftColumn> {
    let t_max = frame_times.iter().copied().fold(0.0_f64, f64::max);
    let scale = if t_max > 0.0 { t_max } else { 1.0 };

    let mut basis: Vec<Vec<f64>> = (0..=order)
        .map(|k| frame_times.iter().map(|&t| (t / scale).powi(k as i32)).collect())
        .collect();
    orthogonalize(&mut basis);

    // Constant (k = 0) goes last.
    let constant = basis.remove(0);
    let mut columns: Vec<DriftColumn> = basis
        .into_iter()
        .enumerate()
        .map(|(i, values)| DriftColumn {
            regressor: Regressor::Drift(i + 1),
            name: format!("drift_{}", i + 1),
            values,
        })
        .collect();
    columns.push(DriftColumn {
        regressor: Regressor::Constant,
        name: "constant".to_string(),
        values: constant,
    });
    columns
}

/// Gram-Schmidt: remove from each column its projection on all earlier ones.
fn orthogonalize(columns: &mut [Vec<f64>]) {
    for i in 1..columns.len() {
        let (done, rest) = columns.split_at_mut(i);
        let current = &mut rest[0];
        for prev in done.iter() {
            let norm2: f64 = prev.iter().map(|v| v * v).sum();
            if norm2 <= f64::EPSILON {
                continue;
            }
            let proj: f64 = prev.iter().zip(current.iter()).map(|(a, b)| a * b).sum::<f64>() / norm2;
            for (c, p) in current.iter_mut().zip(prev) {
                *c -= proj * p;
            }
        }
    }
}
