//! Type aliases and common types.

use nalgebra::{DMatrix, DVector};
use ndarray::{Array3, Array4};

/// Voxel-by-time data matrix: one row per frame, one column per voxel.
pub type TimeSeriesMatrix = DMatrix<f64>;

/// Parameter estimates: one row per regressor, one column per voxel.
pub type BetaMatrix = DMatrix<f64>;

/// A single regressor-length vector (contrast weights, one voxel's betas).
pub type RegressorVector = DVector<f64>;

/// A 3D map in voxel geometry (X × Y × Z).
pub type Map3 = Array3<f64>;

/// A 4D volume in voxel geometry (X × Y × Z × T).
pub type Volume4 = Array4<f64>;

/// Spatial shape of a volume (X, Y, Z).
pub type Shape3 = (usize, usize, usize);
