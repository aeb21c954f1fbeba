//! Voxel inclusion mask.
//!
//! A voxel is included when its intensity summed over all frames is
//! strictly positive. The mask fixes the voxel order used by every later
//! stage: included voxels are enumerated in the volume's logical
//! (x-major, then y, then z) order, and column `j` of the extracted
//! time-series matrix is the `j`-th included voxel.

use nalgebra::DMatrix;
use ndarray::{Array3, Axis};

use crate::types::{Map3, Shape3, TimeSeriesMatrix, Volume4};

/// Boolean inclusion volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    include: Array3<bool>,
    count: usize,
}

impl Mask {
    /// Include voxels whose summed intensity is strictly positive.
    ///
    /// A degenerate (all-zero) volume yields an all-false mask; callers
    /// check [`Mask::is_empty`] instead of handling an error here.
    pub fn from_volume(volume: &Volume4) -> Self {
        let include = volume.sum_axis(Axis(3)).mapv(|s| s > 0.0);
        Self::from_array(include)
    }

    /// Wrap an explicit inclusion array.
    pub fn from_array(include: Array3<bool>) -> Self {
        let count = include.iter().filter(|&&v| v).count();
        Self { include, count }
    }

    /// Spatial shape (X, Y, Z).
    pub fn shape(&self) -> Shape3 {
        self.include.dim()
    }

    /// Number of included voxels.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Number of voxels inspected.
    pub fn total_voxels(&self) -> usize {
        self.include.len()
    }

    /// Whether no voxel is included.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The inclusion array.
    pub fn as_array(&self) -> &Array3<bool> {
        &self.include
    }

    /// Coordinates of included voxels, in column order.
    pub fn coordinates(&self) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
        self.include
            .indexed_iter()
            .filter(|(_, &inc)| inc)
            .map(|(idx, _)| idx)
    }

    /// Gather included voxels into a T × V matrix.
    pub fn extract(&self, volume: &Volume4) -> TimeSeriesMatrix {
        let n_frames = volume.len_of(Axis(3));
        let mut data = DMatrix::zeros(n_frames, self.count);
        for (col, (x, y, z)) in self.coordinates().enumerate() {
            for t in 0..n_frames {
                data[(t, col)] = volume[[x, y, z, t]];
            }
        }
        data
    }

    /// Scatter per-voxel values back into volume geometry; zero outside.
    ///
    /// `values` must hold one entry per included voxel, in column order.
    pub fn unmask(&self, values: &[f64]) -> Map3 {
        debug_assert_eq!(values.len(), self.count);
        let mut map = Map3::zeros(self.shape());
        for ((x, y, z), &v) in self.coordinates().zip(values) {
            map[[x, y, z]] = v;
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    fn volume() -> Volume4 {
        let mut v = Array4::<f64>::zeros((2, 2, 1, 3));
        for t in 0..3 {
            v[[0, 0, 0, t]] = 1.0 + t as f64;
            v[[1, 1, 0, t]] = 5.0;
            v[[0, 1, 0, t]] = if t == 0 { -1.0 } else { 0.5 };
        }
        v
    }

    #[test]
    fn test_positive_sum_included() {
        let mask = Mask::from_volume(&volume());
        assert_eq!(mask.count(), 2);
        assert_eq!(mask.total_voxels(), 4);
        assert!(mask.as_array()[[0, 0, 0]]);
        assert!(mask.as_array()[[1, 1, 0]]);
        // Sums to exactly zero: excluded.
        assert!(!mask.as_array()[[0, 1, 0]]);
    }

    #[test]
    fn test_all_zero_volume_gives_empty_mask() {
        let mask = Mask::from_volume(&Array4::zeros((3, 3, 1, 4)));
        assert!(mask.is_empty());
        assert_eq!(mask.total_voxels(), 9);
    }

    #[test]
    fn test_extract_then_unmask() {
        let vol = volume();
        let mask = Mask::from_volume(&vol);
        let data = mask.extract(&vol);
        assert_eq!(data.shape(), (3, 2));
        assert_eq!(data[(2, 0)], 3.0);
        assert_eq!(data[(1, 1)], 5.0);

        let map = mask.unmask(&[7.0, 9.0]);
        assert_eq!(map[[0, 0, 0]], 7.0);
        assert_eq!(map[[1, 1, 0]], 9.0);
        assert_eq!(map[[0, 1, 0]], 0.0);
        assert_eq!(map[[1, 0, 0]], 0.0);
    }
}
