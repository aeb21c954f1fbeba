//! Synthetic imaging volumes for tests and benchmarks.
//!
//! [`SyntheticVolume`] builds an (x, y, z, t) volume in raw intensity units:
//! a constant baseline, plus a chosen regressor scaled by an amplitude at
//! chosen voxels, plus optional AR(1) noise drawn from a seeded generator.
//!
//! # Example
//!
//! ```ignore
//! use calcium_glm::helpers::SyntheticVolume;
//!
//! let response: Vec<f64> = design.matrix().column(0).iter().copied().collect();
//! let volume = SyntheticVolume::new((2, 2, 1), 20)
//!     .baseline(100.0)
//!     .signal(&response, 5.0, &[(0, 0, 0)])
//!     .noise(0.1, 0.3)
//!     .seed(42)
//!     .build();
//! ```
//!
//! After percent-signal scaling, an amplitude `k` on a baseline `b` shows up
//! as a coefficient of roughly `100 * k / mean`, where `mean` is the voxel's
//! temporal mean (`b` plus `k` times the regressor's mean).

use ndarray::Array4;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::types::{Shape3, Volume4};

/// A regressor embedded at a set of voxels.
#[derive(Debug, Clone)]
struct Signal {
    regressor: Vec<f64>,
    amplitude: f64,
    voxels: Vec<(usize, usize, usize)>,
}

/// Builder for synthetic volumes.
#[derive(Debug, Clone)]
pub struct SyntheticVolume {
    shape: Shape3,
    n_frames: usize,
    baseline: f64,
    noise_sd: f64,
    ar1: f64,
    seed: u64,
    signals: Vec<Signal>,
}

impl SyntheticVolume {
    /// A noise-free volume of the given spatial shape and length with
    /// baseline 100.
    pub fn new(shape: Shape3, n_frames: usize) -> Self {
        Self {
            shape,
            n_frames,
            baseline: 100.0,
            noise_sd: 0.0,
            ar1: 0.0,
            seed: 0,
            signals: Vec::new(),
        }
    }

    /// Constant intensity of every voxel (default: 100).
    pub fn baseline(mut self, baseline: f64) -> Self {
        self.baseline = baseline;
        self
    }

    /// AR(1) noise with innovation standard deviation `sd` (default: none).
    pub fn noise(mut self, sd: f64, ar1: f64) -> Self {
        self.noise_sd = sd;
        self.ar1 = ar1.clamp(-0.99, 0.99);
        self
    }

    /// Generator seed (default: 0).
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Add `amplitude * regressor` to every listed voxel.
    ///
    /// The regressor is truncated or zero-padded to the volume length.
    pub fn signal(mut self, regressor: &[f64], amplitude: f64, voxels: &[(usize, usize, usize)]) -> Self {
        self.signals.push(Signal {
            regressor: regressor.to_vec(),
            amplitude,
            voxels: voxels.to_vec(),
        });
        self
    }

    /// Generate the volume.
    pub fn build(&self) -> Volume4 {
        let (nx, ny, nz) = self.shape;
        let mut volume = Array4::from_elem((nx, ny, nz, self.n_frames), self.baseline);

        for signal in &self.signals {
            for &(x, y, z) in &signal.voxels {
                if x >= nx || y >= ny || z >= nz {
                    continue;
                }
                for (t, &r) in signal.regressor.iter().take(self.n_frames).enumerate() {
                    volume[[x, y, z, t]] += signal.amplitude * r;
                }
            }
        }

        if self.noise_sd > 0.0 {
            self.add_noise(&mut volume);
        }
        volume
    }

    fn add_noise(&self, volume: &mut Volume4) {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.seed);
        let Ok(innovation) = Normal::new(0.0, self.noise_sd) else {
            return;
        };
        let stationary_sd = self.noise_sd / (1.0 - self.ar1 * self.ar1).sqrt();
        let Ok(initial) = Normal::new(0.0, stationary_sd) else {
            return;
        };

        for mut series in volume.lanes_mut(ndarray::Axis(3)) {
            let mut e = initial.sample(&mut rng);
            for (t, v) in series.iter_mut().enumerate() {
                if t > 0 {
                    e = self.ar1 * e + innovation.sample(&mut rng);
                }
                *v += e;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::residual_ar1;

    #[test]
    fn test_signal_lands_on_chosen_voxels() {
        let regressor = [0.0, 1.0, 1.0, 0.0];
        let vol = SyntheticVolume::new((2, 1, 1), 4)
            .signal(&regressor, 5.0, &[(1, 0, 0)])
            .build();
        assert_eq!(vol[[0, 0, 0, 1]], 100.0);
        assert_eq!(vol[[1, 0, 0, 1]], 105.0);
        assert_eq!(vol[[1, 0, 0, 3]], 100.0);
    }

    #[test]
    fn test_same_seed_same_volume() {
        let a = SyntheticVolume::new((2, 2, 1), 30).noise(1.0, 0.2).seed(9).build();
        let b = SyntheticVolume::new((2, 2, 1), 30).noise(1.0, 0.2).seed(9).build();
        let c = SyntheticVolume::new((2, 2, 1), 30).noise(1.0, 0.2).seed(10).build();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_ar1_noise_is_autocorrelated() {
        let vol = SyntheticVolume::new((1, 1, 1), 5000).noise(1.0, 0.6).seed(3).build();
        // Remove the baseline; the noise itself has zero mean.
        let series: Vec<f64> = vol.iter().map(|v| v - 100.0).collect();
        let rho = residual_ar1(&series);
        assert!((rho - 0.6).abs() < 0.05, "Expected ~0.6, got {}", rho);
    }
}
