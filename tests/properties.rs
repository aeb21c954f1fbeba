//! Property tests for the model-fitting invariants.

use calcium_glm::glm::whiten;
use calcium_glm::paradigm::normalize_amplitude;
use calcium_glm::statistics::{ar1_bin, scale_to_percent_signal};
use calcium_glm::{
    compute_contrast, Contrast, ContrastDefinition, DesignMatrix, DesignMatrixBuilder, DriftModel,
    ErrorKind, Event, GeneralLinearModel, GlmOptions, Mask, Paradigm,
};
use nalgebra::DMatrix;
use ndarray::Array3;
use proptest::prelude::*;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use rand_xoshiro::Xoshiro256PlusPlus;

const N_FRAMES: usize = 24;

fn design() -> DesignMatrix {
    let events = [4.0, 14.0]
        .iter()
        .map(|&onset| Event {
            condition: 0,
            onset,
            duration: 3.0,
            amplitude: 1.0,
        })
        .collect();
    let paradigm = Paradigm::new(events, N_FRAMES).unwrap();
    DesignMatrixBuilder::new()
        .drift(DriftModel::Polynomial { order: 1 })
        .build(&paradigm)
        .unwrap()
}

/// Percent-signal-like data: noise plus `amplitude` times the first regressor.
fn data(design: &DesignMatrix, n_voxels: usize, amplitude: f64, seed: u64) -> DMatrix<f64> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let normal = Normal::new(0.0, 1.0).unwrap();
    let x = design.matrix();
    DMatrix::from_fn(N_FRAMES, n_voxels, |t, v| {
        let sign = if v % 2 == 0 { 1.0 } else { -1.0 };
        sign * amplitude * x[(t, 0)] + normal.sample(&mut rng)
    })
}

fn full_mask(n_voxels: usize) -> Mask {
    Mask::from_array(Array3::from_elem((n_voxels, 1, 1), true))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn normalized_amplitude_is_never_negative(a in prop::num::f64::ANY) {
        let value = normalize_amplitude(a);
        prop_assert!(value >= 0.0);
    }

    #[test]
    fn normalized_amplitude_is_monotone(a in 1e-12f64..1.0, factor in 1.0f64..100.0) {
        prop_assert!(normalize_amplitude(a * factor) >= normalize_amplitude(a));
    }

    #[test]
    fn quantized_ar1_rounds_toward_zero(rho in -1.0f64..1.0, steps in 1usize..200) {
        let q = ar1_bin(rho, steps) as f64 / steps as f64;
        prop_assert!(q.abs() <= rho.abs() + 1e-12);
        prop_assert!((rho - q).abs() < 1.0 / steps as f64 + 1e-12);
    }

    #[test]
    fn whitening_keeps_first_row(rho in -0.99f64..0.99) {
        let d = design();
        let w = whiten(d.matrix(), rho);
        prop_assert_eq!(w.row(0), d.matrix().row(0));
    }

    #[test]
    fn z_sign_matches_effect_sign(amplitude in 0.0f64..5.0, seed in any::<u64>()) {
        let d = design();
        let y = data(&d, 6, amplitude, seed);
        let fit = GeneralLinearModel::new(&d, GlmOptions::default())
            .unwrap()
            .fit(&y)
            .unwrap();
        let contrast = Contrast::from_definition(&d, &ContrastDefinition::Condition(0)).unwrap();
        let maps = compute_contrast(&fit, &contrast, &full_mask(6)).unwrap();

        for (z, e) in maps.z.iter().zip(maps.effect.iter()) {
            if *z != 0.0 {
                prop_assert_eq!(z.signum(), e.signum());
            }
        }
    }

    #[test]
    fn contrast_length_mismatch_is_configuration_error(extra in 1usize..4, seed in any::<u64>()) {
        let d = design();
        let y = data(&d, 3, 1.0, seed);
        let fit = GeneralLinearModel::new(&d, GlmOptions::default())
            .unwrap()
            .fit(&y)
            .unwrap();
        let contrast = Contrast::new(vec![1.0; d.n_regressors() + extra]);
        let err = compute_contrast(&fit, &contrast, &full_mask(3)).unwrap_err();
        prop_assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn percent_signal_ignores_overall_gain(gain in 0.1f64..50.0, seed in any::<u64>()) {
        let d = design();
        let raw = data(&d, 4, 2.0, seed).add_scalar(100.0);
        let mask = full_mask(4);

        let a = scale_to_percent_signal(&raw, &mask).unwrap();
        let b = scale_to_percent_signal(&(&raw * gain), &mask).unwrap();

        for (x, y) in a.data.iter().zip(b.data.iter()) {
            prop_assert!((x - y).abs() < 1e-9, "{} vs {}", x, y);
        }
        for col in a.data.column_iter() {
            prop_assert!(col.mean().abs() < 1e-9);
        }
    }

    #[test]
    fn rescaling_percent_signal_is_idempotent(n_voxels in 1usize..6, seed in any::<u64>()) {
        let d = design();
        let raw = data(&d, n_voxels, 2.0, seed).add_scalar(100.0);
        let mask = full_mask(n_voxels);

        let once = scale_to_percent_signal(&raw, &mask).unwrap();
        let twice = scale_to_percent_signal(&once.data, &mask).unwrap();

        // Already-scaled series have zero mean, so they are only demeaned.
        prop_assert_eq!(twice.near_zero_means, n_voxels);
        for (x, y) in once.data.iter().zip(twice.data.iter()) {
            prop_assert!((x - y).abs() < 1e-9, "{} vs {}", x, y);
        }
    }
}
