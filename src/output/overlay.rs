//! Significance-weighted overlay layer for contrast figures.
//!
//! Each voxel is coloured by its effect on the jet colormap, centred so
//! that zero effect sits mid-scale, and made opaque in proportion to its
//! z-score relative to the threshold:
//!
//! ```text
//! colour  = jet((1 + E / max|E|) / 2)
//! opacity = clip(z / thresh, ≤ 1), set to 0 below 0.2
//! ```

use ndarray::{Array3, Zip};
use serde::{Deserialize, Serialize};

use crate::config::Thresholds;
use crate::types::Map3;

/// Opacities below this are dropped entirely.
const MIN_OPACITY: f64 = 0.2;

/// Which side of the z distribution drives opacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OverlaySign {
    /// Positive z only.
    #[default]
    Positive,
    /// Negative z only.
    Negative,
    /// Either sign.
    Absolute,
}

/// An RGBA colour with components in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    /// Red.
    pub r: f64,
    /// Green.
    pub g: f64,
    /// Blue.
    pub b: f64,
    /// Opacity.
    pub a: f64,
}

impl Rgba {
    /// Fully transparent black.
    pub const TRANSPARENT: Rgba = Rgba {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };
}

/// Piecewise-linear channel of the jet colormap.
fn channel(x: f64, knots: &[(f64, f64)]) -> f64 {
    let x = x.clamp(0.0, 1.0);
    for pair in knots.windows(2) {
        let (x0, y0) = pair[0];
        let (x1, y1) = pair[1];
        if x <= x1 {
            return y0 + (y1 - y0) * (x - x0) / (x1 - x0);
        }
    }
    knots.last().map_or(0.0, |&(_, y)| y)
}

/// The jet colormap at `x` in [0, 1] (values outside are clamped).
pub fn jet(x: f64) -> [f64; 3] {
    const RED: [(f64, f64); 5] = [(0.0, 0.0), (0.35, 0.0), (0.66, 1.0), (0.89, 1.0), (1.0, 0.5)];
    const GREEN: [(f64, f64); 6] = [
        (0.0, 0.0),
        (0.125, 0.0),
        (0.375, 1.0),
        (0.64, 1.0),
        (0.91, 0.0),
        (1.0, 0.0),
    ];
    const BLUE: [(f64, f64); 5] = [(0.0, 0.5), (0.11, 1.0), (0.34, 1.0), (0.65, 0.0), (1.0, 0.0)];
    [channel(x, &RED), channel(x, &GREEN), channel(x, &BLUE)]
}

/// Overlay opacity of a single voxel.
pub fn opacity(z: f64, threshold: f64, sign: OverlaySign) -> f64 {
    let raw = match sign {
        OverlaySign::Positive => z / threshold,
        OverlaySign::Negative => -z / threshold,
        OverlaySign::Absolute => z.abs() / threshold,
    };
    let clipped = raw.min(1.0);
    if clipped < MIN_OPACITY || !clipped.is_finite() {
        0.0
    } else {
        clipped
    }
}

/// Coloured, significance-weighted layer for an effect and z map.
pub fn overlay_layer(effect: &Map3, z: &Map3, threshold: f64, sign: OverlaySign) -> Array3<Rgba> {
    let max_abs = effect.iter().fold(0.0_f64, |m, e| m.max(e.abs()));
    let mut layer = Array3::from_elem(effect.dim(), Rgba::TRANSPARENT);

    Zip::from(&mut layer)
        .and(effect)
        .and(z)
        .for_each(|px, &e, &zv| {
            let ratio = if max_abs > 0.0 { e / max_abs } else { 0.0 };
            let [r, g, b] = jet((1.0 + ratio) / 2.0);
            *px = Rgba {
                r,
                g,
                b,
                a: opacity(zv, threshold, sign),
            };
        });
    layer
}

/// Voxels inside the significance contour.
pub fn contour_mask(z: &Map3, threshold: f64) -> Array3<bool> {
    z.mapv(|v| v > threshold)
}

/// Whether a contrast is worth overlaying: something passes the threshold
/// and no effect exceeds the display cap.
pub fn should_draw_overlay(max_z: f64, max_effect: f64, thresholds: &Thresholds) -> bool {
    max_z > thresholds.z_threshold && max_effect < thresholds.max_effect
}

/// Everything a visualizer needs to draw one contrast figure.
#[derive(Debug, Clone, Copy)]
pub struct OverlayRequest<'a> {
    /// Figure title.
    pub title: &'a str,
    /// Mean intensity image, used as background.
    pub background: &'a Map3,
    /// Effect map.
    pub effect: &'a Map3,
    /// z-score map.
    pub z: &'a Map3,
    /// Significance threshold.
    pub threshold: f64,
    /// Whether to draw the overlay on top of the background.
    pub draw_overlay: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: [f64; 3], b: [f64; 3]) -> bool {
        a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-9)
    }

    #[test]
    fn test_jet_endpoints() {
        assert!(close(jet(0.0), [0.0, 0.0, 0.5]));
        assert!(close(jet(1.0), [0.5, 0.0, 0.0]));
        // Mid-scale is green-dominated.
        let mid = jet(0.5);
        assert!(mid[1] > 0.9);
        assert!(close(jet(-3.0), jet(0.0)));
    }

    #[test]
    fn test_opacity_clipping() {
        assert_eq!(opacity(7.48, 3.74, OverlaySign::Positive), 1.0);
        assert!((opacity(1.87, 3.74, OverlaySign::Positive) - 0.5).abs() < 1e-12);
        assert_eq!(opacity(0.5, 3.74, OverlaySign::Positive), 0.0);
        assert_eq!(opacity(-5.0, 3.74, OverlaySign::Positive), 0.0);
        assert_eq!(opacity(-5.0, 3.74, OverlaySign::Negative), 1.0);
        assert_eq!(opacity(-5.0, 3.74, OverlaySign::Absolute), 1.0);
    }

    #[test]
    fn test_layer_colours_by_effect() {
        let mut effect = Map3::zeros((3, 1, 1));
        effect[[0, 0, 0]] = -2.0;
        effect[[2, 0, 0]] = 2.0;
        let mut z = Map3::zeros((3, 1, 1));
        z[[2, 0, 0]] = 10.0;

        let layer = overlay_layer(&effect, &z, 3.74, OverlaySign::Positive);
        let lo = layer[[0, 0, 0]];
        let hi = layer[[2, 0, 0]];
        assert!(close([lo.r, lo.g, lo.b], jet(0.0)));
        assert!(close([hi.r, hi.g, hi.b], jet(1.0)));
        assert_eq!(lo.a, 0.0);
        assert_eq!(hi.a, 1.0);
    }

    #[test]
    fn test_zero_effect_map_is_mid_scale() {
        let layer = overlay_layer(&Map3::zeros((1, 1, 1)), &Map3::zeros((1, 1, 1)), 3.0, OverlaySign::Absolute);
        let px = layer[[0, 0, 0]];
        assert!(close([px.r, px.g, px.b], jet(0.5)));
    }

    #[test]
    fn test_overlay_gate() {
        let t = Thresholds::default();
        assert!(should_draw_overlay(5.0, 20.0, &t));
        assert!(!should_draw_overlay(3.0, 20.0, &t));
        assert!(!should_draw_overlay(5.0, 150.0, &t));
    }

    #[test]
    fn test_contour_is_strict() {
        let mut z = Map3::zeros((2, 1, 1));
        z[[0, 0, 0]] = 3.74;
        z[[1, 0, 0]] = 3.75;
        let c = contour_mask(&z, 3.74);
        assert!(!c[[0, 0, 0]]);
        assert!(c[[1, 0, 0]]);
    }
}
