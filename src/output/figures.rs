//! Figure rendering behind the [`Visualizer`] seam.
//!
//! The pipeline hands figures to a visualizer instead of drawing them
//! itself. [`NoopVisualizer`] discards them; [`PngVisualizer`] writes
//! plain raster images with the `image` crate.

use std::path::Path;

use image::{GrayImage, Luma, Rgb, RgbImage};

use super::overlay::{contour_mask, overlay_layer, OverlayRequest, OverlaySign};
use crate::design::DesignMatrix;
use crate::error::{AnalysisError, Result};
use crate::types::Map3;

/// Destination for the per-test figures.
pub trait Visualizer: Send + Sync {
    /// Draw the design matrix.
    fn render_design_matrix(&self, path: &Path, design: &DesignMatrix) -> Result<()>;

    /// Draw the contrast figure: background plus optional overlay.
    fn render_contrast(&self, path: &Path, request: &OverlayRequest<'_>) -> Result<()>;
}

/// Discards every figure.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopVisualizer;

impl Visualizer for NoopVisualizer {
    fn render_design_matrix(&self, _path: &Path, _design: &DesignMatrix) -> Result<()> {
        Ok(())
    }

    fn render_contrast(&self, _path: &Path, _request: &OverlayRequest<'_>) -> Result<()> {
        Ok(())
    }
}

/// Writes figures as PNG files.
#[derive(Debug, Clone, Copy)]
pub struct PngVisualizer {
    /// Width of one design column in pixels (default: 24).
    pub column_width: u32,
    /// Which z sign drives overlay opacity (default: positive).
    pub sign: OverlaySign,
}

impl Default for PngVisualizer {
    fn default() -> Self {
        Self {
            column_width: 24,
            sign: OverlaySign::Positive,
        }
    }
}

impl Visualizer for PngVisualizer {
    fn render_design_matrix(&self, path: &Path, design: &DesignMatrix) -> Result<()> {
        let matrix = design.matrix();
        let (n_frames, n_cols) = matrix.shape();
        let width = self.column_width.max(1) * n_cols as u32;
        let mut img = GrayImage::new(width, n_frames as u32);

        for (c, column) in matrix.column_iter().enumerate() {
            let (lo, hi) = column
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
            for (t, &v) in column.iter().enumerate() {
                let level = to_u8(normalize(v, lo, hi));
                for dx in 0..self.column_width.max(1) {
                    let x = c as u32 * self.column_width.max(1) + dx;
                    img.put_pixel(x, t as u32, Luma([level]));
                }
            }
        }

        save(img.save(path), path)
    }

    fn render_contrast(&self, path: &Path, request: &OverlayRequest<'_>) -> Result<()> {
        tracing::debug!(title = request.title, path = %path.display(), "rendering contrast");
        let (nx, ny, nz) = request.background.dim();
        let mut img = RgbImage::new((nx * nz) as u32, ny as u32);

        let (lo, hi) = finite_range(request.background);
        let layer = request
            .draw_overlay
            .then(|| overlay_layer(request.effect, request.z, request.threshold, self.sign));
        let contour = contour_mask(request.z, request.threshold);

        // Slices are tiled left to right.
        for ((x, y, z), &bg) in request.background.indexed_iter() {
            let grey = normalize(bg, lo, hi);
            let mut rgb = [grey, grey, grey];

            if let Some(layer) = &layer {
                let px = layer[[x, y, z]];
                rgb = [
                    (1.0 - px.a) * rgb[0] + px.a * px.r,
                    (1.0 - px.a) * rgb[1] + px.a * px.g,
                    (1.0 - px.a) * rgb[2] + px.a * px.b,
                ];
                if on_edge(&contour, x, y, z) {
                    rgb = [1.0, 1.0, 1.0];
                }
            }

            let col = (z * nx + x) as u32;
            img.put_pixel(col, y as u32, Rgb([to_u8(rgb[0]), to_u8(rgb[1]), to_u8(rgb[2])]));
        }

        save(img.save(path), path)
    }
}

fn save(result: image::ImageResult<()>, path: &Path) -> Result<()> {
    result.map_err(|source| AnalysisError::Figure {
        path: path.to_path_buf(),
        source,
    })
}

fn finite_range(map: &Map3) -> (f64, f64) {
    map.iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

fn normalize(v: f64, lo: f64, hi: f64) -> f64 {
    if !(hi > lo) || !v.is_finite() {
        return 0.0;
    }
    ((v - lo) / (hi - lo)).clamp(0.0, 1.0)
}

fn to_u8(v: f64) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// A contour voxel with at least one in-plane neighbour outside the contour.
fn on_edge(contour: &ndarray::Array3<bool>, x: usize, y: usize, z: usize) -> bool {
    if !contour[[x, y, z]] {
        return false;
    }
    let (nx, ny, _) = contour.dim();
    let outside = |xx: Option<usize>, yy: Option<usize>| match (xx, yy) {
        (Some(xx), Some(yy)) if xx < nx && yy < ny => !contour[[xx, yy, z]],
        _ => true,
    };
    outside(x.checked_sub(1), Some(y))
        || outside(Some(x + 1), Some(y))
        || outside(Some(x), y.checked_sub(1))
        || outside(Some(x), Some(y + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paradigm::{Event, Paradigm};
    use crate::design::DesignMatrixBuilder;

    #[test]
    fn test_design_png_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("design.png");
        let paradigm = Paradigm::new(
            vec![Event {
                condition: 0,
                onset: 2.0,
                duration: 3.0,
                amplitude: 1.0,
            }],
            12,
        )
        .unwrap();
        let design = DesignMatrixBuilder::new().build(&paradigm).unwrap();

        PngVisualizer::default().render_design_matrix(&path, &design).unwrap();
        let img = image::open(&path).unwrap();
        assert_eq!(img.width(), 24);
        assert_eq!(img.height(), 12);
    }

    #[test]
    fn test_contrast_png_tiles_slices() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contrast.png");
        let background = Map3::from_elem((4, 3, 2), 10.0);
        let mut z = Map3::zeros((4, 3, 2));
        z[[1, 1, 0]] = 8.0;
        let effect = z.clone();
        let request = OverlayRequest {
            title: "synthetic",
            background: &background,
            effect: &effect,
            z: &z,
            threshold: 3.74,
            draw_overlay: true,
        };

        PngVisualizer::default().render_contrast(&path, &request).unwrap();
        let img = image::open(&path).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (8, 3));
        // The single suprathreshold voxel is its own contour edge.
        assert_eq!(img.get_pixel(1, 1), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_noop_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never.png");
        let map = Map3::zeros((1, 1, 1));
        let request = OverlayRequest {
            title: "",
            background: &map,
            effect: &map,
            z: &map,
            threshold: 1.0,
            draw_overlay: false,
        };
        NoopVisualizer.render_contrast(&path, &request).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_normalize_flat_range() {
        assert_eq!(normalize(5.0, 5.0, 5.0), 0.0);
        assert_eq!(normalize(7.5, 5.0, 10.0), 0.5);
    }
}
