//! Reports, figures, and overlays.

mod figures;
mod json;
mod overlay;
mod terminal;

pub use figures::{NoopVisualizer, PngVisualizer, Visualizer};
pub use json::{design_to_json, to_json, to_json_pretty, DesignExport};
pub use overlay::{
    contour_mask, jet, opacity, overlay_layer, should_draw_overlay, OverlayRequest, OverlaySign,
    Rgba,
};
pub use terminal::{format_report, format_test};
