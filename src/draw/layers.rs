//! Surface-side projection of the draw engine: sources, layers, arrow icon.
//!
//! Committed features go to one source, the live sketch to another, so the
//! two can be styled and refreshed independently. Everything here is safe to
//! call again after a style switch wiped the surface.

use std::collections::BTreeMap;

use serde_json::json;

use crate::consts::{ARROW_ICON_ID, ARROW_ICON_SIZE, DRAW_DATA_SOURCE_ID, DRAW_SKETCH_SOURCE_ID};
use crate::overlay::{self, EnsureReport, OverlayDefinition};
use crate::surface::{ImageSpec, LayerSpec, LayerType, SourceSpec, Surface};

use super::engine::{DrawChange, DrawEngine};

const POLYGON_COLOR: &str = "#3b82f6";
const OUTLINE_COLOR: &str = "#1d4ed8";
const LINE_COLOR: &str = "#16a34a";
const POINT_COLOR: &str = "#dc2626";
const SKETCH_COLOR: &str = "#2563eb";

/// Arrowhead stroke color, `#16a34a`.
const ARROW_RGB: [u8; 3] = [0x16, 0xa3, 0x4a];

/// Sources and layers for drawings, bottom to top.
#[must_use]
pub fn draw_overlay() -> OverlayDefinition {
    let mut sources = BTreeMap::new();
    sources.insert(DRAW_DATA_SOURCE_ID.to_string(), SourceSpec::empty_geojson());
    sources.insert(DRAW_SKETCH_SOURCE_ID.to_string(), SourceSpec::empty_geojson());

    let kind_is = |k: &str| json!(["==", ["get", "kind"], k]);
    let layers = vec![
        LayerSpec::new("draw-polygons-fill", LayerType::Fill)
            .with_source(DRAW_DATA_SOURCE_ID)
            .with_filter(kind_is("polygon"))
            .with_paint("fill-color", json!(POLYGON_COLOR))
            .with_paint("fill-opacity", json!(0.25)),
        LayerSpec::new("draw-polygons-outline", LayerType::Line)
            .with_source(DRAW_DATA_SOURCE_ID)
            .with_filter(kind_is("polygon"))
            .with_paint("line-color", json!(OUTLINE_COLOR))
            .with_paint("line-width", json!(2)),
        LayerSpec::new("draw-lines", LayerType::Line)
            .with_source(DRAW_DATA_SOURCE_ID)
            .with_filter(json!(["any", ["==", ["get", "kind"], "line"], ["==", ["get", "kind"], "arrow"]]))
            .with_paint("line-color", json!(LINE_COLOR))
            .with_paint("line-width", json!(3)),
        LayerSpec::new("draw-arrows", LayerType::Symbol)
            .with_source(DRAW_DATA_SOURCE_ID)
            .with_filter(kind_is("arrow"))
            .with_layout("symbol-placement", json!("line"))
            .with_layout("symbol-spacing", json!(80))
            .with_layout("icon-image", json!(ARROW_ICON_ID))
            .with_layout("icon-allow-overlap", json!(true))
            .with_layout("icon-rotation-alignment", json!("map")),
        LayerSpec::new("draw-points", LayerType::Circle)
            .with_source(DRAW_DATA_SOURCE_ID)
            .with_filter(kind_is("point"))
            .with_paint("circle-radius", json!(6))
            .with_paint("circle-color", json!(POINT_COLOR))
            .with_paint("circle-stroke-color", json!("#ffffff"))
            .with_paint("circle-stroke-width", json!(2)),
        LayerSpec::new("draw-point-labels", LayerType::Symbol)
            .with_source(DRAW_DATA_SOURCE_ID)
            .with_filter(kind_is("point"))
            .with_layout("text-field", json!(["coalesce", ["get", "label"], ""]))
            .with_layout("text-size", json!(14))
            .with_layout("text-offset", json!([0, 1.2]))
            .with_layout("text-anchor", json!("top"))
            .with_paint("text-color", json!("#111827"))
            .with_paint("text-halo-color", json!("#ffffff"))
            .with_paint("text-halo-width", json!(2)),
        LayerSpec::new("draw-sketch-fill", LayerType::Fill)
            .with_source(DRAW_SKETCH_SOURCE_ID)
            .with_filter(kind_is("sketch-polygon"))
            .with_paint("fill-color", json!(SKETCH_COLOR))
            .with_paint("fill-opacity", json!(0.1)),
        LayerSpec::new("draw-sketch-line", LayerType::Line)
            .with_source(DRAW_SKETCH_SOURCE_ID)
            .with_filter(json!(["!=", ["get", "kind"], "sketch-polygon"]))
            .with_paint("line-color", json!(SKETCH_COLOR))
            .with_paint("line-width", json!(2))
            .with_paint("line-dasharray", json!([2, 2])),
    ];
    OverlayDefinition { sources, layers }
}

// =============================================================================
// ARROW ICON
// =============================================================================

/// Right-pointing chevron, 4px stroke, transparent background.
#[must_use]
pub fn arrow_icon() -> ImageSpec {
    let size = ARROW_ICON_SIZE;
    let segments = [((10.0, 10.0), (24.0, 16.0)), ((24.0, 16.0), (10.0, 22.0))];
    let half_width = 2.0;
    let mut rgba = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let c = (f64::from(x) + 0.5, f64::from(y) + 0.5);
            let d = segments.iter().map(|&(a, b)| segment_distance(c, a, b)).fold(f64::INFINITY, f64::min);
            if d <= half_width {
                rgba.extend_from_slice(&ARROW_RGB);
                rgba.push(255);
            } else {
                rgba.extend_from_slice(&[0, 0, 0, 0]);
            }
        }
    }
    ImageSpec { width: size, height: size, rgba }
}

/// Distance from `p` to segment `a..b`; round caps fall out of the clamp.
fn segment_distance(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len2 = dx * dx + dy * dy;
    let t = if len2 == 0.0 { 0.0 } else { (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len2).clamp(0.0, 1.0) };
    let (qx, qy) = (a.0 + t * dx, a.1 + t * dy);
    ((p.0 - qx).powi(2) + (p.1 - qy).powi(2)).sqrt()
}

// =============================================================================
// SURFACE SYNC
// =============================================================================

/// Create missing draw sources, layers and the arrow icon.
pub fn ensure<S: Surface + ?Sized>(surface: &mut S) -> EnsureReport {
    let mut report = overlay::ensure(surface, &draw_overlay());
    if !surface.has_image(ARROW_ICON_ID) {
        if let Err(e) = surface.add_image(ARROW_ICON_ID, &arrow_icon()) {
            tracing::warn!(image = ARROW_ICON_ID, error = %e, "arrow icon rejected");
            report.failed.push(ARROW_ICON_ID.to_string());
        }
    }
    report
}

/// Push the sources `change` marks stale.
pub fn push<S: Surface + ?Sized>(surface: &mut S, engine: &DrawEngine, change: DrawChange) {
    if change.features {
        if let Err(e) = surface.set_source_data(DRAW_DATA_SOURCE_ID, engine.data_geojson()) {
            tracing::debug!(error = %e, "draw data push skipped");
        }
    }
    if change.sketch {
        if let Err(e) = surface.set_source_data(DRAW_SKETCH_SOURCE_ID, engine.sketch_geojson()) {
            tracing::debug!(error = %e, "draw sketch push skipped");
        }
    }
}

/// Recreate everything after a style switch and re-push both sources from memory.
pub fn restore<S: Surface + ?Sized>(surface: &mut S, engine: &DrawEngine) -> EnsureReport {
    let report = ensure(surface);
    push(surface, engine, DrawChange { features: true, sketch: true, committed: None });
    report
}

#[cfg(test)]
#[path = "layers_test.rs"]
mod layers_test;
