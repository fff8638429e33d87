//! Search-result marker.
//!
//! One GeoJSON source and one circle layer on top of the stack. The last
//! result is kept in memory so the marker can be rebuilt after a style switch.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::consts::{SEARCH_MARKER_LAYER_ID, SEARCH_MARKER_SOURCE_ID, SEARCH_RESULT_ZOOM};
use crate::geo::LngLat;
use crate::overlay::{self, EnsureReport, OverlayDefinition};
use crate::popup::CameraTarget;
use crate::surface::{LayerSpec, LayerType, SourceSpec, Surface, empty_collection};

/// A geocoding hit chosen by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub center: LngLat,
    pub label: String,
    #[serde(default)]
    pub id: Option<String>,
}

impl SearchResult {
    fn to_collection(&self) -> Value {
        json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": self.center.to_position() },
                "properties": { "place_name": self.label, "id": self.id },
            }],
        })
    }
}

#[must_use]
pub fn marker_overlay() -> OverlayDefinition {
    let mut sources = BTreeMap::new();
    sources.insert(SEARCH_MARKER_SOURCE_ID.to_string(), SourceSpec::empty_geojson());
    let layers = vec![
        LayerSpec::new(SEARCH_MARKER_LAYER_ID, LayerType::Circle)
            .with_source(SEARCH_MARKER_SOURCE_ID)
            .with_paint("circle-radius", json!(8))
            .with_paint("circle-color", json!("#111827"))
            .with_paint("circle-stroke-width", json!(2))
            .with_paint("circle-stroke-color", json!("#ffffff")),
    ];
    OverlayDefinition { sources, layers }
}

#[derive(Debug, Clone, Default)]
pub struct SearchMarker {
    current: Option<SearchResult>,
}

impl SearchMarker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn current(&self) -> Option<&SearchResult> {
        self.current.as_ref()
    }

    /// Create the marker source and layer if missing.
    pub fn ensure<S: Surface + ?Sized>(&self, surface: &mut S) -> EnsureReport {
        overlay::ensure(surface, &marker_overlay())
    }

    /// Place the marker and return where the camera should fly.
    pub fn show<S: Surface + ?Sized>(&mut self, surface: &mut S, result: SearchResult) -> CameraTarget {
        let target = CameraTarget { center: result.center, zoom: SEARCH_RESULT_ZOOM };
        self.current = Some(result);
        self.ensure(surface);
        self.push(surface);
        target
    }

    pub fn clear<S: Surface + ?Sized>(&mut self, surface: &mut S) {
        self.current = None;
        self.push(surface);
    }

    /// Rebuild after a style switch from the remembered result.
    pub fn restore<S: Surface + ?Sized>(&self, surface: &mut S) -> EnsureReport {
        let report = self.ensure(surface);
        self.push(surface);
        report
    }

    fn push<S: Surface + ?Sized>(&self, surface: &mut S) {
        let data = self.current.as_ref().map_or_else(empty_collection, SearchResult::to_collection);
        if let Err(e) = surface.set_source_data(SEARCH_MARKER_SOURCE_ID, data) {
            tracing::debug!(error = %e, "search marker push skipped");
        }
    }
}

#[cfg(test)]
#[path = "search_test.rs"]
mod search_test;
