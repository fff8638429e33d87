//! Rendering-surface boundary.
//!
//! DESIGN
//! ======
//! The rendering engine is an external collaborator. Everything the engines
//! need from it is captured by the [`Surface`] trait: source/layer/image
//! bookkeeping, property setters, a read-only snapshot of the current stack,
//! rendered-feature queries, style replacement and a pollable lifecycle event
//! stream. A host adapter implements the trait once; nothing else in the crate
//! inspects the concrete engine type.
//!
//! The surface is never a source of truth. Engines only read it transiently
//! ("does layer X exist right now") and rebuild it from in-memory state.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::geo::QueryBox;

/// Metadata key used to tag layers created by the overlay registry.
pub const ROLE_KEY: &str = "role";

/// Metadata value marking a layer as an application overlay.
pub const ROLE_OVERLAY: &str = "overlay";

// =============================================================================
// LAYER TYPES
// =============================================================================

/// Renderer layer type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayerType {
    Fill,
    FillExtrusion,
    Line,
    Symbol,
    Circle,
    Heatmap,
    Raster,
    Hillshade,
    Background,
    /// Any type this crate does not know about (custom layers, 3D models).
    #[serde(other)]
    Other,
}

impl LayerType {
    /// Cartographic stacking rank: fill-like < line < circle < symbol.
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::Line => 1,
            Self::Circle => 2,
            Self::Symbol => 3,
            Self::Fill
            | Self::FillExtrusion
            | Self::Raster
            | Self::Background
            | Self::Hillshade
            | Self::Heatmap
            | Self::Other => 0,
        }
    }

    /// Paint properties controlled by a TOC opacity slider. Empty for types
    /// the TOC leaves untouched.
    #[must_use]
    pub fn opacity_properties(self) -> &'static [&'static str] {
        match self {
            Self::Fill => &["fill-opacity"],
            Self::Line => &["line-opacity"],
            Self::Circle => &["circle-opacity", "circle-stroke-opacity"],
            Self::Symbol => &["icon-opacity", "text-opacity"],
            Self::Raster => &["raster-opacity"],
            _ => &[],
        }
    }

    /// Paint properties dimmed by the basemap-wide opacity setting.
    #[must_use]
    pub fn basemap_opacity_properties(self) -> &'static [&'static str] {
        match self {
            Self::Fill => &["fill-opacity"],
            Self::Line => &["line-opacity"],
            Self::Circle => &["circle-opacity"],
            Self::Symbol => &["icon-opacity", "text-opacity"],
            Self::Raster => &["raster-opacity"],
            Self::Background => &["background-opacity"],
            _ => &[],
        }
    }
}

// =============================================================================
// DESCRIPTORS
// =============================================================================

/// Layer descriptor passed through to the surface.
///
/// Only the fields the engines read are typed; everything else rides along
/// in `extra` untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: LayerType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(rename = "source-layer", default, skip_serializing_if = "Option::is_none")]
    pub source_layer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub layout: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub paint: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LayerSpec {
    #[must_use]
    pub fn new(id: impl Into<String>, kind: LayerType) -> Self {
        Self {
            id: id.into(),
            kind,
            source: None,
            source_layer: None,
            metadata: None,
            filter: None,
            layout: Map::new(),
            paint: Map::new(),
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }

    #[must_use]
    pub fn with_paint(mut self, name: &str, value: Value) -> Self {
        self.paint.insert(name.to_string(), value);
        self
    }

    #[must_use]
    pub fn with_layout(mut self, name: &str, value: Value) -> Self {
        self.layout.insert(name.to_string(), value);
        self
    }

    /// Copy of this spec with `metadata.role` set, preserving other metadata keys.
    #[must_use]
    pub fn tagged(&self, role: &str) -> Self {
        let mut out = self.clone();
        let mut meta = match out.metadata.take() {
            Some(Value::Object(m)) => m,
            _ => Map::new(),
        };
        meta.insert(ROLE_KEY.to_string(), Value::String(role.to_string()));
        out.metadata = Some(Value::Object(meta));
        out
    }
}

/// Opaque source descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceSpec(pub Value);

impl SourceSpec {
    /// A GeoJSON source holding an empty feature collection.
    #[must_use]
    pub fn empty_geojson() -> Self {
        Self(serde_json::json!({ "type": "geojson", "data": empty_collection() }))
    }

    /// The declared source type (`geojson`, `vector`, `raster`, ...).
    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        self.0.get("type").and_then(Value::as_str)
    }
}

/// An empty GeoJSON feature collection.
#[must_use]
pub fn empty_collection() -> Value {
    serde_json::json!({ "type": "FeatureCollection", "features": [] })
}

/// RGBA bitmap registered with the surface for icon rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSpec {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// One entry of the surface's current layer stack, bottom to top.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleLayer {
    pub id: String,
    pub kind: LayerType,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl StyleLayer {
    /// Whether `metadata.role` equals `role`.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.metadata
            .as_ref()
            .and_then(|m| m.get(ROLE_KEY))
            .and_then(Value::as_str)
            .is_some_and(|r| r == role)
    }
}

/// A feature returned by a rendered-feature query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedFeature {
    /// Explicit feature id as reported by the renderer (string or number).
    #[serde(default)]
    pub id: Option<Value>,
    pub source: String,
    #[serde(default)]
    pub source_layer: Option<String>,
    pub layer_id: String,
    /// GeoJSON geometry object; `None` when the renderer could not supply one.
    #[serde(default)]
    pub geometry: Option<Value>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl RenderedFeature {
    /// Whether this hit is a synthetic cluster point.
    #[must_use]
    pub fn is_cluster(&self) -> bool {
        self.properties.get("cluster").and_then(Value::as_bool).unwrap_or(false)
    }

    /// Cluster id used to look up the expansion zoom.
    #[must_use]
    pub fn cluster_id(&self) -> Option<u64> {
        self.properties.get("cluster_id").and_then(Value::as_u64)
    }

    /// GeoJSON geometry type (`Point`, `LineString`, ...).
    #[must_use]
    pub fn geometry_type(&self) -> Option<&str> {
        self.geometry.as_ref()?.get("type")?.as_str()
    }
}

// =============================================================================
// EVENTS
// =============================================================================

/// Lifecycle notifications emitted by the surface.
///
/// A single logical style load may produce several `StyleData` events, some
/// of them before the style is actually usable; consumers must poll
/// [`Surface::is_style_loaded`] instead of trusting the first event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SurfaceEvent {
    /// Style replacement began; all dynamic state is gone.
    StyleLoading,
    /// Some part of the style (sources, sprites, glyphs) changed.
    StyleData,
    /// The style finished its initial load.
    StyleLoaded,
    /// The render queue drained.
    Idle,
    /// Generic failure (network, parse).
    Error { message: String },
    /// Answer to [`Surface::request_cluster_expansion_zoom`]. `zoom` is `None` when the lookup failed.
    ClusterExpansionZoom { source: String, cluster_id: u64, zoom: Option<f64> },
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SurfaceError {
    #[error("source not found: {0}")]
    SourceNotFound(String),
    #[error("layer not found: {0}")]
    LayerNotFound(String),
    #[error("duplicate id: {0}")]
    Duplicate(String),
    #[error("invalid spec for {id}: {reason}")]
    InvalidSpec { id: String, reason: String },
    #[error("surface is being torn down")]
    TornDown,
    #[error("style load failed: {0}")]
    StyleLoad(String),
}

impl crate::error::ErrorCode for SurfaceError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::SourceNotFound(_) => "E_SURFACE_SOURCE_NOT_FOUND",
            Self::LayerNotFound(_) => "E_SURFACE_LAYER_NOT_FOUND",
            Self::Duplicate(_) => "E_SURFACE_DUPLICATE",
            Self::InvalidSpec { .. } => "E_SURFACE_INVALID_SPEC",
            Self::TornDown => "E_SURFACE_TORN_DOWN",
            Self::StyleLoad(_) => "E_SURFACE_STYLE_LOAD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::StyleLoad(_))
    }
}

// =============================================================================
// SURFACE
// =============================================================================

/// The imperative rendering engine, as seen by the engines in this crate.
///
/// Replacing the style destroys every source, layer and image added through
/// this interface.
pub trait Surface {
    fn has_source(&self, id: &str) -> bool;
    fn add_source(&mut self, id: &str, spec: &SourceSpec) -> Result<(), SurfaceError>;
    fn remove_source(&mut self, id: &str) -> Result<(), SurfaceError>;
    /// Replace the data of a GeoJSON source.
    fn set_source_data(&mut self, id: &str, data: Value) -> Result<(), SurfaceError>;

    fn get_layer(&self, id: &str) -> Option<StyleLayer>;
    /// Add a layer on top, or directly below `before` when given.
    fn add_layer(&mut self, spec: &LayerSpec, before: Option<&str>) -> Result<(), SurfaceError>;
    fn remove_layer(&mut self, id: &str) -> Result<(), SurfaceError>;
    /// Move a layer to the top of the stack, or directly below `before`.
    fn move_layer(&mut self, id: &str, before: Option<&str>) -> Result<(), SurfaceError>;
    fn set_layout_property(&mut self, layer: &str, name: &str, value: Value) -> Result<(), SurfaceError>;
    fn set_paint_property(&mut self, layer: &str, name: &str, value: Value) -> Result<(), SurfaceError>;

    fn has_image(&self, id: &str) -> bool;
    fn add_image(&mut self, id: &str, image: &ImageSpec) -> Result<(), SurfaceError>;

    /// Snapshot of the current layer stack, bottom to top.
    fn style_layers(&self) -> Vec<StyleLayer>;

    /// Rendered features intersecting `area`, topmost first, optionally
    /// restricted to the given layer ids.
    fn query_rendered_features(&self, area: QueryBox, layers: Option<&[String]>) -> Vec<RenderedFeature>;

    /// Start replacing the base style. Completion is signalled through events.
    fn replace_style(&mut self, url: &str) -> Result<(), SurfaceError>;

    /// Readiness flag of the current style.
    fn is_style_loaded(&self) -> bool;

    /// Ask a clustered source for the zoom at which `cluster_id` breaks apart.
    /// The answer arrives as [`SurfaceEvent::ClusterExpansionZoom`].
    fn request_cluster_expansion_zoom(&mut self, source: &str, cluster_id: u64) -> Result<(), SurfaceError>;

    /// Drain lifecycle events queued since the last poll.
    fn poll_events(&mut self) -> Vec<SurfaceEvent> {
        Vec::new()
    }

    fn has_layer(&self, id: &str) -> bool {
        self.get_layer(id).is_some()
    }
}

#[cfg(test)]
#[path = "surface_test.rs"]
mod surface_test;
