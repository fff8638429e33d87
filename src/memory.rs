//! In-process rendering surface.
//!
//! DESIGN
//! ======
//! `MemorySurface` models the parts of a real renderer that make
//! synchronization hard, without drawing anything:
//!
//! - `replace_style` only starts a load; the previous style stays in place
//!   until [`MemorySurface::complete_style_load`] swaps it, wiping every
//!   dynamically added source, layer and image.
//! - Loads emit several `StyleData` events plus `StyleLoaded`, and
//!   [`MemorySurface::emit_partial_style_data`] fires `StyleData` while the
//!   readiness flag is still false.
//! - Base styles may insert layers late ([`MemorySurface::insert_style_layer`]).
//! - `add_layer` rejects layers whose source is missing, like the real thing.
//!
//! The replay binary and the tests drive it directly.

use std::collections::{BTreeMap, HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::geo::{QueryBox, ScreenPoint};
use crate::surface::{
    ImageSpec, LayerSpec, LayerType, RenderedFeature, SourceSpec, StyleLayer, Surface, SurfaceError, SurfaceEvent,
};

/// Sources and layers that make up one base style.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleFixture {
    #[serde(default)]
    pub sources: BTreeMap<String, SourceSpec>,
    #[serde(default)]
    pub layers: Vec<LayerSpec>,
}

/// Call counters, used to assert idempotence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SurfaceStats {
    pub sources_added: usize,
    pub layers_added: usize,
    pub layers_moved: usize,
    pub images_added: usize,
    pub styles_replaced: usize,
}

#[derive(Debug, Clone)]
struct MemSource {
    spec: SourceSpec,
    data: Option<Value>,
}

#[derive(Debug, Clone)]
struct MemLayer {
    spec: LayerSpec,
    from_style: bool,
}

/// A renderer stand-in that keeps its state in plain collections.
#[derive(Debug, Default)]
pub struct MemorySurface {
    styles: HashMap<String, StyleFixture>,
    current_url: Option<String>,
    pending_url: Option<String>,
    loaded: bool,
    torn_down: bool,
    sources: BTreeMap<String, MemSource>,
    layers: Vec<MemLayer>,
    images: HashMap<String, ImageSpec>,
    rendered: Vec<(ScreenPoint, RenderedFeature)>,
    cluster_zooms: HashMap<(String, u64), f64>,
    events: VecDeque<SurfaceEvent>,
    stats: SurfaceStats,
}

impl MemorySurface {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a style fixture reachable under `url`.
    #[must_use]
    pub fn with_style(mut self, url: impl Into<String>, fixture: StyleFixture) -> Self {
        self.styles.insert(url.into(), fixture);
        self
    }

    pub fn register_style(&mut self, url: impl Into<String>, fixture: StyleFixture) {
        self.styles.insert(url.into(), fixture);
    }

    // --- Lifecycle simulation ---

    /// Finish the pending style load: swap in the new style and queue the
    /// (duplicated) load events. Queues an error if the URL is unknown.
    pub fn complete_style_load(&mut self) {
        let Some(url) = self.pending_url.take() else {
            return;
        };
        let Some(fixture) = self.styles.get(&url).cloned() else {
            self.loaded = self.current_url.is_some();
            self.events.push_back(SurfaceEvent::Error { message: format!("failed to load style {url}") });
            return;
        };

        self.sources.clear();
        self.layers.clear();
        self.images.clear();
        for (id, spec) in fixture.sources {
            self.sources.insert(id, MemSource { spec, data: None });
        }
        for spec in fixture.layers {
            self.layers.push(MemLayer { spec, from_style: true });
        }

        self.current_url = Some(url);
        self.loaded = true;
        self.events.push_back(SurfaceEvent::StyleData);
        self.events.push_back(SurfaceEvent::StyleLoaded);
        self.events.push_back(SurfaceEvent::StyleData);
    }

    /// Fail the pending style load with `message`. The previous style stays.
    pub fn fail_style_load(&mut self, message: &str) {
        if self.pending_url.take().is_some() {
            self.loaded = self.current_url.is_some();
            self.events.push_back(SurfaceEvent::Error { message: message.to_string() });
        }
    }

    /// Queue a `StyleData` event without changing readiness.
    pub fn emit_partial_style_data(&mut self) {
        self.events.push_back(SurfaceEvent::StyleData);
    }

    pub fn emit_idle(&mut self) {
        self.events.push_back(SurfaceEvent::Idle);
    }

    /// Append a base-style layer on top of the stack, as styles that keep
    /// streaming after load do.
    pub fn insert_style_layer(&mut self, spec: LayerSpec) {
        self.layers.push(MemLayer { spec, from_style: true });
        self.events.push_back(SurfaceEvent::StyleData);
    }

    /// Mark the surface as disposed; further style replacement fails.
    pub fn teardown(&mut self) {
        self.torn_down = true;
    }

    // --- Query fixtures ---

    pub fn add_rendered_feature(&mut self, at: ScreenPoint, feature: RenderedFeature) {
        self.rendered.push((at, feature));
    }

    pub fn clear_rendered_features(&mut self) {
        self.rendered.clear();
    }

    pub fn set_cluster_zoom(&mut self, source: &str, cluster_id: u64, zoom: f64) {
        self.cluster_zooms.insert((source.to_string(), cluster_id), zoom);
    }

    // --- Inspection ---

    /// Layer ids bottom to top.
    #[must_use]
    pub fn layer_ids(&self) -> Vec<String> {
        self.layers.iter().map(|l| l.spec.id.clone()).collect()
    }

    /// Ids of layers that came from the base style.
    #[must_use]
    pub fn style_layer_ids(&self) -> Vec<String> {
        self.layers.iter().filter(|l| l.from_style).map(|l| l.spec.id.clone()).collect()
    }

    /// Stack position of a layer (0 = bottom).
    #[must_use]
    pub fn layer_index(&self, id: &str) -> Option<usize> {
        self.layers.iter().position(|l| l.spec.id == id)
    }

    #[must_use]
    pub fn source_ids(&self) -> Vec<String> {
        self.sources.keys().cloned().collect()
    }

    #[must_use]
    pub fn layout(&self, layer: &str, name: &str) -> Option<&Value> {
        self.find(layer)?.spec.layout.get(name)
    }

    #[must_use]
    pub fn paint(&self, layer: &str, name: &str) -> Option<&Value> {
        self.find(layer)?.spec.paint.get(name)
    }

    #[must_use]
    pub fn source_data(&self, id: &str) -> Option<&Value> {
        self.sources.get(id)?.data.as_ref()
    }

    #[must_use]
    pub fn current_style(&self) -> Option<&str> {
        self.current_url.as_deref()
    }

    #[must_use]
    pub fn stats(&self) -> SurfaceStats {
        self.stats
    }

    fn find(&self, id: &str) -> Option<&MemLayer> {
        self.layers.iter().find(|l| l.spec.id == id)
    }

    fn find_mut(&mut self, id: &str) -> Result<&mut MemLayer, SurfaceError> {
        self.layers
            .iter_mut()
            .find(|l| l.spec.id == id)
            .ok_or_else(|| SurfaceError::LayerNotFound(id.to_string()))
    }

    fn is_visible(&self, layer: &MemLayer) -> bool {
        layer.spec.layout.get("visibility").and_then(Value::as_str) != Some("none")
    }

    fn insert_at(&mut self, layer: MemLayer, before: Option<&str>) -> Result<(), SurfaceError> {
        match before {
            Some(anchor) => {
                let idx = self
                    .layer_index(anchor)
                    .ok_or_else(|| SurfaceError::LayerNotFound(anchor.to_string()))?;
                self.layers.insert(idx, layer);
            }
            None => self.layers.push(layer),
        }
        Ok(())
    }
}

impl Surface for MemorySurface {
    fn has_source(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    fn add_source(&mut self, id: &str, spec: &SourceSpec) -> Result<(), SurfaceError> {
        if self.sources.contains_key(id) {
            return Err(SurfaceError::Duplicate(id.to_string()));
        }
        if spec.kind().is_none() {
            return Err(SurfaceError::InvalidSpec { id: id.to_string(), reason: "missing source type".into() });
        }
        let data = spec.0.get("data").cloned();
        self.sources.insert(id.to_string(), MemSource { spec: spec.clone(), data });
        self.stats.sources_added += 1;
        Ok(())
    }

    fn remove_source(&mut self, id: &str) -> Result<(), SurfaceError> {
        if self.layers.iter().any(|l| l.spec.source.as_deref() == Some(id)) {
            return Err(SurfaceError::InvalidSpec { id: id.to_string(), reason: "source still in use".into() });
        }
        self.sources
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| SurfaceError::SourceNotFound(id.to_string()))
    }

    fn set_source_data(&mut self, id: &str, data: Value) -> Result<(), SurfaceError> {
        let source = self
            .sources
            .get_mut(id)
            .ok_or_else(|| SurfaceError::SourceNotFound(id.to_string()))?;
        if source.spec.kind() != Some("geojson") {
            return Err(SurfaceError::InvalidSpec { id: id.to_string(), reason: "not a geojson source".into() });
        }
        source.data = Some(data);
        Ok(())
    }

    fn get_layer(&self, id: &str) -> Option<StyleLayer> {
        self.find(id).map(|l| StyleLayer {
            id: l.spec.id.clone(),
            kind: l.spec.kind,
            source: l.spec.source.clone(),
            metadata: l.spec.metadata.clone(),
        })
    }

    fn add_layer(&mut self, spec: &LayerSpec, before: Option<&str>) -> Result<(), SurfaceError> {
        if self.find(&spec.id).is_some() {
            return Err(SurfaceError::Duplicate(spec.id.clone()));
        }
        match spec.source.as_deref() {
            Some(source) if !self.sources.contains_key(source) => {
                return Err(SurfaceError::SourceNotFound(source.to_string()));
            }
            None if spec.kind != LayerType::Background => {
                return Err(SurfaceError::InvalidSpec { id: spec.id.clone(), reason: "layer has no source".into() });
            }
            _ => {}
        }
        self.insert_at(MemLayer { spec: spec.clone(), from_style: false }, before)?;
        self.stats.layers_added += 1;
        Ok(())
    }

    fn remove_layer(&mut self, id: &str) -> Result<(), SurfaceError> {
        let idx = self
            .layer_index(id)
            .ok_or_else(|| SurfaceError::LayerNotFound(id.to_string()))?;
        self.layers.remove(idx);
        Ok(())
    }

    fn move_layer(&mut self, id: &str, before: Option<&str>) -> Result<(), SurfaceError> {
        if before == Some(id) {
            return Ok(());
        }
        if let Some(anchor) = before {
            if self.layer_index(anchor).is_none() {
                return Err(SurfaceError::LayerNotFound(anchor.to_string()));
            }
        }
        let idx = self
            .layer_index(id)
            .ok_or_else(|| SurfaceError::LayerNotFound(id.to_string()))?;
        let layer = self.layers.remove(idx);
        self.insert_at(layer, before)?;
        self.stats.layers_moved += 1;
        Ok(())
    }

    fn set_layout_property(&mut self, layer: &str, name: &str, value: Value) -> Result<(), SurfaceError> {
        self.find_mut(layer)?.spec.layout.insert(name.to_string(), value);
        Ok(())
    }

    fn set_paint_property(&mut self, layer: &str, name: &str, value: Value) -> Result<(), SurfaceError> {
        self.find_mut(layer)?.spec.paint.insert(name.to_string(), value);
        Ok(())
    }

    fn has_image(&self, id: &str) -> bool {
        self.images.contains_key(id)
    }

    fn add_image(&mut self, id: &str, image: &ImageSpec) -> Result<(), SurfaceError> {
        if self.images.contains_key(id) {
            return Err(SurfaceError::Duplicate(id.to_string()));
        }
        let expected = (image.width as usize) * (image.height as usize) * 4;
        if image.rgba.len() != expected {
            return Err(SurfaceError::InvalidSpec { id: id.to_string(), reason: "pixel buffer size mismatch".into() });
        }
        self.images.insert(id.to_string(), image.clone());
        self.stats.images_added += 1;
        Ok(())
    }

    fn style_layers(&self) -> Vec<StyleLayer> {
        self.layers
            .iter()
            .map(|l| StyleLayer {
                id: l.spec.id.clone(),
                kind: l.spec.kind,
                source: l.spec.source.clone(),
                metadata: l.spec.metadata.clone(),
            })
            .collect()
    }

    fn query_rendered_features(&self, area: QueryBox, layers: Option<&[String]>) -> Vec<RenderedFeature> {
        let mut hits: Vec<(usize, &RenderedFeature)> = self
            .rendered
            .iter()
            .filter(|(at, _)| area.contains(*at))
            .filter(|(_, f)| layers.is_none_or(|allowed| allowed.iter().any(|l| *l == f.layer_id)))
            .filter_map(|(_, f)| {
                let idx = self.layer_index(&f.layer_id)?;
                self.is_visible(&self.layers[idx]).then_some((idx, f))
            })
            .collect();
        hits.sort_by(|a, b| b.0.cmp(&a.0));
        hits.into_iter().map(|(_, f)| f.clone()).collect()
    }

    fn replace_style(&mut self, url: &str) -> Result<(), SurfaceError> {
        if self.torn_down {
            return Err(SurfaceError::TornDown);
        }
        self.pending_url = Some(url.to_string());
        self.loaded = false;
        self.stats.styles_replaced += 1;
        self.events.push_back(SurfaceEvent::StyleLoading);
        Ok(())
    }

    fn is_style_loaded(&self) -> bool {
        self.loaded
    }

    fn request_cluster_expansion_zoom(&mut self, source: &str, cluster_id: u64) -> Result<(), SurfaceError> {
        if !self.sources.contains_key(source) {
            return Err(SurfaceError::SourceNotFound(source.to_string()));
        }
        let zoom = self.cluster_zooms.get(&(source.to_string(), cluster_id)).copied();
        self.events.push_back(SurfaceEvent::ClusterExpansionZoom { source: source.to_string(), cluster_id, zoom });
        Ok(())
    }

    fn poll_events(&mut self) -> Vec<SurfaceEvent> {
        self.events.drain(..).collect()
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod memory_test;
