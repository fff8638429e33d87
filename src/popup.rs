//! Popup query engine: what did the user click?
//!
//! DESIGN
//! ======
//! A click queries the surface in a pixel box around the pointer, drops
//! hits without geometry, deduplicates by `source::sourceLayer::stableId`,
//! filters to the interactive sources, and groups what remains by layer in
//! discovery order. The popup state is rebuilt wholesale on each click.
//!
//! Cluster hits zoom instead of opening a popup. The expansion zoom is
//! requested from the surface and answered later by an event; the answer is
//! only used while no newer click or dismissal happened in between.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::geo::{LngLat, QueryBox, ScreenPoint};
use crate::surface::{RenderedFeature, Surface};

/// Property names tried, in order, for a stable feature id.
const STABLE_ID_KEYS: &[&str] = &["id", "fid", "objectid", "OBJECTID", "uuid", "gid"];

/// Property keys that take part in the fallback fingerprint.
const FINGERPRINT_KEYS: usize = 3;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PopupConfig {
    /// Half-width of the query box; 0 queries exactly the clicked pixel.
    pub tolerance_px: f64,
    /// Restrict the query to these layers.
    pub interactive_layer_ids: Option<Vec<String>>,
    /// Keep only hits from these sources (drops basemap features).
    pub interactive_source_ids: Option<Vec<String>>,
}

/// Hits of one layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopupGroup {
    pub layer_id: String,
    pub features: Vec<RenderedFeature>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PopupState {
    #[default]
    Closed,
    Open { anchor: LngLat, groups: Vec<PopupGroup> },
}

impl PopupState {
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }
}

/// Result of a click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    Opened { groups: usize },
    Closed,
    /// A cluster was hit; waiting for its expansion zoom.
    ClusterPending,
}

/// Where the camera should go after a cluster lookup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CameraTarget {
    pub center: LngLat,
    pub zoom: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct PendingCluster {
    source: String,
    cluster_id: u64,
    center: LngLat,
}

#[derive(Debug, Clone, Default)]
pub struct PopupEngine {
    config: PopupConfig,
    state: PopupState,
    pending: Option<PendingCluster>,
}

impl PopupEngine {
    #[must_use]
    pub fn new(config: PopupConfig) -> Self {
        Self { config, ..Self::default() }
    }

    #[must_use]
    pub fn state(&self) -> &PopupState {
        &self.state
    }

    #[must_use]
    pub fn config(&self) -> &PopupConfig {
        &self.config
    }

    #[must_use]
    pub fn has_pending_cluster(&self) -> bool {
        self.pending.is_some()
    }

    /// Resolve a click at screen `point` / geographic `at`.
    pub fn click<S: Surface + ?Sized>(&mut self, surface: &mut S, point: ScreenPoint, at: LngLat) -> ClickOutcome {
        self.pending = None;

        let area = QueryBox::around(point, self.config.tolerance_px);
        let raw = surface.query_rendered_features(area, self.config.interactive_layer_ids.as_deref());
        let hits = self.select_hits(raw);

        if let Some(cluster) = hits.iter().find(|f| f.is_cluster()) {
            if let Some(cluster_id) = cluster.cluster_id() {
                let center = cluster_center(cluster).unwrap_or(at);
                match surface.request_cluster_expansion_zoom(&cluster.source, cluster_id) {
                    Ok(()) => {
                        self.pending = Some(PendingCluster { source: cluster.source.clone(), cluster_id, center });
                        self.state = PopupState::Closed;
                        return ClickOutcome::ClusterPending;
                    }
                    Err(e) => tracing::warn!(source = %cluster.source, cluster_id, error = %e, "cluster lookup failed"),
                }
            }
        }

        if hits.is_empty() {
            self.state = PopupState::Closed;
            return ClickOutcome::Closed;
        }
        let groups = group_by_layer(hits);
        let n = groups.len();
        self.state = PopupState::Open { anchor: at, groups };
        ClickOutcome::Opened { groups: n }
    }

    fn select_hits(&self, raw: Vec<RenderedFeature>) -> Vec<RenderedFeature> {
        let mut hits = dedupe(raw.into_iter().filter(|f| f.geometry.is_some()).collect());
        if let Some(sources) = &self.config.interactive_source_ids {
            hits.retain(|f| sources.contains(&f.source));
        }
        hits
    }

    /// Answer to a cluster expansion request. Returns the camera move only if
    /// it matches the outstanding request of the latest click.
    pub fn cluster_zoom_resolved(&mut self, source: &str, cluster_id: u64, zoom: Option<f64>) -> Option<CameraTarget> {
        let Some(pending) = self.pending.take_if(|p| p.source == source && p.cluster_id == cluster_id) else {
            tracing::debug!(%source, cluster_id, "stale cluster zoom discarded");
            return None;
        };
        let Some(zoom) = zoom.filter(|z| z.is_finite()) else {
            tracing::warn!(%source, cluster_id, "cluster expansion zoom unavailable");
            return None;
        };
        Some(CameraTarget { center: pending.center, zoom })
    }

    /// Explicit dismissal.
    pub fn close(&mut self) {
        self.state = PopupState::Closed;
        self.pending = None;
    }
}

fn cluster_center(f: &RenderedFeature) -> Option<LngLat> {
    let geom = f.geometry.as_ref()?;
    if geom.get("type")?.as_str()? != "Point" {
        return None;
    }
    LngLat::from_position(geom.get("coordinates")?)
}

// =============================================================================
// DEDUP / GROUPING
// =============================================================================

fn id_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64().is_some_and(f64::is_finite) => Some(n.to_string()),
        _ => None,
    }
}

fn stable_id_from_props(props: &Map<String, Value>) -> Option<String> {
    STABLE_ID_KEYS.iter().find_map(|k| props.get(*k).and_then(id_string))
}

/// Explicit id, then a well-known id property, then a geometry/property fingerprint.
#[must_use]
pub fn stable_id(f: &RenderedFeature) -> String {
    if let Some(id) = f.id.as_ref().and_then(id_string) {
        return id;
    }
    if let Some(id) = stable_id_from_props(&f.properties) {
        return id;
    }
    let mut keys: Vec<&str> = f.properties.keys().take(FINGERPRINT_KEYS).map(String::as_str).collect();
    keys.sort_unstable();
    format!("{}:{}", f.geometry_type().unwrap_or("geom"), keys.join(","))
}

/// Composite dedup key `source::sourceLayer::stableId`.
#[must_use]
pub fn feature_key(f: &RenderedFeature) -> String {
    let source = if f.source.is_empty() { "unknown-source" } else { &f.source };
    let source_layer = f.source_layer.as_deref().filter(|s| !s.is_empty()).unwrap_or("unknown-sourcelayer");
    format!("{source}::{source_layer}::{}", stable_id(f))
}

/// Keep the first occurrence of each key.
#[must_use]
pub fn dedupe(features: Vec<RenderedFeature>) -> Vec<RenderedFeature> {
    let mut seen = std::collections::HashSet::new();
    features.into_iter().filter(|f| seen.insert(feature_key(f))).collect()
}

/// Group by layer id, groups and members in discovery order.
#[must_use]
pub fn group_by_layer(features: Vec<RenderedFeature>) -> Vec<PopupGroup> {
    let mut groups: Vec<PopupGroup> = Vec::new();
    for f in features {
        match groups.iter_mut().find(|g| g.layer_id == f.layer_id) {
            Some(g) => g.features.push(f),
            None => groups.push(PopupGroup { layer_id: f.layer_id.clone(), features: vec![f] }),
        }
    }
    groups
}

#[cfg(test)]
#[path = "popup_test.rs"]
mod popup_test;
