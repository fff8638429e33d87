//! Drawing and measuring state machine.
//!
//! DESIGN
//! ======
//! States are the [`ToolMode`]s. Input arrives as discrete calls (click,
//! pointer move, double click, key, explicit commands); each returns a
//! [`DrawChange`] telling the caller which surface source needs a re-push.
//! The engine never touches the surface itself, so it is trivially testable
//! and survives style switches: its in-memory state is the source of truth.
//!
//! - select: input passes through to the map.
//! - draw-point: a click commits immediately.
//! - line/arrow/polygon tools: clicks append vertices, the pointer drives a
//!   hover vertex for the live preview, double click or Enter commits,
//!   Escape cancels.
//!
//! A commit with too few vertices is a no-op and leaves the sketch open.
//! Switching tools with a sketch open follows [`ModeSwitchPolicy`].

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::geo::LngLat;

use super::geometry::{DrawFeature, DrawGeometry, DrawKind, ToolMode, ToolUsage, feature_collection, positions};
use super::measure::NumberLocale;

/// What happens to an open sketch when the tool changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeSwitchPolicy {
    /// Drop the sketch.
    #[default]
    Discard,
    /// Commit it with the old tool (no-op if too short), then switch.
    Commit,
}

impl FromStr for ModeSwitchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "discard" => Ok(Self::Discard),
            "commit" => Ok(Self::Commit),
            other => Err(format!("unknown mode switch policy '{other}' (expected 'discard' or 'commit')")),
        }
    }
}

/// Keys the engine reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrawKey {
    Enter,
    Escape,
}

/// Which projections went stale, plus the id of a feature committed by this call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrawChange {
    pub features: bool,
    pub sketch: bool,
    pub committed: Option<Uuid>,
}

impl DrawChange {
    const SKETCH: Self = Self { features: false, sketch: true, committed: None };

    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.features && !self.sketch
    }

    fn merge(self, other: Self) -> Self {
        Self {
            features: self.features || other.features,
            sketch: self.sketch || other.sketch,
            committed: other.committed.or(self.committed),
        }
    }
}

/// The transient in-progress geometry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SketchState {
    pub mode: ToolMode,
    pub coords: Vec<LngLat>,
    pub hover: Option<LngLat>,
}

impl SketchState {
    fn clear(&mut self) {
        self.coords.clear();
        self.hover = None;
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.coords.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct DrawEngine {
    sketch: SketchState,
    features: Vec<DrawFeature>,
    policy: ModeSwitchPolicy,
    locale: NumberLocale,
}

impl DrawEngine {
    #[must_use]
    pub fn new(policy: ModeSwitchPolicy, locale: NumberLocale) -> Self {
        Self { policy, locale, ..Self::default() }
    }

    #[must_use]
    pub fn mode(&self) -> ToolMode {
        self.sketch.mode
    }

    #[must_use]
    pub fn sketch(&self) -> &SketchState {
        &self.sketch
    }

    #[must_use]
    pub fn policy(&self) -> ModeSwitchPolicy {
        self.policy
    }

    // =========================================================================
    // INPUT
    // =========================================================================

    /// Change tool. Re-selecting the active tool is a no-op.
    pub fn set_mode(&mut self, mode: ToolMode) -> DrawChange {
        if mode == self.sketch.mode {
            return DrawChange::default();
        }
        let mut change = DrawChange::SKETCH;
        if self.sketch.is_open() && self.policy == ModeSwitchPolicy::Commit {
            change = change.merge(self.commit());
        }
        tracing::debug!(from = ?self.sketch.mode, to = ?mode, "draw mode changed");
        self.sketch.clear();
        self.sketch.mode = mode;
        change
    }

    /// Pointer click at `at`. Select mode ignores it.
    pub fn click(&mut self, at: LngLat) -> DrawChange {
        match self.sketch.mode {
            ToolMode::Select => DrawChange::default(),
            ToolMode::DrawPoint => {
                self.sketch.coords = vec![at];
                self.commit()
            }
            _ => {
                self.sketch.coords.push(at);
                DrawChange::SKETCH
            }
        }
    }

    /// Pointer move. Only tracked while a multi-vertex sketch is open.
    pub fn pointer_move(&mut self, at: LngLat) -> DrawChange {
        if !self.sketch.mode.accumulates() || !self.sketch.is_open() {
            return DrawChange::default();
        }
        self.sketch.hover = Some(at);
        DrawChange::SKETCH
    }

    pub fn double_click(&mut self) -> DrawChange {
        if self.sketch.mode == ToolMode::Select {
            return DrawChange::default();
        }
        self.finish()
    }

    pub fn key(&mut self, key: DrawKey) -> DrawChange {
        match key {
            DrawKey::Enter => self.finish(),
            DrawKey::Escape => self.cancel(),
        }
    }

    // =========================================================================
    // COMMANDS
    // =========================================================================

    /// Drop the last sketch vertex. Committed features are untouched.
    pub fn undo_last(&mut self) -> DrawChange {
        if self.sketch.coords.pop().is_none() {
            return DrawChange::default();
        }
        if self.sketch.coords.is_empty() {
            self.sketch.hover = None;
        }
        DrawChange::SKETCH
    }

    /// Commit the open sketch with the active tool's kind.
    pub fn finish(&mut self) -> DrawChange {
        self.commit()
    }

    /// Discard the open sketch.
    pub fn cancel(&mut self) -> DrawChange {
        if !self.sketch.is_open() && self.sketch.hover.is_none() {
            return DrawChange::default();
        }
        self.sketch.clear();
        DrawChange::SKETCH
    }

    /// Discard every feature and the sketch, back to select.
    pub fn clear_all(&mut self) -> DrawChange {
        self.features.clear();
        self.sketch.clear();
        self.sketch.mode = ToolMode::Select;
        DrawChange { features: true, sketch: true, committed: None }
    }

    /// Remove one committed feature.
    pub fn delete_feature(&mut self, id: Uuid) -> DrawChange {
        let before = self.features.len();
        self.features.retain(|f| f.id != id);
        DrawChange { features: self.features.len() != before, ..DrawChange::default() }
    }

    fn commit(&mut self) -> DrawChange {
        let (Some(kind), Some(usage)) = (self.sketch.mode.kind(), self.sketch.mode.usage()) else {
            return DrawChange::default();
        };
        let Some(geometry) = DrawGeometry::from_coords(kind, &self.sketch.coords) else {
            tracing::debug!(?kind, vertices = self.sketch.coords.len(), "commit ignored; not enough vertices");
            return DrawChange::default();
        };
        let label = match usage {
            ToolUsage::Measure => geometry.measurement(self.locale),
            ToolUsage::Draw => None,
        };
        let feature = DrawFeature::new(kind, usage, geometry, label);
        let id = feature.id;
        self.features.push(feature);
        self.sketch.clear();
        DrawChange { features: true, sketch: true, committed: Some(id) }
    }

    // =========================================================================
    // LISTINGS
    // =========================================================================

    /// Committed features, oldest first.
    #[must_use]
    pub fn features(&self) -> &[DrawFeature] {
        &self.features
    }

    #[must_use]
    pub fn has_features(&self) -> bool {
        !self.features.is_empty()
    }

    pub fn features_newest_first(&self) -> impl Iterator<Item = &DrawFeature> {
        self.features.iter().rev()
    }

    pub fn measurements(&self) -> impl Iterator<Item = &DrawFeature> {
        self.features_newest_first().filter(|f| f.usage == ToolUsage::Measure)
    }

    pub fn sketches(&self) -> impl Iterator<Item = &DrawFeature> {
        self.features_newest_first().filter(|f| f.usage == ToolUsage::Draw)
    }

    /// Vertices plus the hover vertex, if any.
    fn live_coords(&self) -> Vec<LngLat> {
        let mut c = self.sketch.coords.clone();
        c.extend(self.sketch.hover);
        c
    }

    /// The feature the sketch would become right now, hover vertex included.
    #[must_use]
    pub fn current_sketch(&self) -> Option<Value> {
        let mode = self.sketch.mode;
        let combined = self.live_coords();
        if mode == ToolMode::Select || combined.is_empty() {
            return None;
        }
        let kind = if mode.is_polygon() && combined.len() >= 3 {
            DrawKind::Polygon
        } else if combined.len() >= 2 {
            if mode == ToolMode::DrawArrow { DrawKind::Arrow } else { DrawKind::Line }
        } else if mode == ToolMode::DrawPoint {
            DrawKind::Point
        } else {
            return None;
        };
        let geometry = DrawGeometry::from_coords(kind, &combined)?;
        Some(json!({ "type": "Feature", "properties": { "kind": kind }, "geometry": geometry.to_geojson() }))
    }

    /// Formatted length or area of the live sketch in a measure tool.
    #[must_use]
    pub fn current_measurement(&self) -> Option<String> {
        if self.sketch.mode.usage() != Some(ToolUsage::Measure) {
            return None;
        }
        let combined = self.live_coords();
        let kind = if self.sketch.mode.is_polygon() && combined.len() >= 3 { DrawKind::Polygon } else { DrawKind::Line };
        DrawGeometry::from_coords(kind, &combined)?.measurement(self.locale)
    }

    // =========================================================================
    // PROJECTIONS
    // =========================================================================

    /// Committed features as a feature collection.
    #[must_use]
    pub fn data_geojson(&self) -> Value {
        feature_collection(self.features.iter().map(DrawFeature::to_geojson).collect())
    }

    /// Live preview: a line through the vertices and the hover vertex (closed
    /// back to the first vertex for polygons), plus a fill once it spans an area.
    #[must_use]
    pub fn sketch_geojson(&self) -> Value {
        let mode = self.sketch.mode;
        let coords = &self.sketch.coords;
        if !mode.accumulates() || coords.is_empty() {
            return feature_collection(Vec::new());
        }
        let mut line = self.live_coords();
        if line.len() < 2 {
            return feature_collection(Vec::new());
        }
        let closes = mode.is_polygon() && self.sketch.hover.is_some();
        if closes {
            line.push(coords[0]);
        }
        let line_kind = if mode == ToolMode::DrawArrow { "arrow" } else { "sketch-line" };
        let mut features = vec![json!({
            "type": "Feature",
            "properties": { "kind": line_kind, "usage": mode.usage() },
            "geometry": { "type": "LineString", "coordinates": positions(&line) },
        })];
        if closes && coords.len() >= 2 {
            features.push(json!({
                "type": "Feature",
                "properties": { "kind": "sketch-polygon" },
                "geometry": { "type": "Polygon", "coordinates": [positions(&line)] },
            }));
        }
        feature_collection(features)
    }
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;
