//! Draw modes, committed features and their GeoJSON form.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::geo::LngLat;

use super::measure::{self, NumberLocale};

// =============================================================================
// MODES
// =============================================================================

/// Active tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolMode {
    #[default]
    Select,
    MeasureLine,
    MeasurePolygon,
    DrawPoint,
    DrawLine,
    DrawArrow,
    DrawPolygon,
}

impl ToolMode {
    /// Geometry kind this tool commits, `None` for select.
    #[must_use]
    pub fn kind(self) -> Option<DrawKind> {
        match self {
            Self::Select => None,
            Self::DrawPoint => Some(DrawKind::Point),
            Self::MeasureLine | Self::DrawLine => Some(DrawKind::Line),
            Self::DrawArrow => Some(DrawKind::Arrow),
            Self::MeasurePolygon | Self::DrawPolygon => Some(DrawKind::Polygon),
        }
    }

    #[must_use]
    pub fn usage(self) -> Option<ToolUsage> {
        match self {
            Self::Select => None,
            Self::MeasureLine | Self::MeasurePolygon => Some(ToolUsage::Measure),
            _ => Some(ToolUsage::Draw),
        }
    }

    /// Whether clicks accumulate a multi-vertex sketch.
    #[must_use]
    pub fn accumulates(self) -> bool {
        !matches!(self, Self::Select | Self::DrawPoint)
    }

    #[must_use]
    pub fn is_polygon(self) -> bool {
        self.kind() == Some(DrawKind::Polygon)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrawKind {
    Point,
    Line,
    Polygon,
    Arrow,
}

impl DrawKind {
    /// Vertices required to commit.
    #[must_use]
    pub fn min_coords(self) -> usize {
        match self {
            Self::Point => 1,
            Self::Line | Self::Arrow => 2,
            Self::Polygon => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolUsage {
    Measure,
    Draw,
}

// =============================================================================
// GEOMETRY
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum DrawGeometry {
    Point(LngLat),
    LineString(Vec<LngLat>),
    /// Outer ring, closed (first vertex repeated last).
    Polygon(Vec<LngLat>),
}

impl DrawGeometry {
    /// Build the geometry for `kind` from sketch vertices. `None` when there
    /// are too few vertices.
    #[must_use]
    pub fn from_coords(kind: DrawKind, coords: &[LngLat]) -> Option<Self> {
        if coords.len() < kind.min_coords() {
            return None;
        }
        Some(match kind {
            DrawKind::Point => Self::Point(coords[0]),
            DrawKind::Line | DrawKind::Arrow => Self::LineString(coords.to_vec()),
            DrawKind::Polygon => Self::Polygon(close_ring(coords)),
        })
    }

    #[must_use]
    pub fn to_geojson(&self) -> Value {
        match self {
            Self::Point(p) => json!({ "type": "Point", "coordinates": p.to_position() }),
            Self::LineString(c) => json!({ "type": "LineString", "coordinates": positions(c) }),
            Self::Polygon(r) => json!({ "type": "Polygon", "coordinates": [positions(r)] }),
        }
    }

    /// Formatted length or area; points have none.
    #[must_use]
    pub fn measurement(&self, locale: NumberLocale) -> Option<String> {
        match self {
            Self::Point(_) => None,
            Self::LineString(c) => Some(measure::format_length(measure::line_length_m(c), locale)),
            Self::Polygon(r) => Some(measure::format_area(measure::ring_area_m2(r), locale)),
        }
    }
}

/// Repeat the first vertex at the end unless it already is.
#[must_use]
pub fn close_ring(coords: &[LngLat]) -> Vec<LngLat> {
    let mut ring = coords.to_vec();
    if let (Some(&first), Some(&last)) = (coords.first(), coords.last()) {
        if coords.len() < 2 || first != last {
            ring.push(first);
        }
    }
    ring
}

pub(crate) fn positions(coords: &[LngLat]) -> Vec<Value> {
    coords.iter().map(|c| c.to_position()).collect()
}

// =============================================================================
// FEATURES
// =============================================================================

/// A committed drawing or measurement. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawFeature {
    pub id: Uuid,
    pub kind: DrawKind,
    pub usage: ToolUsage,
    pub geometry: DrawGeometry,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
    /// Text shown next to the feature; measurements carry their formatted value.
    pub label: Option<String>,
}

impl DrawFeature {
    #[must_use]
    pub fn new(kind: DrawKind, usage: ToolUsage, geometry: DrawGeometry, label: Option<String>) -> Self {
        Self { id: Uuid::new_v4(), kind, usage, geometry, created_at: now_ms(), label }
    }

    #[must_use]
    pub fn to_geojson(&self) -> Value {
        let mut props = Map::new();
        props.insert("id".into(), Value::String(self.id.to_string()));
        props.insert("kind".into(), json!(self.kind));
        props.insert("usage".into(), json!(self.usage));
        props.insert("timestamp".into(), json!(self.created_at));
        if let Some(label) = &self.label {
            props.insert("label".into(), Value::String(label.clone()));
        }
        json!({ "type": "Feature", "properties": props, "geometry": self.geometry.to_geojson() })
    }
}

#[must_use]
pub fn feature_collection(features: Vec<Value>) -> Value {
    json!({ "type": "FeatureCollection", "features": features })
}

fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

#[cfg(test)]
#[path = "geometry_test.rs"]
mod geometry_test;
