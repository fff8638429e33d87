//! Coordinate types shared by the engines.
//!
//! Geographic positions (`LngLat`) and screen positions (`ScreenPoint`) are
//! kept as distinct types so a pixel can never be committed as a vertex.

use serde::{Deserialize, Serialize};

/// A geographic position in degrees (WGS84).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    #[must_use]
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    /// GeoJSON position array `[lng, lat]`.
    #[must_use]
    pub fn to_position(self) -> serde_json::Value {
        serde_json::json!([self.lng, self.lat])
    }

    /// Parse a GeoJSON position array. Extra ordinates (altitude) are ignored.
    #[must_use]
    pub fn from_position(value: &serde_json::Value) -> Option<Self> {
        let arr = value.as_array()?;
        let lng = arr.first()?.as_f64()?;
        let lat = arr.get(1)?.as_f64()?;
        Some(Self { lng, lat })
    }
}

/// A position on the rendered canvas in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned pixel box used for rendered-feature queries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryBox {
    pub min: ScreenPoint,
    pub max: ScreenPoint,
}

impl QueryBox {
    /// Box of half-width `tolerance_px` centered on `point`. A tolerance of
    /// zero yields the degenerate box covering exactly that pixel.
    #[must_use]
    pub fn around(point: ScreenPoint, tolerance_px: f64) -> Self {
        let t = tolerance_px.max(0.0);
        Self {
            min: ScreenPoint::new(point.x - t, point.y - t),
            max: ScreenPoint::new(point.x + t, point.y + t),
        }
    }

    #[must_use]
    pub fn contains(&self, p: ScreenPoint) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

#[cfg(test)]
#[path = "geo_test.rs"]
mod geo_test;
