//! Shared constants for the map workbench.

// ── Layer families ──────────────────────────────────────────────

/// Id prefixes identifying thematic app layers by default.
pub const DEFAULT_APP_PREFIXES: &[&str] = &["app-", "wms:"];

/// Id prefix shared by every drawing layer.
pub const DRAW_LAYER_PREFIX: &str = "draw-";

/// Id prefix of the search-result marker layer.
pub const SEARCH_LAYER_PREFIX: &str = "search-marker";

/// Base-style label layers app layers are slid beneath, highest priority first.
pub const DEFAULT_LABEL_ANCHORS: &[&str] = &[
    "place_label",
    "place-label",
    "place_city",
    "place-city",
    "poi_label",
    "road_label",
    "water_name",
];

// ── Drawing ─────────────────────────────────────────────────────

/// GeoJSON source holding committed draw features.
pub const DRAW_DATA_SOURCE_ID: &str = "draw-data";

/// GeoJSON source holding the live sketch preview.
pub const DRAW_SKETCH_SOURCE_ID: &str = "draw-sketch";

/// Image id of the arrowhead icon.
pub const ARROW_ICON_ID: &str = "draw-arrow-icon";

/// Edge length of the arrowhead icon in pixels.
pub const ARROW_ICON_SIZE: u32 = 32;

// ── Search ──────────────────────────────────────────────────────

pub const SEARCH_MARKER_SOURCE_ID: &str = "search-marker";
pub const SEARCH_MARKER_LAYER_ID: &str = "search-marker-layer";

/// Zoom the camera flies to for a search result.
pub const SEARCH_RESULT_ZOOM: f64 = 15.0;

// ── Measurement ─────────────────────────────────────────────────

/// Mean earth radius in meters, used for geodesic line length.
pub const EARTH_MEAN_RADIUS_M: f64 = 6_371_008.8;

/// Equatorial earth radius in meters, used for spherical polygon area.
pub const EARTH_EQUATORIAL_RADIUS_M: f64 = 6_378_137.0;

/// Lines at or above this length are shown in kilometers.
pub const KM_THRESHOLD_M: f64 = 1_000.0;

/// Areas at or above this size are shown in square kilometers.
pub const KM2_THRESHOLD_M2: f64 = 1_000_000.0;

// ── Basemaps ────────────────────────────────────────────────────

pub const DEFAULT_STYLE_URL_TEMPLATE: &str = "https://api.maptiler.com/maps/{style}/style.json?key={key}";
pub const DEFAULT_STYLE_KEY_ENV: &str = "MAPTILER_KEY";
