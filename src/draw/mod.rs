//! Drawing and measuring.
//!
//! - [`engine`]: the tool state machine and committed feature collection.
//! - [`geometry`]: modes, kinds, committed features and their GeoJSON.
//! - [`measure`]: geodesic length/area and locale-aware labels.
//! - [`layers`]: draw sources, layers and arrow icon on the surface.

pub mod engine;
pub mod geometry;
pub mod layers;
pub mod measure;

pub use engine::{DrawChange, DrawEngine, DrawKey, ModeSwitchPolicy, SketchState};
pub use geometry::{DrawFeature, DrawGeometry, DrawKind, ToolMode, ToolUsage};
pub use measure::NumberLocale;
