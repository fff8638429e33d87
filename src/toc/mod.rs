//! Table of contents: the user's layer groups and their projection onto the surface.
//!
//! - [`store`] owns the state (items, order, visibility, labels, opacity).
//! - [`sync`] turns that state into surface mutations and applies them.
//! - [`prefs`] mirrors the state to disk, best effort.

pub mod prefs;
pub mod store;
pub mod sync;

pub use prefs::TocPrefs;
pub use store::{LayerGroup, TocItemConfig, TocLegendItem, TocStore};
pub use sync::{SurfaceMutation, reconcile};
