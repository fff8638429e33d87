//! Map synchronization and interaction core.
//!
//! Keeps a set of thematic overlays, drawings and a search marker alive on
//! top of a swappable base map. The rendering surface is an external
//! collaborator behind the [`surface::Surface`] trait; everything in this
//! crate is in-memory state projected onto it, so any surface state can be
//! rebuilt after a base style replacement wipes it.
//!
//! The host talks to [`session::MapSession`] and carries out the
//! [`session::HostAction`]s it returns.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`surface`] | Surface trait, layer/source descriptors, lifecycle events |
//! | [`memory`] | In-process surface used by tests and the replay binary |
//! | [`geo`] | Geographic and screen coordinates, query boxes |
//! | [`overlay`] | Idempotent overlay creation and the overlay registry |
//! | [`order`] | Deterministic layer stacking relative to the base style |
//! | [`style`] | Base-style switching with epoch-guarded overlay recovery |
//! | [`basemap`] | Basemap catalog and style URL templates |
//! | [`toc`] | Table of contents state, surface projection and prefs |
//! | [`draw`] | Drawing/measuring state machine and its surface layers |
//! | [`popup`] | Click queries, dedup, grouping and cluster zoom |
//! | [`search`] | Search-result marker |
//! | [`wms`] | External WMS/WMTS raster layers as TOC items |
//! | [`session`] | Host-facing facade and async driver |
//! | [`config`] | Environment configuration and the setup document |
//! | [`error`] | Error types and stable error codes |
//! | [`consts`] | Shared ids, prefixes and thresholds |

pub mod basemap;
pub mod config;
pub mod consts;
pub mod draw;
pub mod error;
pub mod geo;
pub mod memory;
pub mod order;
pub mod overlay;
pub mod popup;
pub mod search;
pub mod session;
pub mod style;
pub mod surface;
pub mod toc;
pub mod wms;

#[cfg(test)]
#[path = "helpers_test.rs"]
pub(crate) mod test_helpers;
