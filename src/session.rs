//! Session: the host-facing facade over one map surface.
//!
//! DESIGN
//! ======
//! `MapSession` owns the surface and every engine, and is the only thing the
//! host talks to. Each call mutates in-memory state first, projects it onto
//! the surface second, and returns the [`HostAction`]s the host has to carry
//! out (camera moves, cursor, popup contents, error banner, prefs).
//!
//! Surface lifecycle events are fed back through [`MapSession::handle_event`]
//! (or drained with [`MapSession::pump`]). When the style coordinator reports
//! that overlays are back after a style switch, the session re-pushes the
//! drawing, the search marker and the TOC projection from memory.
//!
//! LIFECYCLE
//! =========
//! `new` → `mount` (first basemap switch) → calls/events → `teardown`.
//! After teardown every event is ignored, no call writes to the surface, and
//! the session cannot be mounted again.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::basemap::{BasemapCatalog, StyleUrlTemplate};
use crate::config::{MapSetup, WorkbenchConfig};
use crate::draw::{self, DrawChange, DrawEngine, DrawKey, ToolMode};
use crate::error::{ConfigError, ErrorCode, SessionError};
use crate::geo::{LngLat, ScreenPoint};
use crate::order::LayerFamilies;
use crate::overlay::{self, OverlayDefinition, OverlayRegistry};
use crate::popup::{CameraTarget, ClickOutcome, PopupConfig, PopupEngine, PopupState};
use crate::search::{SearchMarker, SearchResult};
use crate::style::{CoordinatorSignal, StyleCoordinator, SwitchPhase};
use crate::surface::{Surface, SurfaceEvent};
use crate::toc::{self, TocItemConfig, TocPrefs, TocStore};
use crate::wms::WmsLayerConfig;

const DRAW_CURSOR: &str = "crosshair";

// =============================================================================
// HOST ACTIONS
// =============================================================================

/// Something the host has to do in response to a session call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum HostAction {
    /// Show a dismissible error; the map stays interactive.
    StyleError { message: String },
    StyleErrorDismissed,
    BasemapChanged { id: String },
    FlyTo { center: LngLat, zoom: f64 },
    /// `""` restores the default cursor.
    SetCursor { cursor: String },
    SetDoubleClickZoom { enabled: bool },
    PopupChanged { popup: PopupState },
    FeatureCommitted { id: Uuid },
    /// TOC or basemap state changed; persist if desired.
    PrefsChanged { prefs: TocPrefs },
    /// A call was refused.
    Rejected { code: String, message: String },
}

impl From<CameraTarget> for HostAction {
    fn from(t: CameraTarget) -> Self {
        Self::FlyTo { center: t.center, zoom: t.zoom }
    }
}

// =============================================================================
// SESSION
// =============================================================================

pub struct MapSession<S: Surface> {
    surface: S,
    families: LayerFamilies,
    registry: OverlayRegistry,
    coordinator: StyleCoordinator,
    catalog: BasemapCatalog,
    style_urls: StyleUrlTemplate,
    basemap_id: Option<String>,
    toc: TocStore,
    draw: DrawEngine,
    popup: PopupEngine,
    search: SearchMarker,
    error: Option<String>,
    mounted: bool,
    torn_down: bool,
}

impl<S: Surface> MapSession<S> {
    /// Wire a session from configuration and a parsed setup document.
    /// Nothing touches the surface until [`Self::mount`].
    pub fn new(surface: S, config: &WorkbenchConfig, setup: MapSetup) -> Self {
        let mut families = LayerFamilies::default();
        if let Some(anchors) = setup.label_anchor_ids {
            families.label_anchor_ids = anchors;
        }
        if let Some(prefixes) = setup.app_prefixes {
            families.app_prefixes = prefixes;
        }

        let mut registry = OverlayRegistry::new();
        for (name, def) in setup.overlays {
            registry.register(name, def);
        }

        let mut toc = TocStore::new();
        toc.init_from_items(&setup.toc_items);

        let popup = PopupEngine::new(PopupConfig {
            tolerance_px: config.popup_tolerance_px,
            interactive_layer_ids: setup.interactive_layer_ids,
            interactive_source_ids: setup.interactive_source_ids,
        });

        let mut session = Self {
            surface,
            families,
            registry,
            coordinator: StyleCoordinator::new(),
            catalog: BasemapCatalog::new(setup.basemaps),
            style_urls: config.style_urls.clone(),
            basemap_id: setup.initial_basemap,
            toc,
            draw: DrawEngine::new(config.mode_switch, config.number_locale),
            popup,
            search: SearchMarker::new(),
            error: None,
            mounted: false,
            torn_down: false,
        };
        for wms in setup.wms_layers {
            if let Err(e) = session.add_wms_layer(&wms) {
                tracing::warn!(id = %wms.id, error = %e, "wms layer from setup skipped");
            }
        }
        session
    }

    /// Load the setup document and prefs named by `config`, then build the session.
    ///
    /// # Errors
    ///
    /// Returns the setup loading error; prefs problems only log.
    pub async fn load(surface: S, config: &WorkbenchConfig) -> Result<Self, ConfigError> {
        let setup = match &config.setup {
            Some(location) => MapSetup::load(location).await?,
            None => MapSetup::default(),
        };
        let mut session = Self::new(surface, config, setup);
        if let Some(path) = &config.prefs_path {
            let prefs = toc::prefs::load_or_default(path).await;
            session.restore_prefs(&prefs);
        }
        Ok(session)
    }

    // --- Accessors ---

    #[must_use]
    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    #[must_use]
    pub fn toc(&self) -> &TocStore {
        &self.toc
    }

    #[must_use]
    pub fn draw(&self) -> &DrawEngine {
        &self.draw
    }

    #[must_use]
    pub fn popup(&self) -> &PopupState {
        self.popup.state()
    }

    #[must_use]
    pub fn search(&self) -> &SearchMarker {
        &self.search
    }

    #[must_use]
    pub fn catalog(&self) -> &BasemapCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn basemap_id(&self) -> Option<&str> {
        self.basemap_id.as_deref()
    }

    #[must_use]
    pub fn style_phase(&self) -> SwitchPhase {
        self.coordinator.phase()
    }

    /// Message of the visible style error, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    // --- Lifecycle ---

    /// Start the first basemap load: the remembered basemap, else the first catalog entry.
    ///
    /// # Errors
    ///
    /// See [`Self::set_basemap`].
    pub fn mount(&mut self) -> Result<Vec<HostAction>, SessionError> {
        if self.mounted || self.torn_down {
            return Ok(Vec::new());
        }
        self.mounted = true;
        let initial = self.basemap_id.take().unwrap_or_else(|| self.catalog.first_id().to_string());
        let mut actions = self.set_basemap(&initial)?;
        actions.extend(self.mode_hints());
        Ok(actions)
    }

    /// Stop reacting to the surface. Pending switches and cluster lookups are dropped.
    pub fn teardown(&mut self) {
        self.mounted = false;
        self.torn_down = true;
        self.coordinator.cancel();
        self.popup.close();
        tracing::info!("map session torn down");
    }

    pub fn dismiss_error(&mut self) -> Vec<HostAction> {
        match self.error.take() {
            Some(_) => vec![HostAction::StyleErrorDismissed],
            None => Vec::new(),
        }
    }

    // --- Prefs ---

    #[must_use]
    pub fn prefs(&self) -> TocPrefs {
        TocPrefs::capture(&self.toc, self.basemap_id.as_deref())
    }

    /// Apply saved prefs over the item defaults. Returns how many values were taken.
    pub fn restore_prefs(&mut self, prefs: &TocPrefs) -> usize {
        let restored = prefs.restore_into(&mut self.toc);
        if let Some(id) = prefs.basemap_id.as_deref().filter(|id| !self.mounted && self.catalog.contains(id)) {
            self.basemap_id = Some(id.to_string());
        }
        restored
    }

    fn prefs_changed(&self) -> HostAction {
        HostAction::PrefsChanged { prefs: self.prefs() }
    }

    // --- Basemap ---

    /// Switch to basemap `id`; unknown ids fall back to the first catalog entry.
    /// Re-selecting the current basemap only retries when the last load failed.
    ///
    /// # Errors
    ///
    /// Returns `NotMounted` before [`Self::mount`], `Config` when the style URL
    /// cannot be built, `Surface` when the surface rejects the replace call.
    pub fn set_basemap(&mut self, id: &str) -> Result<Vec<HostAction>, SessionError> {
        if !self.mounted {
            return Err(SessionError::NotMounted);
        }
        if !self.catalog.contains(id) {
            tracing::warn!(basemap = %id, fallback = %self.catalog.first_id(), "unknown basemap");
        }
        let def = self.catalog.resolve(id).clone();
        if self.basemap_id.as_deref() == Some(def.id.as_str()) && self.coordinator.phase() != SwitchPhase::Failed {
            return Ok(Vec::new());
        }

        let url = self.style_urls.expand(&def.style_id)?;
        if self.coordinator.switch_style(&mut self.surface, &url)?.is_none() {
            return Ok(Vec::new());
        }
        tracing::info!(basemap = %def.id, "basemap selected");
        self.basemap_id = Some(def.id.clone());
        Ok(vec![HostAction::BasemapChanged { id: def.id }, self.prefs_changed()])
    }

    pub fn set_basemap_opacity(&mut self, opacity: f64) {
        if self.mounted {
            self.coordinator.set_basemap_opacity(&mut self.surface, &self.registry, &self.families, opacity);
        }
    }

    // --- TOC ---

    fn reconcile_toc(&mut self) {
        if self.mounted {
            toc::reconcile(&mut self.surface, &self.families, &self.toc.groups());
        }
    }

    fn toc_changed(&mut self, changed: bool) -> Vec<HostAction> {
        if !changed {
            return Vec::new();
        }
        self.reconcile_toc();
        vec![self.prefs_changed()]
    }

    pub fn set_visible(&mut self, id: &str, visible: bool) -> Vec<HostAction> {
        let changed = self.toc.set_visible(id, visible);
        self.toc_changed(changed)
    }

    pub fn set_labels_visible(&mut self, id: &str, visible: bool) -> Vec<HostAction> {
        let changed = self.toc.set_labels_visible(id, visible);
        self.toc_changed(changed)
    }

    pub fn set_opacity(&mut self, id: &str, opacity: f64) -> Vec<HostAction> {
        let changed = self.toc.set_opacity(id, opacity);
        self.toc_changed(changed)
    }

    pub fn set_order(&mut self, order: &[String]) -> Vec<HostAction> {
        self.toc.set_order(order);
        self.toc_changed(true)
    }

    pub fn move_item(&mut self, from: usize, to: usize) -> Vec<HostAction> {
        let changed = self.toc.move_item(from, to);
        self.toc_changed(changed)
    }

    pub fn move_up(&mut self, id: &str) -> Vec<HostAction> {
        let changed = self.toc.move_up(id);
        self.toc_changed(changed)
    }

    pub fn move_down(&mut self, id: &str) -> Vec<HostAction> {
        let changed = self.toc.move_down(id);
        self.toc_changed(changed)
    }

    /// Add a runtime TOC item, optionally with the overlay that provides its layers.
    /// The overlay is recreated after every style switch like the static ones.
    pub fn register_dynamic_item(&mut self, item: TocItemConfig, def: Option<OverlayDefinition>) -> Vec<HostAction> {
        if let Some(def) = def {
            if self.mounted && self.surface.is_style_loaded() {
                let report = overlay::ensure(&mut self.surface, &def);
                if !report.failed.is_empty() {
                    tracing::warn!(item = %item.id, failed = ?report.failed, "dynamic overlay partially applied");
                }
            }
            self.registry.register(item.id.clone(), def);
        }
        tracing::info!(item = %item.id, "dynamic toc item registered");
        self.toc.register_dynamic_item(item);
        self.toc_changed(true)
    }

    /// Remove a runtime TOC item and the overlay registered under its id.
    pub fn unregister_dynamic_item(&mut self, id: &str) -> Vec<HostAction> {
        if self.toc.unregister_dynamic_item(id).is_none() {
            return Vec::new();
        }
        if let Some(def) = self.registry.unregister(id) {
            if self.mounted {
                overlay::remove(&mut self.surface, &def);
            }
        }
        tracing::info!(item = %id, "dynamic toc item removed");
        self.toc_changed(true)
    }

    /// Add an external WMS/WMTS layer as a dynamic TOC item.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the layer's base URL cannot be parsed.
    pub fn add_wms_layer(&mut self, cfg: &WmsLayerConfig) -> Result<Vec<HostAction>, SessionError> {
        let def = cfg.overlay()?;
        Ok(self.register_dynamic_item(cfg.toc_item(), Some(def)))
    }

    // --- Drawing ---

    fn draw_changed(&mut self, change: DrawChange) -> Vec<HostAction> {
        let committed = change.committed;
        if self.mounted {
            draw::layers::push(&mut self.surface, &self.draw, change);
        }
        committed.map(|id| HostAction::FeatureCommitted { id }).into_iter().collect()
    }

    fn mode_hints(&self) -> Vec<HostAction> {
        let select = self.draw.mode() == ToolMode::Select;
        let cursor = if select { "" } else { DRAW_CURSOR };
        vec![HostAction::SetCursor { cursor: cursor.to_string() }, HostAction::SetDoubleClickZoom { enabled: select }]
    }

    pub fn set_mode(&mut self, mode: ToolMode) -> Vec<HostAction> {
        if mode == self.draw.mode() {
            return Vec::new();
        }
        let change = self.draw.set_mode(mode);
        let mut actions = self.draw_changed(change);
        actions.extend(self.mode_hints());
        if mode != ToolMode::Select && self.popup.state().is_open() {
            self.popup.close();
            actions.push(HostAction::PopupChanged { popup: PopupState::Closed });
        }
        actions
    }

    pub fn undo_last(&mut self) -> Vec<HostAction> {
        let change = self.draw.undo_last();
        self.draw_changed(change)
    }

    pub fn finish(&mut self) -> Vec<HostAction> {
        let change = self.draw.finish();
        self.draw_changed(change)
    }

    pub fn cancel(&mut self) -> Vec<HostAction> {
        let change = self.draw.cancel();
        self.draw_changed(change)
    }

    pub fn key(&mut self, key: DrawKey) -> Vec<HostAction> {
        let change = self.draw.key(key);
        self.draw_changed(change)
    }

    /// Discard every drawing and return to select.
    pub fn clear_all(&mut self) -> Vec<HostAction> {
        let was_select = self.draw.mode() == ToolMode::Select;
        let change = self.draw.clear_all();
        let mut actions = self.draw_changed(change);
        if !was_select {
            actions.extend(self.mode_hints());
        }
        actions
    }

    pub fn delete_feature(&mut self, id: Uuid) -> Vec<HostAction> {
        let change = self.draw.delete_feature(id);
        self.draw_changed(change)
    }

    // --- Pointer ---

    /// A click goes to the popup engine in select mode and to the draw engine otherwise.
    pub fn click(&mut self, point: ScreenPoint, at: LngLat) -> Vec<HostAction> {
        if self.draw.mode() != ToolMode::Select {
            let change = self.draw.click(at);
            return self.draw_changed(change);
        }
        if !self.mounted {
            return Vec::new();
        }
        let was_open = self.popup.state().is_open();
        match self.popup.click(&mut self.surface, point, at) {
            ClickOutcome::Opened { .. } => vec![HostAction::PopupChanged { popup: self.popup.state().clone() }],
            ClickOutcome::Closed | ClickOutcome::ClusterPending if was_open => {
                vec![HostAction::PopupChanged { popup: PopupState::Closed }]
            }
            ClickOutcome::Closed | ClickOutcome::ClusterPending => Vec::new(),
        }
    }

    pub fn pointer_move(&mut self, at: LngLat) -> Vec<HostAction> {
        let change = self.draw.pointer_move(at);
        self.draw_changed(change)
    }

    pub fn double_click(&mut self) -> Vec<HostAction> {
        let change = self.draw.double_click();
        self.draw_changed(change)
    }

    pub fn close_popup(&mut self) -> Vec<HostAction> {
        let was_open = self.popup.state().is_open();
        self.popup.close();
        if was_open { vec![HostAction::PopupChanged { popup: PopupState::Closed }] } else { Vec::new() }
    }

    // --- Search ---

    pub fn show_search_result(&mut self, result: SearchResult) -> Vec<HostAction> {
        if !self.mounted {
            return Vec::new();
        }
        let target = self.search.show(&mut self.surface, result);
        vec![target.into()]
    }

    pub fn clear_search_result(&mut self) {
        if self.mounted {
            self.search.clear(&mut self.surface);
        }
    }

    // --- Surface events ---

    /// Feed one lifecycle event from the surface.
    pub fn handle_event(&mut self, event: &SurfaceEvent) -> Vec<HostAction> {
        if !self.mounted {
            return Vec::new();
        }
        if let SurfaceEvent::ClusterExpansionZoom { source, cluster_id, zoom } = event {
            return self.popup.cluster_zoom_resolved(source, *cluster_id, *zoom).map(HostAction::from).into_iter().collect();
        }

        let signals = self.coordinator.handle_event(&mut self.surface, &self.registry, &self.families, event);
        let mut actions = Vec::new();
        for signal in signals {
            match signal {
                CoordinatorSignal::OverlaysReady { .. } => self.restore_projection(),
                CoordinatorSignal::StyleFailed { message } => {
                    self.error = Some(message.clone());
                    actions.push(HostAction::StyleError { message });
                }
            }
        }
        actions
    }

    /// Drain and handle every event the surface has queued.
    pub fn pump(&mut self) -> Vec<HostAction> {
        let events = self.surface.poll_events();
        events.iter().flat_map(|e| self.handle_event(e)).collect()
    }

    /// Re-push everything the style switch wiped, from memory.
    fn restore_projection(&mut self) {
        let drawn = draw::layers::restore(&mut self.surface, &self.draw);
        let marker = self.search.restore(&mut self.surface);
        let stacked = toc::reconcile(&mut self.surface, &self.families, &self.toc.groups());
        tracing::debug!(
            draw_layers = drawn.layers_added,
            marker_layers = marker.layers_added,
            moved = stacked.stack.moved,
            "session projection restored"
        );
    }

    // --- Scripted input ---

    /// Apply one serialized input. Refused calls come back as [`HostAction::Rejected`].
    pub fn apply(&mut self, input: SessionInput) -> Vec<HostAction> {
        self.dispatch(input).unwrap_or_else(|e| {
            tracing::warn!(code = e.error_code(), error = %e, "session input rejected");
            vec![HostAction::Rejected { code: e.error_code().to_string(), message: e.to_string() }]
        })
    }

    fn dispatch(&mut self, input: SessionInput) -> Result<Vec<HostAction>, SessionError> {
        let actions = match input {
            SessionInput::Mount => return self.mount(),
            SessionInput::SetBasemap { id } => return self.set_basemap(&id),
            SessionInput::AddWmsLayer { layer } => return self.add_wms_layer(&layer),
            SessionInput::Teardown => {
                self.teardown();
                Vec::new()
            }
            SessionInput::SetBasemapOpacity { opacity } => {
                self.set_basemap_opacity(opacity);
                Vec::new()
            }
            SessionInput::SetVisible { id, visible } => self.set_visible(&id, visible),
            SessionInput::SetLabelsVisible { id, visible } => self.set_labels_visible(&id, visible),
            SessionInput::SetOpacity { id, opacity } => self.set_opacity(&id, opacity),
            SessionInput::SetOrder { order } => self.set_order(&order),
            SessionInput::MoveItem { from, to } => self.move_item(from, to),
            SessionInput::MoveUp { id } => self.move_up(&id),
            SessionInput::MoveDown { id } => self.move_down(&id),
            SessionInput::RemoveDynamicItem { id } => self.unregister_dynamic_item(&id),
            SessionInput::SetMode { mode } => self.set_mode(mode),
            SessionInput::Click { point, at } => self.click(point, at),
            SessionInput::PointerMove { at } => self.pointer_move(at),
            SessionInput::DoubleClick => self.double_click(),
            SessionInput::Key { key } => self.key(key),
            SessionInput::Undo => self.undo_last(),
            SessionInput::Finish => self.finish(),
            SessionInput::Cancel => self.cancel(),
            SessionInput::ClearAll => self.clear_all(),
            SessionInput::DeleteFeature { id } => self.delete_feature(id),
            SessionInput::ClosePopup => self.close_popup(),
            SessionInput::ShowSearchResult { result } => self.show_search_result(result),
            SessionInput::ClearSearchResult => {
                self.clear_search_result();
                Vec::new()
            }
            SessionInput::DismissError => self.dismiss_error(),
            SessionInput::Event { event } => self.handle_event(&event),
        };
        Ok(actions)
    }
}

// =============================================================================
// ASYNC DRIVER
// =============================================================================

/// Serialized form of every host call, for scripted and channel-driven use.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "input", rename_all = "snake_case")]
pub enum SessionInput {
    Mount,
    Teardown,
    SetBasemap { id: String },
    SetBasemapOpacity { opacity: f64 },
    SetVisible { id: String, visible: bool },
    SetLabelsVisible { id: String, visible: bool },
    SetOpacity { id: String, opacity: f64 },
    SetOrder { order: Vec<String> },
    MoveItem { from: usize, to: usize },
    MoveUp { id: String },
    MoveDown { id: String },
    AddWmsLayer { layer: WmsLayerConfig },
    RemoveDynamicItem { id: String },
    SetMode { mode: ToolMode },
    Click { point: ScreenPoint, at: LngLat },
    PointerMove { at: LngLat },
    DoubleClick,
    Key { key: DrawKey },
    Undo,
    Finish,
    Cancel,
    ClearAll,
    DeleteFeature { id: Uuid },
    ClosePopup,
    ShowSearchResult { result: SearchResult },
    ClearSearchResult,
    DismissError,
    /// A lifecycle event delivered by the host instead of polled.
    Event { event: SurfaceEvent },
}

/// Work item for [`run`].
pub enum Command<S> {
    Input(SessionInput),
    /// Direct access to the surface, e.g. to simulate renderer activity.
    Surface(Box<dyn FnOnce(&mut S) + Send>),
}

/// Drive `session` from `commands` until the channel closes, forwarding host
/// actions to `actions`. Surface events are drained after every command.
/// With `prefs_path` set, every prefs change is saved there.
///
/// Returns the torn-down session so callers can inspect the final state.
pub async fn run<S: Surface>(
    mut session: MapSession<S>,
    mut commands: mpsc::Receiver<Command<S>>,
    actions: mpsc::Sender<HostAction>,
    prefs_path: Option<PathBuf>,
) -> MapSession<S> {
    while let Some(command) = commands.recv().await {
        let mut out = match command {
            Command::Input(input) => session.apply(input),
            Command::Surface(poke) => {
                poke(session.surface_mut());
                Vec::new()
            }
        };
        out.extend(session.pump());

        for action in out {
            if let (HostAction::PrefsChanged { prefs }, Some(path)) = (&action, &prefs_path) {
                if let Err(e) = toc::prefs::save(path, prefs).await {
                    tracing::warn!(path = %path.display(), error = %e, "toc prefs not saved");
                }
            }
            if actions.send(action).await.is_err() {
                tracing::debug!("action receiver dropped; stopping driver");
                session.teardown();
                return session;
            }
        }
    }
    session.teardown();
    session
}

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;
