//! Style-switch coordinator.
//!
//! DESIGN
//! ======
//! Replacing the base style wipes every overlay. A switch therefore runs
//! `idle → style replaced → awaiting style loaded → overlays reapplied →
//! stable`, and overlays are recreated only after the load that belongs to
//! *this* switch.
//!
//! Every switch bumps an [`Epoch`] and registers a listener tagged with it
//! before the replace call is issued. Listeners stay registered until their
//! event arrives; a listener whose epoch is no longer current is dropped
//! without effect. That keeps rapid switches from applying anything but the
//! last one, while still consuming the stale listeners.
//!
//! A "loaded" signal is only trusted once the surface's readiness flag says
//! so, and each listener fires once, which debounces the duplicate events a
//! single load produces. Styles that keep streaming after load get a second
//! reapply pass on the next idle signal.
//!
//! Every accepted replace call is answered by one `StyleLoading` event ahead
//! of its other events. Until the latest switch's `StyleLoading` has been
//! seen, load events belong to an older load and can only retire stale
//! listeners.
//!
//! A surface error during a switch is always reported. If the surface is
//! still loading, the switch keeps its listener: renderers raise errors for
//! single tiles or sprites and may finish the load anyway. If readiness is
//! already back, the load is over, the previous style stayed, and overlays
//! are reapplied onto it.

use serde::Serialize;
use serde_json::Value;

use crate::order::{self, LayerFamilies};
use crate::overlay::OverlayRegistry;
use crate::surface::{ROLE_OVERLAY, Surface, SurfaceError, SurfaceEvent};

/// Opaque switch generation. Only comparable for equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Epoch(u64);

impl Epoch {
    fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Where the current switch stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchPhase {
    #[default]
    Idle,
    StyleReplaced,
    AwaitingStyleLoaded,
    OverlaysReapplied,
    Stable,
    Failed,
}

/// Which signal triggered a reapply pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReapplyPass {
    Loaded,
    Idle,
}

/// Notifications for the coordinator's dependents.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinatorSignal {
    /// Overlays were recreated for `epoch`; dependents must re-push their own state.
    OverlaysReady { epoch: Epoch, pass: ReapplyPass },
    /// The style for the current switch failed to load.
    StyleFailed { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Awaiting {
    StyleLoaded,
    Idle,
}

#[derive(Debug, Clone, Copy)]
struct Listener {
    epoch: Epoch,
    awaiting: Awaiting,
}

/// Drives base-style replacement and overlay recovery.
#[derive(Debug, Default)]
pub struct StyleCoordinator {
    current: Epoch,
    phase: SwitchPhase,
    listeners: Vec<Listener>,
    /// Replace calls whose `StyleLoading` has not arrived yet.
    unacked_loads: u32,
    basemap_opacity: Option<f64>,
    cancelled: bool,
}

impl StyleCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn phase(&self) -> SwitchPhase {
        self.phase
    }

    /// Whether `epoch` still belongs to the latest switch.
    #[must_use]
    pub fn is_current(&self, epoch: Epoch) -> bool {
        epoch == self.current && !self.cancelled
    }

    /// Number of listeners still waiting for a lifecycle event.
    #[must_use]
    pub fn pending_listeners(&self) -> usize {
        self.listeners.len()
    }

    #[must_use]
    pub fn basemap_opacity(&self) -> Option<f64> {
        self.basemap_opacity
    }

    /// Begin replacing the base style with `url`.
    ///
    /// Returns `Ok(None)` when the surface refused because it is being torn
    /// down and the coordinator was already cancelled.
    ///
    /// # Errors
    ///
    /// Propagates the surface error of a failed replace call otherwise.
    pub fn switch_style<S: Surface + ?Sized>(&mut self, surface: &mut S, url: &str) -> Result<Option<Epoch>, SurfaceError> {
        self.current = self.current.next();
        let epoch = self.current;
        self.listeners.push(Listener { epoch, awaiting: Awaiting::StyleLoaded });
        self.phase = SwitchPhase::StyleReplaced;

        match surface.replace_style(url) {
            Ok(()) => {
                self.phase = SwitchPhase::AwaitingStyleLoaded;
                self.unacked_loads += 1;
                tracing::info!(%url, "base style switch started");
                Ok(Some(epoch))
            }
            Err(e) => {
                self.listeners.retain(|l| l.epoch != epoch);
                self.phase = SwitchPhase::Idle;
                if self.cancelled {
                    tracing::debug!(error = %e, "style switch during teardown ignored");
                    Ok(None)
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Feed one lifecycle event. Returns signals for dependents.
    pub fn handle_event<S: Surface + ?Sized>(
        &mut self,
        surface: &mut S,
        registry: &OverlayRegistry,
        families: &LayerFamilies,
        event: &SurfaceEvent,
    ) -> Vec<CoordinatorSignal> {
        if self.cancelled {
            return Vec::new();
        }
        match event {
            SurfaceEvent::StyleLoading => {
                self.unacked_loads = self.unacked_loads.saturating_sub(1);
                Vec::new()
            }
            SurfaceEvent::StyleData | SurfaceEvent::StyleLoaded => {
                if !surface.is_style_loaded() {
                    return Vec::new();
                }
                if self.unacked_loads > 0 {
                    self.retire_superseded(Awaiting::StyleLoaded);
                    return Vec::new();
                }
                self.fire(surface, registry, families, Awaiting::StyleLoaded)
            }
            SurfaceEvent::Idle => self.fire(surface, registry, families, Awaiting::Idle),
            SurfaceEvent::Error { message } => self.fail(surface, registry, families, message),
            SurfaceEvent::ClusterExpansionZoom { .. } => Vec::new(),
        }
    }

    /// Drop listeners of older switches waiting for `awaiting`; the current one stays.
    fn retire_superseded(&mut self, awaiting: Awaiting) {
        let current = self.current;
        let before = self.listeners.len();
        self.listeners.retain(|l| l.awaiting != awaiting || l.epoch == current);
        if self.listeners.len() < before {
            tracing::debug!(?awaiting, retired = before - self.listeners.len(), "load event of a superseded switch");
        }
    }

    fn fire<S: Surface + ?Sized>(
        &mut self,
        surface: &mut S,
        registry: &OverlayRegistry,
        families: &LayerFamilies,
        awaiting: Awaiting,
    ) -> Vec<CoordinatorSignal> {
        let (due, rest): (Vec<Listener>, Vec<Listener>) =
            self.listeners.drain(..).partition(|l| l.awaiting == awaiting);
        self.listeners = rest;

        let mut signals = Vec::new();
        for listener in due {
            if listener.epoch != self.current {
                tracing::debug!(?awaiting, "superseded style switch discarded");
                continue;
            }
            self.reapply(surface, registry, families);
            match awaiting {
                Awaiting::StyleLoaded => {
                    self.phase = SwitchPhase::OverlaysReapplied;
                    self.listeners.push(Listener { epoch: listener.epoch, awaiting: Awaiting::Idle });
                    signals.push(CoordinatorSignal::OverlaysReady { epoch: listener.epoch, pass: ReapplyPass::Loaded });
                }
                Awaiting::Idle => {
                    self.phase = SwitchPhase::Stable;
                    signals.push(CoordinatorSignal::OverlaysReady { epoch: listener.epoch, pass: ReapplyPass::Idle });
                }
            }
        }
        signals
    }

    fn fail<S: Surface + ?Sized>(
        &mut self,
        surface: &mut S,
        registry: &OverlayRegistry,
        families: &LayerFamilies,
        message: &str,
    ) -> Vec<CoordinatorSignal> {
        let current = self.current;
        let waiting = self
            .listeners
            .iter()
            .any(|l| l.epoch == current && l.awaiting == Awaiting::StyleLoaded);
        if !waiting {
            tracing::warn!(%message, "surface error outside a style switch");
            return Vec::new();
        }
        self.phase = SwitchPhase::Failed;
        tracing::error!(%message, "base style failed to load");
        let mut signals = vec![CoordinatorSignal::StyleFailed { message: message.to_string() }];

        if surface.is_style_loaded() {
            self.listeners.retain(|l| l.epoch != current);
            self.reapply(surface, registry, families);
            signals.push(CoordinatorSignal::OverlaysReady { epoch: current, pass: ReapplyPass::Loaded });
        }
        signals
    }

    fn reapply<S: Surface + ?Sized>(&self, surface: &mut S, registry: &OverlayRegistry, families: &LayerFamilies) {
        let report = registry.ensure_all(surface);
        let stack = order::reorder_app_layers(surface, families);
        if let Some(opacity) = self.basemap_opacity {
            apply_basemap_opacity(surface, registry, families, opacity);
        }
        tracing::info!(
            sources = report.sources_added,
            layers = report.layers_added,
            failed = report.failed.len(),
            anchor = stack.anchor.as_deref().unwrap_or("-"),
            "overlays reapplied"
        );
    }

    /// Store and immediately apply a basemap-wide opacity (clamped to 0..1).
    pub fn set_basemap_opacity<S: Surface + ?Sized>(
        &mut self,
        surface: &mut S,
        registry: &OverlayRegistry,
        families: &LayerFamilies,
        opacity: f64,
    ) {
        let o = clamp01(opacity);
        self.basemap_opacity = Some(o);
        apply_basemap_opacity(surface, registry, families, o);
    }

    /// Stop reacting to events; the surface is going away.
    pub fn cancel(&mut self) {
        self.cancelled = true;
        self.listeners.clear();
    }
}

fn clamp01(v: f64) -> f64 {
    if v.is_nan() { 1.0 } else { v.clamp(0.0, 1.0) }
}

/// Dim every base-style layer. Overlay-tagged and app-owned layers are left alone.
pub fn apply_basemap_opacity<S: Surface + ?Sized>(
    surface: &mut S,
    registry: &OverlayRegistry,
    families: &LayerFamilies,
    opacity: f64,
) {
    let o = clamp01(opacity);
    for layer in surface.style_layers() {
        if layer.has_role(ROLE_OVERLAY) || registry.owns_layer(&layer.id) || families.is_owned(&layer.id) {
            continue;
        }
        for prop in layer.kind.basemap_opacity_properties() {
            if let Err(e) = surface.set_paint_property(&layer.id, prop, Value::from(o)) {
                tracing::debug!(layer = %layer.id, error = %e, "basemap opacity skipped");
            }
        }
    }
}

#[cfg(test)]
#[path = "style_test.rs"]
mod style_test;
