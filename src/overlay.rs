//! Overlay registry: idempotent creation of overlay sources and layers.
//!
//! DESIGN
//! ======
//! Overlay definitions are loaded once and owned by an [`OverlayRegistry`]
//! held by the session, so there is no process-wide cache. Every style
//! replacement wipes the surface, so [`ensure`] is written to be called
//! again and again: it checks before it creates and never fails as a whole.
//! A malformed layer is logged and skipped; the rest still lands.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::surface::{LayerSpec, ROLE_OVERLAY, SourceSpec, Surface};

/// Sources and layers contributed by one overlay package.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverlayDefinition {
    #[serde(default)]
    pub sources: BTreeMap<String, SourceSpec>,
    #[serde(default)]
    pub layers: Vec<LayerSpec>,
}

impl OverlayDefinition {
    pub fn layer_ids(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|l| l.id.as_str())
    }
}

/// What a single [`ensure`] pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnsureReport {
    pub sources_added: usize,
    pub layers_added: usize,
    /// Ids of sources or layers whose creation failed.
    pub failed: Vec<String>,
}

impl EnsureReport {
    fn merge(&mut self, other: EnsureReport) {
        self.sources_added += other.sources_added;
        self.layers_added += other.layers_added;
        self.failed.extend(other.failed);
    }
}

/// Create every source and layer of `def` that the surface does not have yet.
///
/// Layers are tagged `role: overlay` so basemap-wide operations skip them.
pub fn ensure<S: Surface + ?Sized>(surface: &mut S, def: &OverlayDefinition) -> EnsureReport {
    let mut report = EnsureReport::default();

    for (id, spec) in &def.sources {
        if surface.has_source(id) {
            continue;
        }
        match surface.add_source(id, spec) {
            Ok(()) => report.sources_added += 1,
            Err(e) => {
                tracing::warn!(source = %id, error = %e, "overlay source rejected");
                report.failed.push(id.clone());
            }
        }
    }

    for layer in &def.layers {
        if surface.has_layer(&layer.id) {
            continue;
        }
        match surface.add_layer(&layer.tagged(ROLE_OVERLAY), None) {
            Ok(()) => report.layers_added += 1,
            Err(e) => {
                tracing::warn!(layer = %layer.id, error = %e, "overlay layer rejected");
                report.failed.push(layer.id.clone());
            }
        }
    }

    report
}

/// Remove the layers of `def`, then its sources. Missing ids are ignored.
pub fn remove<S: Surface + ?Sized>(surface: &mut S, def: &OverlayDefinition) {
    for layer in def.layers.iter().rev() {
        if !surface.has_layer(&layer.id) {
            continue;
        }
        if let Err(e) = surface.remove_layer(&layer.id) {
            tracing::debug!(layer = %layer.id, error = %e, "overlay layer removal skipped");
        }
    }
    for id in def.sources.keys() {
        if !surface.has_source(id) {
            continue;
        }
        if let Err(e) = surface.remove_source(id) {
            tracing::debug!(source = %id, error = %e, "overlay source removal skipped");
        }
    }
}

/// Named overlay definitions, applied in registration order.
#[derive(Debug, Clone, Default)]
pub struct OverlayRegistry {
    entries: Vec<(String, OverlayDefinition)>,
}

impl OverlayRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the definition registered under `name`.
    pub fn register(&mut self, name: impl Into<String>, def: OverlayDefinition) {
        let name = name.into();
        if let Some(slot) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = def;
        } else {
            self.entries.push((name, def));
        }
    }

    /// Forget a definition, returning it so the caller can remove its layers.
    pub fn unregister(&mut self, name: &str) -> Option<OverlayDefinition> {
        let idx = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(idx).1)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&OverlayDefinition> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, d)| d)
    }

    /// [`ensure`] every registered definition.
    pub fn ensure_all<S: Surface + ?Sized>(&self, surface: &mut S) -> EnsureReport {
        let mut report = EnsureReport::default();
        for (name, def) in &self.entries {
            let r = ensure(surface, def);
            if !r.failed.is_empty() {
                tracing::warn!(overlay = %name, failed = r.failed.len(), "overlay partially applied");
            }
            report.merge(r);
        }
        report
    }

    /// Whether any registered definition owns layer `id`.
    #[must_use]
    pub fn owns_layer(&self, id: &str) -> bool {
        self.entries.iter().any(|(_, d)| d.layer_ids().any(|l| l == id))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[path = "overlay_test.rs"]
mod overlay_test;
