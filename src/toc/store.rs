//! TOC state: items, their order, and per-item visibility, labels and opacity.
//!
//! DESIGN
//! ======
//! The store is the single source of truth for the table of contents. The
//! surface only ever sees a projection of it (see [`super::sync`]).
//!
//! Order invariant: every registered item id appears in `order` exactly once.
//! Ids not yet ordered are appended in registration order, and `set_order`
//! normalizes whatever the caller hands in.
//!
//! Defaults never overwrite existing state: re-initializing with the same
//! items, or re-registering a dynamic item, keeps what the user already set.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// =============================================================================
// CONFIG
// =============================================================================

/// Legend swatch shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwatchKind {
    Fill,
    Line,
    Circle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegendSwatch {
    pub kind: SwatchKind,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocLegendItem {
    pub label: String,
    pub swatch: LegendSwatch,
}

/// Static description of one TOC entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TocItemConfig {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub map_layer_ids: Vec<String>,
    #[serde(default)]
    pub label_layer_ids: Vec<String>,
    #[serde(default = "default_true")]
    pub default_visible: bool,
    #[serde(default)]
    pub default_labels_visible: bool,
    #[serde(default = "default_opacity")]
    pub default_opacity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legend_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub legend_items: Vec<TocLegendItem>,
}

fn default_true() -> bool {
    true
}

fn default_opacity() -> f64 {
    1.0
}

impl TocItemConfig {
    /// Item with no layers, visible, labels hidden, fully opaque.
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            map_layer_ids: Vec::new(),
            label_layer_ids: Vec::new(),
            default_visible: true,
            default_labels_visible: false,
            default_opacity: 1.0,
            legend_url: None,
            legend_items: Vec::new(),
        }
    }
}

/// Resolved view of one item, as the sync engine consumes it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerGroup {
    pub id: String,
    pub title: String,
    pub map_layer_ids: Vec<String>,
    pub label_layer_ids: Vec<String>,
    pub visible: bool,
    pub labels_visible: bool,
    pub opacity: f64,
}

impl LayerGroup {
    /// Map layers followed by label layers.
    #[must_use]
    pub fn all_layer_ids(&self) -> Vec<String> {
        self.map_layer_ids.iter().chain(&self.label_layer_ids).cloned().collect()
    }
}

// =============================================================================
// STORE
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct TocStore {
    static_items: Vec<TocItemConfig>,
    dynamic_items: Vec<TocItemConfig>,
    visible: HashMap<String, bool>,
    labels_visible: HashMap<String, bool>,
    opacity: HashMap<String, f64>,
    /// UI order, top to bottom.
    order: Vec<String>,
}

impl TocStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt the static item list, seeding defaults only where no state exists.
    pub fn init_from_items(&mut self, items: &[TocItemConfig]) {
        self.static_items = items.to_vec();
        for item in items {
            self.seed_defaults(item);
        }
        let ids: Vec<String> = items.iter().map(|i| i.id.clone()).collect();
        self.ensure_order_contains(&ids);
    }

    fn seed_defaults(&mut self, item: &TocItemConfig) {
        self.visible.entry(item.id.clone()).or_insert(item.default_visible);
        self.labels_visible.entry(item.id.clone()).or_insert(item.default_labels_visible);
        self.opacity.entry(item.id.clone()).or_insert(clamp01(item.default_opacity));
    }

    // --- Items ---

    /// Static items first, then dynamic ones, in registration order.
    pub fn items(&self) -> impl Iterator<Item = &TocItemConfig> {
        self.static_items.iter().chain(&self.dynamic_items)
    }

    #[must_use]
    pub fn item(&self, id: &str) -> Option<&TocItemConfig> {
        self.items().find(|i| i.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.item(id).is_some()
    }

    #[must_use]
    pub fn dynamic_items(&self) -> &[TocItemConfig] {
        &self.dynamic_items
    }

    /// Add a runtime item (e.g. an external WMS layer). Existing state wins
    /// over the item's defaults; a second registration is a no-op.
    pub fn register_dynamic_item(&mut self, item: TocItemConfig) {
        self.seed_defaults(&item);
        if !self.order.contains(&item.id) {
            self.order.push(item.id.clone());
        }
        if !self.contains(&item.id) {
            self.dynamic_items.push(item);
        }
    }

    /// Drop a runtime item and its order slot. Its visibility state is kept
    /// so a re-registration restores it.
    pub fn unregister_dynamic_item(&mut self, id: &str) -> Option<TocItemConfig> {
        let idx = self.dynamic_items.iter().position(|i| i.id == id)?;
        self.order.retain(|o| o != id);
        Some(self.dynamic_items.remove(idx))
    }

    // --- Per-item state ---

    #[must_use]
    pub fn visible(&self, id: &str) -> bool {
        self.visible.get(id).copied().unwrap_or(true)
    }

    #[must_use]
    pub fn labels_visible(&self, id: &str) -> bool {
        self.labels_visible.get(id).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn opacity(&self, id: &str) -> f64 {
        self.opacity.get(id).copied().unwrap_or(1.0)
    }

    /// Returns `false` when `id` is not a registered item.
    pub fn set_visible(&mut self, id: &str, visible: bool) -> bool {
        if !self.contains(id) {
            tracing::debug!(item = %id, "set_visible on unknown toc item");
            return false;
        }
        self.visible.insert(id.to_string(), visible);
        true
    }

    pub fn set_labels_visible(&mut self, id: &str, visible: bool) -> bool {
        if !self.contains(id) {
            tracing::debug!(item = %id, "set_labels_visible on unknown toc item");
            return false;
        }
        self.labels_visible.insert(id.to_string(), visible);
        true
    }

    /// Opacity is clamped to `0..=1`.
    pub fn set_opacity(&mut self, id: &str, opacity: f64) -> bool {
        if !self.contains(id) {
            tracing::debug!(item = %id, "set_opacity on unknown toc item");
            return false;
        }
        self.opacity.insert(id.to_string(), clamp01(opacity));
        true
    }

    // --- Order ---

    /// Current order, top to bottom.
    #[must_use]
    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// Replace the order. Unknown and repeated ids are dropped; registered ids
    /// missing from `next` keep their relative order at the end.
    pub fn set_order(&mut self, next: &[String]) {
        let mut order: Vec<String> = Vec::with_capacity(next.len());
        for id in next {
            if self.contains(id) && !order.contains(id) {
                order.push(id.clone());
            }
        }
        for id in &self.order {
            if !order.contains(id) {
                order.push(id.clone());
            }
        }
        self.order = order;
        let ids: Vec<String> = self.items().map(|i| i.id.clone()).collect();
        self.ensure_order_contains(&ids);
    }

    /// Append any of `ids` not yet ordered.
    pub fn ensure_order_contains(&mut self, ids: &[String]) {
        for id in ids {
            if !self.order.contains(id) {
                self.order.push(id.clone());
            }
        }
    }

    /// Array move: remove the entry at `from`, insert it at `to`.
    /// Returns `false` if either index is out of range.
    pub fn move_item(&mut self, from: usize, to: usize) -> bool {
        let len = self.order.len();
        if from >= len || to >= len {
            return false;
        }
        if from != to {
            let id = self.order.remove(from);
            self.order.insert(to, id);
        }
        true
    }

    /// Move `id` one slot towards the top. `false` if already top or unknown.
    pub fn move_up(&mut self, id: &str) -> bool {
        match self.order.iter().position(|o| o == id) {
            Some(idx) if idx > 0 => self.move_item(idx, idx - 1),
            _ => false,
        }
    }

    pub fn move_down(&mut self, id: &str) -> bool {
        match self.order.iter().position(|o| o == id) {
            Some(idx) if idx + 1 < self.order.len() => self.move_item(idx, idx + 1),
            _ => false,
        }
    }

    // --- Projection ---

    /// Resolved groups in UI order (top first).
    #[must_use]
    pub fn groups(&self) -> Vec<LayerGroup> {
        self.order
            .iter()
            .filter_map(|id| self.item(id))
            .map(|item| LayerGroup {
                id: item.id.clone(),
                title: item.title.clone(),
                map_layer_ids: item.map_layer_ids.clone(),
                label_layer_ids: item.label_layer_ids.clone(),
                visible: self.visible(&item.id),
                labels_visible: self.labels_visible(&item.id),
                opacity: self.opacity(&item.id),
            })
            .collect()
    }
}

fn clamp01(v: f64) -> f64 {
    if v.is_nan() { 1.0 } else { v.clamp(0.0, 1.0) }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;
