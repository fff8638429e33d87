//! Layer order reconciler.
//!
//! DESIGN
//! ======
//! The only stacking primitive is "move layer": without an anchor it lands
//! on top of everything, with an anchor it lands directly below the anchor.
//! Either way, a layer moved later sits above every layer moved earlier, so
//! the reconciler simply moves layers bottom-up in the order it wants them:
//!
//! 1. Find a label anchor in the base style. App layers are moved below it
//!    so base-style text stays legible; without one they go to the top.
//! 2. App layers not owned by any TOC group, fill < line < circle < symbol.
//! 3. TOC groups, bottom group first, each group ranked the same way.
//! 4. Draw layers, then the search marker, forced to the very top.
//!
//! Layers that do not exist (yet) are skipped. That is the normal state
//! right after a style switch.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_APP_PREFIXES, DEFAULT_LABEL_ANCHORS, DRAW_LAYER_PREFIX, SEARCH_LAYER_PREFIX};
use crate::surface::{LayerType, ROLE_OVERLAY, StyleLayer, Surface};

/// How layer ids map to ownership families.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerFamilies {
    pub app_prefixes: Vec<String>,
    pub draw_prefix: String,
    pub search_prefix: String,
    /// Known base-style label layers, highest priority first.
    pub label_anchor_ids: Vec<String>,
}

impl Default for LayerFamilies {
    fn default() -> Self {
        Self {
            app_prefixes: DEFAULT_APP_PREFIXES.iter().map(ToString::to_string).collect(),
            draw_prefix: DRAW_LAYER_PREFIX.to_string(),
            search_prefix: SEARCH_LAYER_PREFIX.to_string(),
            label_anchor_ids: DEFAULT_LABEL_ANCHORS.iter().map(ToString::to_string).collect(),
        }
    }
}

impl LayerFamilies {
    #[must_use]
    pub fn is_app(&self, id: &str) -> bool {
        self.app_prefixes.iter().any(|p| id.starts_with(p.as_str()))
    }

    #[must_use]
    pub fn is_draw(&self, id: &str) -> bool {
        id.starts_with(self.draw_prefix.as_str())
    }

    #[must_use]
    pub fn is_search(&self, id: &str) -> bool {
        id.starts_with(self.search_prefix.as_str())
    }

    /// Whether the layer belongs to this application rather than the base style.
    #[must_use]
    pub fn is_owned(&self, id: &str) -> bool {
        self.is_app(id) || self.is_draw(id) || self.is_search(id)
    }
}

/// Pick the base-style layer that app layers should sit below.
///
/// Known anchors win. Otherwise the first symbol layer that is neither a
/// contour label nor owned by this application, by prefix or by overlay tag.
#[must_use]
pub fn find_label_anchor(layers: &[StyleLayer], families: &LayerFamilies) -> Option<String> {
    for known in &families.label_anchor_ids {
        if layers.iter().any(|l| l.id == *known) {
            return Some(known.clone());
        }
    }
    layers
        .iter()
        .find(|l| {
            l.kind == LayerType::Symbol
                && !l.id.contains("contour")
                && !l.has_role(ROLE_OVERLAY)
                && !families.is_owned(&l.id)
        })
        .map(|l| l.id.clone())
}

/// Outcome of one stacking pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackReport {
    pub anchor: Option<String>,
    pub moved: usize,
    pub skipped: usize,
}

/// Stack app layers by type rank, then force draw and search layers on top.
pub fn reorder_app_layers<S: Surface + ?Sized>(surface: &mut S, families: &LayerFamilies) -> StackReport {
    stack_layers(surface, families, &[])
}

/// Full stacking pass driven by TOC order.
///
/// `groups` lists each TOC group's layer ids, top group first (UI order).
pub fn stack_layers<S: Surface + ?Sized>(
    surface: &mut S,
    families: &LayerFamilies,
    groups: &[Vec<String>],
) -> StackReport {
    let snapshot = surface.style_layers();
    let anchor = find_label_anchor(&snapshot, families);
    let mut report = StackReport { anchor: anchor.clone(), ..StackReport::default() };

    let grouped: HashSet<&str> = groups.iter().flatten().map(String::as_str).collect();

    let loose: Vec<(usize, &StyleLayer)> = snapshot
        .iter()
        .filter(|l| families.is_app(&l.id) && !families.is_draw(&l.id) && !families.is_search(&l.id))
        .filter(|l| !grouped.contains(l.id.as_str()))
        .enumerate()
        .collect();
    for id in ranked(loose) {
        mv(surface, &id, anchor.as_deref(), &mut report);
    }

    for group in groups.iter().rev() {
        let present: Vec<(usize, &StyleLayer)> = group
            .iter()
            .enumerate()
            .filter_map(|(i, id)| match snapshot.iter().find(|l| l.id == *id) {
                Some(layer) => Some((i, layer)),
                None => {
                    tracing::debug!(layer = %id, "toc layer missing; skipped");
                    report.skipped += 1;
                    None
                }
            })
            .collect();
        for id in ranked(present) {
            mv(surface, &id, anchor.as_deref(), &mut report);
        }
    }

    for layer in snapshot.iter().filter(|l| families.is_draw(&l.id)) {
        mv(surface, &layer.id, None, &mut report);
    }
    for layer in snapshot.iter().filter(|l| families.is_search(&l.id)) {
        mv(surface, &layer.id, None, &mut report);
    }

    report
}

/// Sort by type rank, then by the caller-supplied position.
fn ranked(mut layers: Vec<(usize, &StyleLayer)>) -> Vec<String> {
    layers.sort_by_key(|(pos, l)| (l.kind.rank(), *pos));
    layers.into_iter().map(|(_, l)| l.id.clone()).collect()
}

fn mv<S: Surface + ?Sized>(surface: &mut S, id: &str, anchor: Option<&str>, report: &mut StackReport) {
    if !surface.has_layer(id) {
        report.skipped += 1;
        return;
    }
    match surface.move_layer(id, anchor) {
        Ok(()) => report.moved += 1,
        Err(e) => {
            tracing::debug!(layer = %id, error = %e, "move skipped");
            report.skipped += 1;
        }
    }
}

#[cfg(test)]
#[path = "order_test.rs"]
mod order_test;
