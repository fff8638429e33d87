//! TOC sync: project TOC groups onto concrete layer properties.
//!
//! DESIGN
//! ======
//! [`plan`] is pure: groups plus a snapshot of the surface's layers in, a
//! flat list of mutations out. [`reconcile`] re-runs everything (stacking,
//! then the plan) on every change instead of diffing, and it is also what
//! runs after overlays come back from a style switch.
//!
//! - A map layer is visible iff its group is visible.
//! - A label layer is visible iff its group is visible *and* labels are on.
//! - Opacity goes to map layers through their type's paint properties.
//! - Layers absent from the snapshot produce no mutations.

use serde::Serialize;
use serde_json::Value;

use crate::order::{self, LayerFamilies, StackReport};
use crate::surface::{StyleLayer, Surface};

use super::store::LayerGroup;

/// One imperative call the plan wants made.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SurfaceMutation {
    SetVisibility { layer: String, visible: bool },
    SetPaint { layer: String, property: &'static str, value: f64 },
}

impl SurfaceMutation {
    #[must_use]
    pub fn layer(&self) -> &str {
        match self {
            Self::SetVisibility { layer, .. } | Self::SetPaint { layer, .. } => layer,
        }
    }
}

/// Compute the mutations that bring `layers` in line with `groups`.
#[must_use]
pub fn plan(groups: &[LayerGroup], layers: &[StyleLayer]) -> Vec<SurfaceMutation> {
    let mut out = Vec::new();
    for group in groups {
        for id in &group.map_layer_ids {
            let Some(layer) = layers.iter().find(|l| l.id == *id) else {
                continue;
            };
            out.push(SurfaceMutation::SetVisibility { layer: id.clone(), visible: group.visible });
            for &property in layer.kind.opacity_properties() {
                out.push(SurfaceMutation::SetPaint { layer: id.clone(), property, value: group.opacity });
            }
        }
        let labels_on = group.visible && group.labels_visible;
        for id in &group.label_layer_ids {
            if layers.iter().any(|l| l.id == *id) {
                out.push(SurfaceMutation::SetVisibility { layer: id.clone(), visible: labels_on });
            }
        }
    }
    out
}

/// Counts from one [`apply`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub applied: usize,
    pub skipped: usize,
}

/// Execute `mutations`; failures are logged and counted, never fatal.
pub fn apply<S: Surface + ?Sized>(surface: &mut S, mutations: &[SurfaceMutation]) -> ApplyReport {
    let mut report = ApplyReport::default();
    for m in mutations {
        let res = match m {
            SurfaceMutation::SetVisibility { layer, visible } => {
                let v = if *visible { "visible" } else { "none" };
                surface.set_layout_property(layer, "visibility", Value::from(v))
            }
            SurfaceMutation::SetPaint { layer, property, value } => {
                surface.set_paint_property(layer, property, Value::from(*value))
            }
        };
        match res {
            Ok(()) => report.applied += 1,
            Err(e) => {
                tracing::debug!(layer = %m.layer(), error = %e, "toc mutation skipped");
                report.skipped += 1;
            }
        }
    }
    report
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub stack: StackReport,
    pub properties: ApplyReport,
}

/// Restack by TOC order, then push visibility and opacity.
pub fn reconcile<S: Surface + ?Sized>(
    surface: &mut S,
    families: &LayerFamilies,
    groups: &[LayerGroup],
) -> ReconcileReport {
    let stacking: Vec<Vec<String>> = groups.iter().map(LayerGroup::all_layer_ids).collect();
    let stack = order::stack_layers(surface, families, &stacking);
    let mutations = plan(groups, &surface.style_layers());
    let properties = apply(surface, &mutations);
    tracing::debug!(groups = groups.len(), moved = stack.moved, applied = properties.applied, "toc reconciled");
    ReconcileReport { stack, properties }
}

#[cfg(test)]
#[path = "sync_test.rs"]
mod sync_test;
