use serde_json::json;

use super::*;
use crate::memory::MemorySurface;
use crate::overlay::ensure;
use crate::surface::{LayerSpec, LayerType, SourceSpec};
use crate::test_helpers::{demo_overlay, demo_toc_items, loaded_surface, pos};
use crate::toc::store::TocStore;

fn setup() -> (MemorySurface, TocStore) {
    let mut surface = loaded_surface();
    ensure(&mut surface, &demo_overlay());
    let mut store = TocStore::new();
    store.init_from_items(&demo_toc_items());
    (surface, store)
}

fn visibility(s: &MemorySurface, id: &str) -> Option<String> {
    s.layout(id, "visibility").and_then(|v| v.as_str()).map(ToString::to_string)
}

// =============================================================
// plan
// =============================================================

#[test]
fn hidden_group_hides_every_layer_regardless_of_labels() {
    let (mut surface, mut store) = setup();
    store.set_labels_visible("nests", true);
    store.set_visible("nests", false);
    reconcile(&mut surface, &LayerFamilies::default(), &store.groups());

    for id in ["app-nests", "app-nests-clusters", "app-nests-label"] {
        assert_eq!(visibility(&surface, id).as_deref(), Some("none"), "{id}");
    }
    assert_eq!(visibility(&surface, "app-rivers").as_deref(), Some("visible"));
}

#[test]
fn labels_follow_group_and_label_toggle() {
    let (mut surface, store) = setup();
    reconcile(&mut surface, &LayerFamilies::default(), &store.groups());
    assert_eq!(visibility(&surface, "app-nests-label").as_deref(), Some("visible"));
    assert_eq!(visibility(&surface, "app-rivers-label").as_deref(), Some("none"));
    assert_eq!(visibility(&surface, "app-rivers").as_deref(), Some("visible"));
}

#[test]
fn opacity_resolved_by_layer_type() {
    let (mut surface, mut store) = setup();
    store.set_opacity("nests", 0.5);
    reconcile(&mut surface, &LayerFamilies::default(), &store.groups());

    assert_eq!(surface.paint("app-habitats-fill", "fill-opacity"), Some(&json!(0.3)));
    assert_eq!(surface.paint("app-habitats-outline", "line-opacity"), Some(&json!(0.3)));
    assert_eq!(surface.paint("app-nests", "circle-opacity"), Some(&json!(0.5)));
    assert_eq!(surface.paint("app-nests", "circle-stroke-opacity"), Some(&json!(0.5)));
    // label layers keep their own paint
    assert!(surface.paint("app-nests-label", "text-opacity").is_none());
}

#[test]
fn unmapped_types_get_no_opacity() {
    let groups = vec![LayerGroup {
        id: "h".into(),
        title: "Hillshade".into(),
        map_layer_ids: vec!["app-hillshade".into()],
        label_layer_ids: Vec::new(),
        visible: true,
        labels_visible: false,
        opacity: 0.4,
    }];
    let layers =
        vec![StyleLayer { id: "app-hillshade".into(), kind: LayerType::Hillshade, source: None, metadata: None }];
    let m = plan(&groups, &layers);
    assert_eq!(m, vec![SurfaceMutation::SetVisibility { layer: "app-hillshade".into(), visible: true }]);
}

#[test]
fn missing_layers_produce_no_mutations() {
    let store = {
        let mut s = TocStore::new();
        s.init_from_items(&demo_toc_items());
        s
    };
    assert!(plan(&store.groups(), &[]).is_empty());

    let mut surface = loaded_surface();
    let report = reconcile(&mut surface, &LayerFamilies::default(), &store.groups());
    assert_eq!(report.properties, ApplyReport::default());
}

#[test]
fn late_layers_catch_up_on_next_pass() {
    let mut surface = loaded_surface();
    let mut store = TocStore::new();
    store.init_from_items(&demo_toc_items());
    store.set_visible("rivers", false);
    reconcile(&mut surface, &LayerFamilies::default(), &store.groups());

    ensure(&mut surface, &demo_overlay());
    reconcile(&mut surface, &LayerFamilies::default(), &store.groups());
    assert_eq!(visibility(&surface, "app-rivers").as_deref(), Some("none"));
}

// =============================================================
// Ordering
// =============================================================

fn permutations(items: &[String]) -> Vec<Vec<String>> {
    if items.len() <= 1 {
        return vec![items.to_vec()];
    }
    let mut out = Vec::new();
    for i in 0..items.len() {
        let mut rest = items.to_vec();
        let head = rest.remove(i);
        for mut tail in permutations(&rest) {
            tail.insert(0, head.clone());
            out.push(tail);
        }
    }
    out
}

#[test]
fn every_order_stacks_groups_and_keeps_draw_on_top() {
    let base: Vec<String> = vec!["nests".into(), "rivers".into(), "habitats".into()];
    for order in permutations(&base) {
        let (mut surface, mut store) = setup();
        surface.add_source("draw-data", &SourceSpec::empty_geojson()).unwrap();
        surface.add_layer(&LayerSpec::new("draw-lines", LayerType::Line).with_source("draw-data"), None).unwrap();
        surface.add_source("search-marker", &SourceSpec::empty_geojson()).unwrap();
        surface
            .add_layer(&LayerSpec::new("search-marker-layer", LayerType::Circle).with_source("search-marker"), None)
            .unwrap();

        store.set_order(&order);
        let groups = store.groups();
        reconcile(&mut surface, &LayerFamilies::default(), &groups);

        for (i, upper) in groups.iter().enumerate() {
            for lower in &groups[i + 1..] {
                for a in upper.all_layer_ids() {
                    for b in lower.all_layer_ids() {
                        assert!(pos(&surface, &a) > pos(&surface, &b), "{order:?}: {a} above {b}");
                    }
                }
            }
            for id in upper.all_layer_ids() {
                assert!(pos(&surface, "draw-lines") > pos(&surface, &id));
                assert!(pos(&surface, "search-marker-layer") > pos(&surface, &id));
            }
        }
    }
}

#[test]
fn reconcile_twice_is_stable() {
    let (mut surface, store) = setup();
    reconcile(&mut surface, &LayerFamilies::default(), &store.groups());
    let stack = surface.layer_ids();
    reconcile(&mut surface, &LayerFamilies::default(), &store.groups());
    assert_eq!(surface.layer_ids(), stack);
}
