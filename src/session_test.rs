#![allow(clippy::float_cmp)]

use serde_json::json;

use super::*;
use crate::basemap::BasemapDef;
use crate::consts::{DRAW_DATA_SOURCE_ID, SEARCH_MARKER_LAYER_ID};
use crate::memory::MemorySurface;
use crate::surface::RenderedFeature;
use crate::test_helpers::{demo_overlay, demo_toc_items, fresh_surface, pos};
use crate::wms::WmsFormat;

// =============================================================
// Helpers
// =============================================================

fn basemap(id: &str) -> BasemapDef {
    BasemapDef { id: id.into(), label: id.into(), style_id: id.into(), description: None }
}

fn config() -> WorkbenchConfig {
    WorkbenchConfig {
        style_urls: StyleUrlTemplate { template: "style://{style}".into(), key_env: "__MAPBENCH_UNUSED__".into() },
        ..WorkbenchConfig::default()
    }
}

fn setup() -> MapSetup {
    let mut overlays = std::collections::BTreeMap::new();
    overlays.insert("demo".to_string(), demo_overlay());
    MapSetup {
        basemaps: vec![basemap("streets"), basemap("satellite")],
        overlays,
        toc_items: demo_toc_items(),
        ..MapSetup::default()
    }
}

fn session() -> MapSession<MemorySurface> {
    MapSession::new(fresh_surface(), &config(), setup())
}

/// Mounted session with the first style loaded and every event handled.
fn ready() -> MapSession<MemorySurface> {
    let mut s = session();
    s.mount().unwrap();
    load(&mut s);
    s
}

fn load(s: &mut MapSession<MemorySurface>) -> Vec<HostAction> {
    s.surface_mut().complete_style_load();
    s.surface_mut().emit_idle();
    s.pump()
}

fn visibility(s: &MapSession<MemorySurface>, layer: &str) -> Option<serde_json::Value> {
    s.surface().layout(layer, "visibility").cloned()
}

const CLICK: ScreenPoint = ScreenPoint { x: 50.0, y: 50.0 };

fn river_hit() -> RenderedFeature {
    RenderedFeature {
        id: Some(json!(1)),
        source: "rivers".into(),
        source_layer: None,
        layer_id: "app-rivers".into(),
        geometry: Some(json!({ "type": "LineString", "coordinates": [[7.0, 46.0], [7.1, 46.1]] })),
        properties: serde_json::Map::new(),
    }
}

// =============================================================
// Mount and basemap switching
// =============================================================

#[test]
fn mount_loads_first_basemap_and_projects_toc() {
    let mut s = session();
    let actions = s.mount().unwrap();
    assert_eq!(actions[0], HostAction::BasemapChanged { id: "streets".into() });
    assert!(actions.contains(&HostAction::SetCursor { cursor: String::new() }));
    assert!(actions.contains(&HostAction::SetDoubleClickZoom { enabled: true }));

    assert!(load(&mut s).is_empty());
    assert_eq!(s.style_phase(), SwitchPhase::Stable);
    let surface = s.surface();
    assert!(pos(surface, "app-nests") > pos(surface, "app-rivers"));
    assert!(pos(surface, "app-rivers") > pos(surface, "app-habitats-fill"));
    assert!(pos(surface, "app-nests-label") < pos(surface, "place_label"));
    assert_eq!(surface.paint("app-habitats-fill", "fill-opacity"), Some(&json!(0.3)));
    assert_eq!(visibility(&s, "app-rivers-label"), Some(json!("none")));
    assert_eq!(visibility(&s, "app-nests-label"), Some(json!("visible")));
}

#[test]
fn mount_twice_is_a_no_op() {
    let mut s = ready();
    assert!(s.mount().unwrap().is_empty());
}

#[test]
fn basemap_calls_need_a_mounted_map() {
    let mut s = session();
    assert!(matches!(s.set_basemap("satellite"), Err(SessionError::NotMounted)));
    let actions = s.apply(SessionInput::SetBasemap { id: "satellite".into() });
    assert_eq!(
        actions,
        vec![HostAction::Rejected { code: "E_SESSION_NOT_MOUNTED".into(), message: "map is not mounted".into() }]
    );
}

#[test]
fn reselecting_current_basemap_does_nothing() {
    let mut s = ready();
    assert!(s.set_basemap("streets").unwrap().is_empty());
}

#[test]
fn unknown_basemap_falls_back_to_first_entry() {
    let mut s = ready();
    s.set_basemap("satellite").unwrap();
    load(&mut s);
    let actions = s.set_basemap("moon").unwrap();
    assert_eq!(actions[0], HostAction::BasemapChanged { id: "streets".into() });
}

#[test]
fn switch_restores_drawings_marker_and_toc_state() {
    let mut s = ready();
    s.set_mode(ToolMode::DrawPoint);
    s.click(CLICK, LngLat::new(7.0, 46.0));
    s.set_mode(ToolMode::Select);
    s.show_search_result(SearchResult { center: LngLat::new(8.0, 47.0), label: "Bern".into(), id: None });
    s.set_visible("rivers", false);

    s.set_basemap("satellite").unwrap();
    assert!(s.surface().has_layer("app-rivers"), "old style stays until the new one loads");
    s.surface_mut().complete_style_load();
    assert!(!s.surface().has_layer("app-rivers"));
    load(&mut s);

    let surface = s.surface();
    assert_eq!(surface.current_style(), Some("style://satellite"));
    assert_eq!(surface.source_data(DRAW_DATA_SOURCE_ID).unwrap()["features"][0]["geometry"]["coordinates"], json!([7.0, 46.0]));
    assert_eq!(visibility(&s, "app-rivers"), Some(json!("none")));
    let top = surface.layer_ids().len() - 1;
    assert_eq!(pos(surface, SEARCH_MARKER_LAYER_ID), top);
    assert!(pos(surface, "draw-points") > pos(surface, "app-nests-label"));
}

#[test]
fn rapid_switches_end_on_last_basemap() {
    let mut s = ready();
    s.set_basemap("satellite").unwrap();
    s.set_basemap("streets").unwrap();
    s.set_basemap("satellite").unwrap();
    load(&mut s);
    assert_eq!(s.basemap_id(), Some("satellite"));
    assert_eq!(s.surface().current_style(), Some("style://satellite"));
    assert!(s.surface().has_layer("app-nests"));
}

#[test]
fn style_failure_is_visible_until_dismissed_and_retryable() {
    let mut s = ready();
    s.set_basemap("satellite").unwrap();
    s.surface_mut().fail_style_load("503 from tile host");
    let actions = s.pump();
    assert_eq!(actions, vec![HostAction::StyleError { message: "503 from tile host".into() }]);
    assert_eq!(s.error(), Some("503 from tile host"));
    assert!(s.surface().has_layer("app-nests"), "previous style stays usable");

    assert_eq!(s.dismiss_error(), vec![HostAction::StyleErrorDismissed]);
    assert!(s.dismiss_error().is_empty());

    assert!(!s.set_basemap("satellite").unwrap().is_empty(), "failed basemap can be retried");
}

#[test]
fn transient_error_during_switch_still_restores_overlays() {
    let mut s = ready();
    s.set_basemap("satellite").unwrap();
    let actions = s.handle_event(&SurfaceEvent::Error { message: "tile 404".into() });
    assert_eq!(actions, vec![HostAction::StyleError { message: "tile 404".into() }]);

    load(&mut s);
    assert_eq!(s.surface().current_style(), Some("style://satellite"));
    assert!(s.surface().has_layer("app-nests"));
    assert!(s.surface().has_layer("app-rivers"));
    assert_eq!(s.style_phase(), SwitchPhase::Stable);
    assert_eq!(s.error(), Some("tile 404"), "banner stays until dismissed");
}

#[test]
fn failed_switch_reports_even_after_an_unhandled_older_load() {
    let mut s = ready();
    s.set_basemap("satellite").unwrap();
    s.surface_mut().complete_style_load();
    s.set_basemap("streets").unwrap();
    s.surface_mut().fail_style_load("503");

    let actions = s.pump();
    assert_eq!(actions, vec![HostAction::StyleError { message: "503".into() }]);
    assert_eq!(s.error(), Some("503"));
    assert_eq!(s.style_phase(), SwitchPhase::Failed);
    assert_eq!(s.surface().current_style(), Some("style://satellite"));
    assert!(s.surface().has_layer("app-nests"), "overlays rebuilt on the style that stayed");
}

#[test]
fn missing_style_key_rejects_switch() {
    let cfg = WorkbenchConfig {
        style_urls: StyleUrlTemplate { template: "style://{style}?k={key}".into(), key_env: "__MAPBENCH_NO_KEY__".into() },
        ..WorkbenchConfig::default()
    };
    let mut s = MapSession::new(fresh_surface(), &cfg, setup());
    let err = s.mount().unwrap_err();
    assert_eq!(err.error_code(), "E_CONFIG_MISSING_ENV");
}

#[test]
fn basemap_opacity_survives_switch() {
    let mut s = ready();
    s.set_basemap_opacity(0.4);
    assert_eq!(s.surface().paint("roads", "line-opacity"), Some(&json!(0.4)));
    s.set_basemap("satellite").unwrap();
    load(&mut s);
    assert_eq!(s.surface().paint("imagery", "raster-opacity"), Some(&json!(0.4)));
    assert_eq!(s.surface().paint("app-nests", "circle-opacity"), Some(&json!(1.0)));
}

// =============================================================
// TOC
// =============================================================

#[test]
fn toc_mutations_reconcile_and_emit_prefs() {
    let mut s = ready();
    let actions = s.set_labels_visible("rivers", true);
    assert!(matches!(&actions[..], [HostAction::PrefsChanged { .. }]));
    assert_eq!(visibility(&s, "app-rivers-label"), Some(json!("visible")));

    assert!(s.set_visible("nope", false).is_empty());

    s.move_down("nests");
    assert_eq!(s.toc().order(), ["rivers", "nests", "habitats"]);
    assert!(pos(s.surface(), "app-rivers") > pos(s.surface(), "app-nests"));

    s.set_order(&["habitats".to_string()]);
    assert_eq!(s.toc().order()[0], "habitats");
    assert!(pos(s.surface(), "app-habitats-fill") > pos(s.surface(), "app-nests-label"));
}

#[test]
fn wms_layer_round_trip() {
    let mut s = ready();
    let wms = WmsLayerConfig {
        id: "wms:hydro".into(),
        title: "Hydro".into(),
        base_url: "https://wms.example.org/service".into(),
        layers: "rivers".into(),
        format: WmsFormat::Png,
        transparent: true,
        opacity: Some(0.6),
    };
    s.add_wms_layer(&wms).unwrap();
    assert!(s.surface().has_layer("wms:hydro"));
    assert!(s.toc().contains("wms:hydro"));
    assert_eq!(s.surface().paint("wms:hydro", "raster-opacity"), Some(&json!(0.6)));

    s.set_basemap("satellite").unwrap();
    load(&mut s);
    assert!(s.surface().has_layer("wms:hydro"), "dynamic overlay recreated after switch");

    s.unregister_dynamic_item("wms:hydro");
    assert!(!s.surface().has_layer("wms:hydro"));
    assert!(!s.surface().has_source("wms:hydro"));
    assert!(!s.toc().contains("wms:hydro"));
    assert!(s.unregister_dynamic_item("wms:hydro").is_empty());
}

#[test]
fn prefs_restore_before_mount_picks_basemap() {
    let mut s = session();
    let prefs = TocPrefs {
        visible: [("rivers".to_string(), json!(false))].into_iter().collect(),
        basemap_id: Some("satellite".into()),
        ..TocPrefs::default()
    };
    assert_eq!(s.restore_prefs(&prefs), 1);
    let actions = s.mount().unwrap();
    assert_eq!(actions[0], HostAction::BasemapChanged { id: "satellite".into() });
    load(&mut s);
    assert_eq!(visibility(&s, "app-rivers"), Some(json!("none")));
    assert_eq!(s.prefs().basemap_id.as_deref(), Some("satellite"));
}

// =============================================================
// Pointer routing
// =============================================================

#[test]
fn click_opens_popup_in_select_and_draws_otherwise() {
    let mut s = ready();
    s.surface_mut().add_rendered_feature(CLICK, river_hit());
    let actions = s.click(CLICK, LngLat::new(7.0, 46.0));
    assert!(matches!(&actions[..], [HostAction::PopupChanged { popup: PopupState::Open { .. } }]));

    let actions = s.set_mode(ToolMode::DrawLine);
    assert!(actions.contains(&HostAction::SetCursor { cursor: "crosshair".into() }));
    assert!(actions.contains(&HostAction::SetDoubleClickZoom { enabled: false }));
    assert!(actions.contains(&HostAction::PopupChanged { popup: PopupState::Closed }));

    s.click(CLICK, LngLat::new(7.0, 46.0));
    s.click(CLICK, LngLat::new(7.1, 46.0));
    let actions = s.double_click();
    assert!(matches!(&actions[..], [HostAction::FeatureCommitted { .. }]));
    assert!(!s.popup().is_open());
    assert_eq!(s.draw().features().len(), 1);
}

#[test]
fn clear_all_returns_to_select_hints() {
    let mut s = ready();
    s.set_mode(ToolMode::MeasurePolygon);
    let actions = s.clear_all();
    assert!(actions.contains(&HostAction::SetCursor { cursor: String::new() }));
    assert_eq!(s.draw().mode(), ToolMode::Select);
}

#[test]
fn cluster_click_flies_to_expansion_zoom() {
    let mut s = ready();
    let cluster = RenderedFeature {
        id: None,
        source: "nests".into(),
        source_layer: None,
        layer_id: "app-nests-clusters".into(),
        geometry: Some(json!({ "type": "Point", "coordinates": [8.0, 47.0] })),
        properties: json!({ "cluster": true, "cluster_id": 9 }).as_object().cloned().unwrap(),
    };
    s.surface_mut().add_rendered_feature(CLICK, cluster);
    s.surface_mut().set_cluster_zoom("nests", 9, 12.0);

    assert!(s.click(CLICK, LngLat::new(8.0, 47.0)).is_empty());
    assert_eq!(s.pump(), vec![HostAction::FlyTo { center: LngLat::new(8.0, 47.0), zoom: 12.0 }]);
}

#[test]
fn search_result_flies_to_zoom_15() {
    let mut s = ready();
    let actions = s.show_search_result(SearchResult { center: LngLat::new(8.0, 47.0), label: "Bern".into(), id: None });
    assert_eq!(actions, vec![HostAction::FlyTo { center: LngLat::new(8.0, 47.0), zoom: 15.0 }]);
    s.clear_search_result();
    assert_eq!(s.search().current(), None);
}

// =============================================================
// Teardown
// =============================================================

#[test]
fn teardown_silences_everything() {
    let mut s = session();
    s.mount().unwrap();
    s.teardown();
    s.surface_mut().complete_style_load();
    assert!(s.pump().is_empty());
    assert!(!s.surface().has_layer("app-nests"));
    assert!(s.mount().unwrap().is_empty());
    assert!(!s.is_mounted());
}

// =============================================================
// Driver
// =============================================================

#[tokio::test]
async fn driver_runs_script_and_saves_prefs() {
    let path = std::env::temp_dir().join(format!("mapbench-prefs-{}.json", Uuid::new_v4()));
    let (cmd_tx, cmd_rx) = mpsc::channel(16);
    let (act_tx, mut act_rx) = mpsc::channel(64);
    let driver = tokio::spawn(run(session(), cmd_rx, act_tx, Some(path.clone())));

    let script = [
        r#"{ "input": "mount" }"#,
        r#"{ "input": "set_visible", "id": "habitats", "visible": false }"#,
        r#"{ "input": "set_mode", "mode": "draw-point" }"#,
        r#"{ "input": "click", "point": { "x": 1.0, "y": 1.0 }, "at": { "lng": 7.0, "lat": 46.0 } }"#,
    ];
    cmd_tx.send(Command::Input(serde_json::from_str(script[0]).unwrap())).await.unwrap();
    cmd_tx.send(Command::Surface(Box::new(MemorySurface::complete_style_load))).await.unwrap();
    for line in &script[1..] {
        cmd_tx.send(Command::Input(serde_json::from_str(line).unwrap())).await.unwrap();
    }
    drop(cmd_tx);

    let session = driver.await.unwrap();
    let mut actions = Vec::new();
    while let Some(a) = act_rx.recv().await {
        actions.push(a);
    }

    assert!(actions.iter().any(|a| matches!(a, HostAction::FeatureCommitted { .. })));
    assert!(!session.is_mounted());
    assert_eq!(visibility(&session, "app-habitats-fill"), Some(json!("none")));

    let saved = toc::prefs::load(&path).await.unwrap();
    assert_eq!(saved.visible.get("habitats"), Some(&json!(false)));
    tokio::fs::remove_file(&path).await.unwrap();
}

#[test]
fn inputs_deserialize_from_snake_case_tags() {
    let input: SessionInput = serde_json::from_str(r#"{ "input": "move_item", "from": 2, "to": 0 }"#).unwrap();
    assert_eq!(input, SessionInput::MoveItem { from: 2, to: 0 });
    let input: SessionInput = serde_json::from_str(r#"{ "input": "event", "event": { "type": "idle" } }"#).unwrap();
    assert_eq!(input, SessionInput::Event { event: SurfaceEvent::Idle });
}
