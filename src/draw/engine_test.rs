use serde_json::json;

use super::*;

fn p(lng: f64, lat: f64) -> LngLat {
    LngLat::new(lng, lat)
}

fn engine(mode: ToolMode) -> DrawEngine {
    let mut e = DrawEngine::new(ModeSwitchPolicy::Discard, NumberLocale::DeCh);
    e.set_mode(mode);
    e
}

// =============================================================
// Commit preconditions
// =============================================================

#[test]
fn point_commits_on_single_click() {
    let mut e = engine(ToolMode::DrawPoint);
    let change = e.click(p(8.5, 47.4));
    assert!(change.features);
    assert!(change.committed.is_some());
    assert_eq!(e.features().len(), 1);
    assert_eq!(e.features()[0].geometry, DrawGeometry::Point(p(8.5, 47.4)));
    assert!(!e.sketch().is_open());
}

#[test]
fn line_needs_two_vertices() {
    let mut e = engine(ToolMode::DrawLine);
    e.click(p(0.0, 0.0));
    let change = e.finish();
    assert!(change.is_empty());
    assert!(e.features().is_empty());
    assert!(e.sketch().is_open(), "short commit leaves the sketch open");

    e.click(p(1.0, 0.0));
    assert!(e.finish().committed.is_some());
    assert_eq!(e.features()[0].kind, DrawKind::Line);
}

#[test]
fn arrow_needs_two_vertices() {
    let mut e = engine(ToolMode::DrawArrow);
    e.click(p(0.0, 0.0));
    assert!(e.key(DrawKey::Enter).committed.is_none());
    e.click(p(0.0, 1.0));
    assert!(e.key(DrawKey::Enter).committed.is_some());
    assert_eq!(e.features()[0].kind, DrawKind::Arrow);
}

#[test]
fn polygon_needs_three_vertices_and_closes_ring() {
    let mut e = engine(ToolMode::DrawPolygon);
    e.click(p(0.0, 0.0));
    e.click(p(1.0, 0.0));
    assert!(e.double_click().committed.is_none());
    e.click(p(1.0, 1.0));
    e.double_click();
    let DrawGeometry::Polygon(ring) = &e.features()[0].geometry else {
        panic!("expected polygon");
    };
    assert_eq!(ring.first(), ring.last());
    assert_eq!(ring.len(), 4);
}

#[test]
fn clear_all_then_triangle_round_trip() {
    let mut e = engine(ToolMode::DrawLine);
    e.click(p(5.0, 5.0));
    e.click(p(6.0, 6.0));
    e.finish();
    e.clear_all();
    assert_eq!(e.mode(), ToolMode::Select);

    e.set_mode(ToolMode::DrawPolygon);
    for v in [p(0.0, 0.0), p(1.0, 0.0), p(1.0, 1.0)] {
        e.click(v);
    }
    e.finish();
    assert_eq!(e.features().len(), 1);
    assert_eq!(
        e.data_geojson()["features"][0]["geometry"]["coordinates"],
        json!([[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]])
    );
}

// =============================================================
// Sketch editing
// =============================================================

#[test]
fn select_mode_passes_input_through() {
    let mut e = engine(ToolMode::Select);
    assert!(e.click(p(0.0, 0.0)).is_empty());
    assert!(e.pointer_move(p(1.0, 1.0)).is_empty());
    assert!(e.double_click().is_empty());
    assert!(!e.sketch().is_open());
}

#[test]
fn hover_only_tracked_with_open_sketch() {
    let mut e = engine(ToolMode::DrawLine);
    assert!(e.pointer_move(p(1.0, 1.0)).is_empty());
    e.click(p(0.0, 0.0));
    assert!(e.pointer_move(p(1.0, 1.0)).sketch);
    assert_eq!(e.sketch().hover, Some(p(1.0, 1.0)));
}

#[test]
fn undo_pops_vertices_not_features() {
    let mut e = engine(ToolMode::DrawLine);
    e.click(p(0.0, 0.0));
    e.click(p(1.0, 0.0));
    e.finish();
    e.click(p(2.0, 0.0));
    e.pointer_move(p(3.0, 0.0));
    assert!(e.undo_last().sketch);
    assert!(!e.sketch().is_open());
    assert!(e.sketch().hover.is_none());
    assert!(e.undo_last().is_empty());
    assert_eq!(e.features().len(), 1);
}

#[test]
fn escape_cancels_without_committing() {
    let mut e = engine(ToolMode::MeasureLine);
    e.click(p(0.0, 0.0));
    e.click(p(1.0, 0.0));
    assert!(e.key(DrawKey::Escape).sketch);
    assert!(!e.sketch().is_open());
    assert!(e.features().is_empty());
}

#[test]
fn delete_feature_by_id() {
    let mut e = engine(ToolMode::DrawPoint);
    let a = e.click(p(0.0, 0.0)).committed.unwrap();
    e.click(p(1.0, 1.0));
    assert!(e.delete_feature(a).features);
    assert!(!e.delete_feature(a).features);
    assert_eq!(e.features().len(), 1);
}

// =============================================================
// Mode switching
// =============================================================

#[test]
fn discard_policy_drops_open_sketch() {
    let mut e = engine(ToolMode::DrawLine);
    e.click(p(0.0, 0.0));
    e.click(p(1.0, 0.0));
    let change = e.set_mode(ToolMode::DrawPolygon);
    assert!(change.committed.is_none());
    assert!(e.features().is_empty());
    assert!(!e.sketch().is_open());
}

#[test]
fn commit_policy_finishes_open_sketch() {
    let mut e = DrawEngine::new(ModeSwitchPolicy::Commit, NumberLocale::DeCh);
    e.set_mode(ToolMode::DrawLine);
    e.click(p(0.0, 0.0));
    e.click(p(1.0, 0.0));
    let change = e.set_mode(ToolMode::Select);
    assert!(change.committed.is_some());
    assert_eq!(e.features()[0].kind, DrawKind::Line);

    e.set_mode(ToolMode::DrawPolygon);
    e.click(p(0.0, 0.0));
    assert!(e.set_mode(ToolMode::Select).committed.is_none());
    assert!(!e.sketch().is_open());
}

#[test]
fn reselecting_same_mode_keeps_sketch() {
    let mut e = engine(ToolMode::DrawLine);
    e.click(p(0.0, 0.0));
    assert!(e.set_mode(ToolMode::DrawLine).is_empty());
    assert!(e.sketch().is_open());
}

#[test]
fn policy_parses() {
    assert_eq!("commit".parse::<ModeSwitchPolicy>(), Ok(ModeSwitchPolicy::Commit));
    assert!("auto".parse::<ModeSwitchPolicy>().is_err());
}

// =============================================================
// Listings and previews
// =============================================================

#[test]
fn listings_split_by_usage_newest_first() {
    let mut e = engine(ToolMode::DrawPoint);
    let first = e.click(p(0.0, 0.0)).committed.unwrap();
    e.set_mode(ToolMode::MeasureLine);
    e.click(p(0.0, 0.0));
    e.click(p(0.0, 0.001));
    let measured = e.finish().committed.unwrap();
    e.set_mode(ToolMode::DrawPoint);
    let last = e.click(p(1.0, 1.0)).committed.unwrap();

    let order: Vec<Uuid> = e.features_newest_first().map(|f| f.id).collect();
    assert_eq!(order, vec![last, measured, first]);
    assert_eq!(e.measurements().map(|f| f.id).collect::<Vec<_>>(), vec![measured]);
    assert_eq!(e.sketches().map(|f| f.id).collect::<Vec<_>>(), vec![last, first]);
    assert!(e.measurements().next().unwrap().label.as_deref().unwrap().ends_with(" m"));
}

#[test]
fn current_sketch_includes_hover() {
    let mut e = engine(ToolMode::DrawPolygon);
    e.click(p(0.0, 0.0));
    e.click(p(1.0, 0.0));
    assert_eq!(e.current_sketch().unwrap()["geometry"]["type"], json!("LineString"));
    e.pointer_move(p(1.0, 1.0));
    let f = e.current_sketch().unwrap();
    assert_eq!(f["properties"]["kind"], json!("polygon"));
    assert_eq!(f["geometry"]["coordinates"][0].as_array().unwrap().len(), 4);
}

#[test]
fn current_measurement_only_in_measure_tools() {
    let mut e = engine(ToolMode::MeasureLine);
    e.click(p(0.0, 0.0));
    assert!(e.current_measurement().is_none());
    e.pointer_move(p(0.0, 0.001));
    assert_eq!(e.current_measurement().as_deref(), Some("111 m"));

    let mut d = engine(ToolMode::DrawLine);
    d.click(p(0.0, 0.0));
    d.click(p(0.0, 0.001));
    assert!(d.current_measurement().is_none());
}

#[test]
fn sketch_preview_closes_polygon_through_hover() {
    let mut e = engine(ToolMode::MeasurePolygon);
    assert_eq!(e.sketch_geojson()["features"], json!([]));
    e.click(p(0.0, 0.0));
    e.click(p(1.0, 0.0));
    e.pointer_move(p(1.0, 1.0));
    let fc = e.sketch_geojson();
    let features = fc["features"].as_array().unwrap();
    assert_eq!(features.len(), 2);
    assert_eq!(features[0]["properties"]["kind"], json!("sketch-line"));
    assert_eq!(features[0]["properties"]["usage"], json!("measure"));
    assert_eq!(
        features[0]["geometry"]["coordinates"],
        json!([[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]])
    );
    assert_eq!(features[1]["properties"]["kind"], json!("sketch-polygon"));
}

#[test]
fn single_vertex_without_hover_previews_nothing() {
    let mut e = engine(ToolMode::DrawLine);
    e.click(p(0.0, 0.0));
    assert_eq!(e.sketch_geojson()["features"], json!([]));

    e.pointer_move(p(1.0, 0.0));
    let fc = e.sketch_geojson();
    assert_eq!(fc["features"][0]["geometry"]["coordinates"], json!([[0.0, 0.0], [1.0, 0.0]]));
}

#[test]
fn arrow_preview_is_tagged_arrow() {
    let mut e = engine(ToolMode::DrawArrow);
    e.click(p(0.0, 0.0));
    e.pointer_move(p(1.0, 0.0));
    assert_eq!(e.sketch_geojson()["features"][0]["properties"]["kind"], json!("arrow"));
}
