use serde_json::json;

use super::*;

#[test]
fn position_parses_lng_lat_pair() {
    let p = LngLat::from_position(&json!([8.5, 47.3])).unwrap();
    assert_eq!(p, LngLat::new(8.5, 47.3));
}

#[test]
fn position_ignores_altitude() {
    let p = LngLat::from_position(&json!([8.5, 47.3, 410.0])).unwrap();
    assert_eq!(p, LngLat::new(8.5, 47.3));
}

#[test]
fn position_rejects_short_or_non_numeric() {
    assert!(LngLat::from_position(&json!([8.5])).is_none());
    assert!(LngLat::from_position(&json!(["a", "b"])).is_none());
    assert!(LngLat::from_position(&json!({"lng": 1})).is_none());
}

#[test]
fn zero_tolerance_box_covers_exact_pixel() {
    let b = QueryBox::around(ScreenPoint::new(10.0, 20.0), 0.0);
    assert!(b.contains(ScreenPoint::new(10.0, 20.0)));
    assert!(!b.contains(ScreenPoint::new(10.5, 20.0)));
}

#[test]
fn tolerance_box_is_inclusive() {
    let b = QueryBox::around(ScreenPoint::new(10.0, 20.0), 3.0);
    assert!(b.contains(ScreenPoint::new(13.0, 17.0)));
    assert!(!b.contains(ScreenPoint::new(13.1, 20.0)));
}

#[test]
fn negative_tolerance_clamps_to_zero() {
    let b = QueryBox::around(ScreenPoint::new(1.0, 1.0), -5.0);
    assert_eq!(b.min, b.max);
}
