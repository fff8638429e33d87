use super::*;
use crate::error::ErrorCode;

// =============================================================================
// env_parse
// =============================================================================

#[test]
fn env_parse_missing_returns_default() {
    let val: f64 = env_parse("__MAPBENCH_TEST_MISSING__", 2.5);
    assert!((val - 2.5).abs() < f64::EPSILON);
}

#[test]
fn env_parse_present_invalid_returns_default() {
    unsafe { std::env::set_var("__MAPBENCH_TEST_INVALID__", "wide") };
    let val: f64 = env_parse("__MAPBENCH_TEST_INVALID__", 3.0);
    assert!((val - 3.0).abs() < f64::EPSILON);
    unsafe { std::env::remove_var("__MAPBENCH_TEST_INVALID__") };
}

#[test]
fn env_enum_rejects_unknown_values() {
    unsafe { std::env::set_var("__MAPBENCH_TEST_ENUM__", "sometimes") };
    let err = env_enum::<ModeSwitchPolicy>("__MAPBENCH_TEST_ENUM__", ModeSwitchPolicy::Discard).unwrap_err();
    assert_eq!(err.error_code(), "E_CONFIG_INVALID_VALUE");
    unsafe { std::env::remove_var("__MAPBENCH_TEST_ENUM__") };
}

// =============================================================================
// WorkbenchConfig
// =============================================================================

fn clear_env() {
    unsafe {
        for key in [
            ENV_STYLE_URL_TEMPLATE,
            ENV_STYLE_KEY_ENV,
            ENV_POPUP_TOLERANCE_PX,
            ENV_MODE_SWITCH,
            ENV_NUMBER_LOCALE,
            ENV_PREFS_PATH,
            ENV_SETUP,
        ] {
            std::env::remove_var(key);
        }
    }
}

// One test owns the MAPBENCH_* variables so parallel tests cannot interleave.
#[test]
fn from_env_defaults_overrides_and_errors() {
    clear_env();
    assert_eq!(WorkbenchConfig::from_env().unwrap(), WorkbenchConfig::default());

    unsafe {
        std::env::set_var(ENV_STYLE_URL_TEMPLATE, "https://tiles.local/{style}.json");
        std::env::set_var(ENV_POPUP_TOLERANCE_PX, "6");
        std::env::set_var(ENV_MODE_SWITCH, "commit");
        std::env::set_var(ENV_NUMBER_LOCALE, "en-US");
        std::env::set_var(ENV_PREFS_PATH, "/tmp/toc.json");
        std::env::set_var(ENV_SETUP, "https://example.org/setup.json");
    }
    let cfg = WorkbenchConfig::from_env().unwrap();
    assert_eq!(cfg.style_urls.template, "https://tiles.local/{style}.json");
    assert!((cfg.popup_tolerance_px - 6.0).abs() < f64::EPSILON);
    assert_eq!(cfg.mode_switch, ModeSwitchPolicy::Commit);
    assert_eq!(cfg.number_locale, NumberLocale::EnUs);
    assert_eq!(cfg.prefs_path, Some(PathBuf::from("/tmp/toc.json")));
    assert_eq!(cfg.setup.as_deref(), Some("https://example.org/setup.json"));

    unsafe { std::env::set_var(ENV_POPUP_TOLERANCE_PX, "-3") };
    assert!(WorkbenchConfig::from_env().unwrap().popup_tolerance_px.abs() < f64::EPSILON);

    unsafe { std::env::set_var(ENV_NUMBER_LOCALE, "fr-FR") };
    assert!(matches!(WorkbenchConfig::from_env(), Err(ConfigError::InvalidValue { .. })));
    clear_env();
}

// =============================================================================
// MapSetup
// =============================================================================

const SETUP: &str = r#"{
    "initialBasemap": "satellite",
    "overlays": {
        "rivers": {
            "sources": { "rivers": { "type": "geojson", "data": { "type": "FeatureCollection", "features": [] } } },
            "layers": [{ "id": "app-rivers", "type": "line", "source": "rivers" }]
        }
    },
    "tocItems": [{ "id": "rivers", "title": "Rivers", "mapLayerIds": ["app-rivers"] }],
    "interactiveSourceIds": ["rivers"]
}"#;

#[test]
fn setup_parses_with_defaults() {
    let setup = MapSetup::parse(SETUP).unwrap();
    assert!(setup.basemaps.is_empty());
    assert_eq!(setup.initial_basemap.as_deref(), Some("satellite"));
    assert_eq!(setup.overlays["rivers"].layers[0].id, "app-rivers");
    assert!(setup.toc_items[0].default_visible);
    assert_eq!(setup.interactive_source_ids, Some(vec!["rivers".to_string()]));
    assert_eq!(setup.interactive_layer_ids, None);
    assert_eq!(setup.app_prefixes, None);
}

#[test]
fn setup_reads_app_prefixes() {
    let setup = MapSetup::parse(r#"{ "appPrefixes": ["wild-", "survey-"] }"#).unwrap();
    assert_eq!(setup.app_prefixes, Some(vec!["wild-".to_string(), "survey-".to_string()]));
}

#[test]
fn setup_parse_error_has_code() {
    let err = MapSetup::parse("{ nope").unwrap_err();
    assert_eq!(err.error_code(), "E_CONFIG_PARSE");
}

#[tokio::test]
async fn setup_loads_from_file() {
    let path = std::env::temp_dir().join(format!("mapbench-setup-{}.json", uuid::Uuid::new_v4()));
    tokio::fs::write(&path, SETUP).await.unwrap();
    let setup = MapSetup::load(path.to_str().unwrap()).await.unwrap();
    assert_eq!(setup.toc_items.len(), 1);
    tokio::fs::remove_file(&path).await.unwrap();
}

#[tokio::test]
async fn missing_file_is_read_error() {
    let err = MapSetup::load("/nonexistent/mapbench/setup.json").await.unwrap_err();
    assert_eq!(err.error_code(), "E_CONFIG_READ");
}

#[tokio::test]
async fn unreachable_url_is_retryable_http_error() {
    let err = MapSetup::load("http://127.0.0.1:9/setup.json").await.unwrap_err();
    assert_eq!(err.error_code(), "E_CONFIG_HTTP");
    assert!(err.retryable());
}
