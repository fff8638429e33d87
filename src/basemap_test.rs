use super::*;

#[test]
fn default_catalog_has_four_entries() {
    let cat = BasemapCatalog::default();
    let ids: Vec<&str> = cat.entries().iter().map(|b| b.id.as_str()).collect();
    assert_eq!(ids, vec!["swisstopo-lbm", "streets", "outdoor", "satellite"]);
    assert_eq!(cat.first_id(), "swisstopo-lbm");
}

#[test]
fn unknown_id_falls_back_to_first() {
    let cat = BasemapCatalog::default();
    assert_eq!(cat.resolve("satellite").style_id, "satellite");
    assert_eq!(cat.resolve("nope").id, "swisstopo-lbm");
    assert!(!cat.contains("nope"));
}

#[test]
fn empty_catalog_uses_defaults() {
    assert_eq!(BasemapCatalog::new(Vec::new()), BasemapCatalog::default());
}

#[test]
fn template_without_key_needs_no_env() {
    let t = StyleUrlTemplate { template: "style://{style}".into(), key_env: "MAPBENCH_TEST_UNSET_KEY".into() };
    assert_eq!(t.expand("streets-v2").unwrap(), "style://streets-v2");
}

#[test]
fn template_with_key_reads_env() {
    unsafe { std::env::set_var("MAPBENCH_TEST_BASEMAP_KEY", "k123") };
    let t = StyleUrlTemplate { template: DEFAULT_STYLE_URL_TEMPLATE.into(), key_env: "MAPBENCH_TEST_BASEMAP_KEY".into() };
    assert_eq!(t.expand("outdoor-v2").unwrap(), "https://api.maptiler.com/maps/outdoor-v2/style.json?key=k123");
    unsafe { std::env::remove_var("MAPBENCH_TEST_BASEMAP_KEY") };
}

#[test]
fn template_with_missing_key_errors() {
    let t = StyleUrlTemplate { template: DEFAULT_STYLE_URL_TEMPLATE.into(), key_env: "MAPBENCH_TEST_MISSING_KEY".into() };
    let err = t.expand("streets-v2").unwrap_err();
    assert!(matches!(err, ConfigError::MissingEnv { var } if var == "MAPBENCH_TEST_MISSING_KEY"));
}

#[test]
fn basemap_def_camel_case() {
    let def: BasemapDef =
        serde_json::from_str(r#"{"id":"topo","label":"Topo","styleId":"topo-v2"}"#).unwrap();
    assert_eq!(def.style_id, "topo-v2");
    assert!(def.description.is_none());
}
