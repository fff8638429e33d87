//! Workbench configuration: environment knobs and the map setup document.
//!
//! DESIGN
//! ======
//! Scalar knobs come from `MAPBENCH_*` environment variables. Numbers that do
//! not parse fall back to their defaults; enum values that do not parse are
//! errors, since silently picking another policy would change behavior.
//!
//! The setup document (basemaps, overlays, TOC items) is JSON, read from disk
//! or fetched over HTTP, and parsed once at startup.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::basemap::{BasemapDef, StyleUrlTemplate};
use crate::draw::{ModeSwitchPolicy, NumberLocale};
use crate::error::ConfigError;
use crate::overlay::OverlayDefinition;
use crate::toc::TocItemConfig;
use crate::wms::WmsLayerConfig;

pub const ENV_STYLE_URL_TEMPLATE: &str = "MAPBENCH_STYLE_URL_TEMPLATE";
pub const ENV_STYLE_KEY_ENV: &str = "MAPBENCH_STYLE_KEY_ENV";
pub const ENV_POPUP_TOLERANCE_PX: &str = "MAPBENCH_POPUP_TOLERANCE_PX";
pub const ENV_MODE_SWITCH: &str = "MAPBENCH_MODE_SWITCH";
pub const ENV_NUMBER_LOCALE: &str = "MAPBENCH_NUMBER_LOCALE";
pub const ENV_PREFS_PATH: &str = "MAPBENCH_PREFS_PATH";
pub const ENV_SETUP: &str = "MAPBENCH_SETUP";

// =============================================================================
// ENVIRONMENT
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct WorkbenchConfig {
    pub style_urls: StyleUrlTemplate,
    pub popup_tolerance_px: f64,
    pub mode_switch: ModeSwitchPolicy,
    pub number_locale: NumberLocale,
    /// Where TOC preferences persist; `None` disables persistence.
    pub prefs_path: Option<PathBuf>,
    /// File path or `http(s)://` URL of the setup document.
    pub setup: Option<String>,
}

impl Default for WorkbenchConfig {
    fn default() -> Self {
        Self {
            style_urls: StyleUrlTemplate::default(),
            popup_tolerance_px: 0.0,
            mode_switch: ModeSwitchPolicy::default(),
            number_locale: NumberLocale::default(),
            prefs_path: None,
            setup: None,
        }
    }
}

impl WorkbenchConfig {
    /// Load from `MAPBENCH_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns `InvalidValue` for an unknown mode switch policy or number locale.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let template = env_string(ENV_STYLE_URL_TEMPLATE).unwrap_or(defaults.style_urls.template);
        let key_env = env_string(ENV_STYLE_KEY_ENV).unwrap_or(defaults.style_urls.key_env);
        let tolerance = env_parse(ENV_POPUP_TOLERANCE_PX, defaults.popup_tolerance_px);

        Ok(Self {
            style_urls: StyleUrlTemplate { template, key_env },
            popup_tolerance_px: if tolerance.is_finite() { tolerance.max(0.0) } else { 0.0 },
            mode_switch: env_enum(ENV_MODE_SWITCH, defaults.mode_switch)?,
            number_locale: env_enum(ENV_NUMBER_LOCALE, defaults.number_locale)?,
            prefs_path: env_string(ENV_PREFS_PATH).map(PathBuf::from),
            setup: env_string(ENV_SETUP),
        })
    }
}

/// Non-empty value of `key`.
fn env_string(key: &str) -> Option<String> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match env_string(key).map(|v| v.parse::<T>()) {
        Some(Ok(v)) => v,
        _ => default,
    }
}

fn env_enum<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
{
    match env_string(key) {
        None => Ok(default),
        Some(v) => v.parse::<T>().map_err(|_| ConfigError::InvalidValue { var: key.to_string(), value: v }),
    }
}

// =============================================================================
// SETUP DOCUMENT
// =============================================================================

/// Everything the host app declares about its map up front.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapSetup {
    #[serde(default)]
    pub basemaps: Vec<BasemapDef>,
    #[serde(default)]
    pub initial_basemap: Option<String>,
    /// Overlay packages by name.
    #[serde(default)]
    pub overlays: BTreeMap<String, OverlayDefinition>,
    #[serde(default)]
    pub toc_items: Vec<TocItemConfig>,
    /// External raster layers added as dynamic TOC items at startup.
    #[serde(default)]
    pub wms_layers: Vec<WmsLayerConfig>,
    #[serde(default)]
    pub interactive_layer_ids: Option<Vec<String>>,
    #[serde(default)]
    pub interactive_source_ids: Option<Vec<String>>,
    #[serde(default)]
    pub label_anchor_ids: Option<Vec<String>>,
    /// Layer id prefixes owned by the application; replaces the defaults.
    #[serde(default)]
    pub app_prefixes: Option<Vec<String>>,
}

impl MapSetup {
    /// Parse a setup document.
    ///
    /// # Errors
    ///
    /// Returns `Parse` if `raw` is not a valid setup document.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Load from an `http(s)://` URL or a file path.
    ///
    /// # Errors
    ///
    /// Returns `Http`, `Read` or `Parse` depending on where loading failed.
    pub async fn load(location: &str) -> Result<Self, ConfigError> {
        if location.starts_with("http://") || location.starts_with("https://") {
            Self::fetch(location).await
        } else {
            Self::read(Path::new(location)).await
        }
    }

    async fn read(path: &Path) -> Result<Self, ConfigError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;
        let setup = Self::parse(&raw)?;
        tracing::info!(path = %path.display(), overlays = setup.overlays.len(), items = setup.toc_items.len(), "setup loaded");
        Ok(setup)
    }

    async fn fetch(url: &str) -> Result<Self, ConfigError> {
        let http = |source| ConfigError::Http { url: url.to_string(), source };
        let body = reqwest::Client::new()
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(http)?
            .text()
            .await
            .map_err(http)?;
        let setup = Self::parse(&body)?;
        tracing::info!(%url, overlays = setup.overlays.len(), items = setup.toc_items.len(), "setup fetched");
        Ok(setup)
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
