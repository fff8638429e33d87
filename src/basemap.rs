//! Basemap catalog: which base styles the user can pick and where they live.

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_STYLE_KEY_ENV, DEFAULT_STYLE_URL_TEMPLATE};
use crate::error::ConfigError;

/// One selectable base style.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasemapDef {
    pub id: String,
    pub label: String,
    /// Provider style slug substituted for `{style}` in the URL template.
    pub style_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl BasemapDef {
    fn new(id: &str, label: &str, style_id: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            style_id: style_id.to_string(),
            description: Some(description.to_string()),
        }
    }
}

/// The built-in entries. The first one is the fallback.
#[must_use]
pub fn default_basemaps() -> Vec<BasemapDef> {
    vec![
        BasemapDef::new("swisstopo-lbm", "swisstopo (LBM)", "ch-swisstopo-lbm", "Swiss national map, good for orientation."),
        BasemapDef::new("streets", "Streets", "streets-v2", "Classic street map."),
        BasemapDef::new("outdoor", "Outdoor", "outdoor-v2", "Terrain and outdoor look."),
        BasemapDef::new("satellite", "Satellite", "satellite", "Satellite imagery."),
    ]
}

// =============================================================================
// STYLE URLS
// =============================================================================

/// How a style slug becomes a fetchable URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleUrlTemplate {
    pub template: String,
    /// Env var holding the provider key.
    pub key_env: String,
}

impl Default for StyleUrlTemplate {
    fn default() -> Self {
        Self { template: DEFAULT_STYLE_URL_TEMPLATE.to_string(), key_env: DEFAULT_STYLE_KEY_ENV.to_string() }
    }
}

impl StyleUrlTemplate {
    /// Expand the template for `style_id`.
    ///
    /// # Errors
    ///
    /// Returns `MissingEnv` if the template needs `{key}` and the key env var is unset.
    pub fn expand(&self, style_id: &str) -> Result<String, ConfigError> {
        let url = self.template.replace("{style}", style_id);
        if !url.contains("{key}") {
            return Ok(url);
        }
        let key = std::env::var(&self.key_env).map_err(|_| ConfigError::MissingEnv { var: self.key_env.clone() })?;
        Ok(url.replace("{key}", &key))
    }
}

// =============================================================================
// CATALOG
// =============================================================================

/// Ordered basemap list with lookup and fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasemapCatalog {
    entries: Vec<BasemapDef>,
}

impl Default for BasemapCatalog {
    fn default() -> Self {
        Self { entries: default_basemaps() }
    }
}

impl BasemapCatalog {
    /// Build from `entries`; an empty list falls back to the defaults.
    #[must_use]
    pub fn new(entries: Vec<BasemapDef>) -> Self {
        if entries.is_empty() { Self::default() } else { Self { entries } }
    }

    #[must_use]
    pub fn entries(&self) -> &[BasemapDef] {
        &self.entries
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|b| b.id == id)
    }

    /// Entry for `id`, or the first entry when `id` is unknown.
    #[must_use]
    pub fn resolve(&self, id: &str) -> &BasemapDef {
        self.entries.iter().find(|b| b.id == id).unwrap_or(&self.entries[0])
    }

    #[must_use]
    pub fn first_id(&self) -> &str {
        &self.entries[0].id
    }
}

#[cfg(test)]
#[path = "basemap_test.rs"]
mod basemap_test;
