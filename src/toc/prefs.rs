//! Best-effort persistence of TOC state as flat `{id: value}` maps.
//!
//! Reading never fails the caller in practice: a missing file, a corrupt
//! document or a single bad entry all degrade to the item defaults.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PrefsError;

use super::store::TocStore;

/// Snapshot of user-adjustable TOC state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TocPrefs {
    #[serde(default)]
    pub order: Vec<String>,
    #[serde(default)]
    pub visible: BTreeMap<String, Value>,
    #[serde(default)]
    pub labels_visible: BTreeMap<String, Value>,
    #[serde(default)]
    pub opacity: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basemap_id: Option<String>,
}

impl TocPrefs {
    /// Capture the store's current state.
    #[must_use]
    pub fn capture(store: &TocStore, basemap_id: Option<&str>) -> Self {
        let mut prefs = Self { order: store.order().to_vec(), basemap_id: basemap_id.map(str::to_string), ..Self::default() };
        for item in store.items() {
            let id = &item.id;
            prefs.visible.insert(id.clone(), Value::Bool(store.visible(id)));
            prefs.labels_visible.insert(id.clone(), Value::Bool(store.labels_visible(id)));
            prefs.opacity.insert(id.clone(), Value::from(store.opacity(id)));
        }
        prefs
    }

    /// Parse leniently: fields of the wrong shape are treated as absent.
    ///
    /// # Errors
    ///
    /// Returns `Json` only if `raw` is not JSON at all.
    pub fn parse(raw: &str) -> Result<Self, PrefsError> {
        let doc: Value = serde_json::from_str(raw)?;
        let Value::Object(map) = doc else {
            tracing::warn!("toc prefs are not an object; ignored");
            return Ok(Self::default());
        };
        let flat = |key: &str| -> BTreeMap<String, Value> {
            match map.get(key) {
                Some(Value::Object(m)) => m.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                _ => BTreeMap::new(),
            }
        };
        let order = match map.get("order") {
            Some(Value::Array(a)) => a.iter().filter_map(Value::as_str).map(str::to_string).collect(),
            _ => Vec::new(),
        };
        Ok(Self {
            order,
            visible: flat("visible"),
            labels_visible: flat("labelsVisible"),
            opacity: flat("opacity"),
            basemap_id: map.get("basemapId").and_then(Value::as_str).map(str::to_string),
        })
    }

    /// Write valid entries into `store`. Unknown ids and wrongly typed values
    /// are skipped. Returns how many values were restored.
    pub fn restore_into(&self, store: &mut TocStore) -> usize {
        let mut restored = 0;
        for (id, v) in &self.visible {
            match v.as_bool() {
                Some(b) if store.set_visible(id, b) => restored += 1,
                _ => tracing::debug!(item = %id, "visible pref skipped"),
            }
        }
        for (id, v) in &self.labels_visible {
            match v.as_bool() {
                Some(b) if store.set_labels_visible(id, b) => restored += 1,
                _ => tracing::debug!(item = %id, "labelsVisible pref skipped"),
            }
        }
        for (id, v) in &self.opacity {
            match v.as_f64().filter(|o| o.is_finite()) {
                Some(o) if store.set_opacity(id, o) => restored += 1,
                _ => tracing::debug!(item = %id, "opacity pref skipped"),
            }
        }
        if !self.order.is_empty() {
            store.set_order(&self.order);
        }
        restored
    }
}

/// Read prefs from `path`.
///
/// # Errors
///
/// Returns `Io` if the file cannot be read, `Json` if it is not JSON.
pub async fn load(path: &Path) -> Result<TocPrefs, PrefsError> {
    let raw = tokio::fs::read_to_string(path).await?;
    TocPrefs::parse(&raw)
}

/// Like [`load`], but any failure yields empty prefs.
pub async fn load_or_default(path: &Path) -> TocPrefs {
    match load(path).await {
        Ok(p) => p,
        Err(PrefsError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => TocPrefs::default(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "toc prefs unreadable; using defaults");
            TocPrefs::default()
        }
    }
}

/// Write prefs to `path` as pretty JSON.
///
/// # Errors
///
/// Returns `Io` or `Json` on failure.
pub async fn save(path: &Path, prefs: &TocPrefs) -> Result<(), PrefsError> {
    let raw = serde_json::to_string_pretty(prefs)?;
    tokio::fs::write(path, raw).await?;
    Ok(())
}

#[cfg(test)]
#[path = "prefs_test.rs"]
mod prefs_test;
