//! External raster services (WMS / WMTS) added at runtime as TOC items.
//!
//! DESIGN
//! ======
//! A [`WmsLayerConfig`] becomes one raster source and one raster layer, both
//! with the config id (`wms:*`), plus a dynamic TOC item owning that layer.
//! A base URL that already contains `{z}` is taken as a tile template;
//! anything else gets a WMS 1.3.0 GetMap query with the renderer's
//! `{bbox-epsg-3857}` placeholder.

use std::collections::BTreeMap;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ConfigError;
use crate::overlay::OverlayDefinition;
use crate::surface::{LayerSpec, LayerType, SourceSpec};
use crate::toc::TocItemConfig;

/// Id prefix of every dynamic WMS item.
pub const WMS_ID_PREFIX: &str = "wms:";

const TILE_SIZE: u32 = 256;
const BBOX_PLACEHOLDER: &str = "{bbox-epsg-3857}";
const SWISSTOPO_LEGEND_BASE: &str = "https://api3.geo.admin.ch/rest/services/ech/MapServer";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WmsFormat {
    #[default]
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/jpeg")]
    Jpeg,
}

impl WmsFormat {
    #[must_use]
    pub fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }

    /// Anything but jpeg is png.
    fn parse_lenient(s: &str) -> Self {
        if s.trim() == "image/jpeg" { Self::Jpeg } else { Self::Png }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WmsLayerConfig {
    pub id: String,
    pub title: String,
    pub base_url: String,
    /// Comma separated layer names.
    pub layers: String,
    #[serde(default)]
    pub format: WmsFormat,
    #[serde(default = "default_transparent")]
    pub transparent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
}

fn default_transparent() -> bool {
    true
}

fn clamp01(n: f64) -> f64 {
    if n.is_finite() { n.clamp(0.0, 1.0) } else { 1.0 }
}

impl WmsLayerConfig {
    /// Read a config from share-link query parameters (`wmsUrl`, `wmsLayers`,
    /// `wmsId`, `wmsTitle`, `wmsFormat`, `wmsTransparent`, `wmsOpacity`).
    /// Returns `None` unless both URL and layers are present.
    #[must_use]
    pub fn from_query(query: &str) -> Option<Self> {
        let Ok(mut url) = Url::parse("mapbench:/") else {
            return None;
        };
        url.set_query(Some(query.trim_start_matches('?')));
        let params: BTreeMap<String, String> = url.query_pairs().into_owned().collect();
        let get = |k: &str| params.get(k).map(|v| v.trim()).filter(|v| !v.is_empty());

        let base_url = get("wmsUrl")?.to_string();
        let layers = get("wmsLayers")?.to_string();
        let raw_id = get("wmsId").unwrap_or("layer");
        let title = get("wmsTitle").unwrap_or(raw_id).to_string();
        let opacity = get("wmsOpacity").map(|v| v.parse::<f64>().map_or(1.0, clamp01));

        Some(Self {
            id: format!("{WMS_ID_PREFIX}{raw_id}"),
            title,
            base_url,
            layers,
            format: get("wmsFormat").map(WmsFormat::parse_lenient).unwrap_or_default(),
            transparent: params.get("wmsTransparent").is_none_or(|v| v != "false"),
            opacity,
        })
    }

    fn effective_opacity(&self) -> f64 {
        self.opacity.map_or(1.0, clamp01)
    }

    fn parse_base(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.base_url)
            .map_err(|_| ConfigError::InvalidValue { var: "baseUrl".into(), value: self.base_url.clone() })
    }

    /// Tile URL template handed to the raster source.
    pub fn tile_url(&self) -> Result<String, ConfigError> {
        if self.base_url.contains("{z}") {
            return Ok(self.base_url.clone());
        }
        let url = with_params(
            self.parse_base()?,
            &[
                ("SERVICE", "WMS"),
                ("VERSION", "1.3.0"),
                ("REQUEST", "GetMap"),
                ("LAYERS", &self.layers),
                ("STYLES", ""),
                ("CRS", "EPSG:3857"),
                ("BBOX", BBOX_PLACEHOLDER),
                ("WIDTH", "256"),
                ("HEIGHT", "256"),
                ("FORMAT", self.format.mime()),
                ("TRANSPARENT", if self.transparent { "TRUE" } else { "FALSE" }),
            ],
        );
        // The renderer substitutes the placeholder literally, so it must stay unescaped.
        Ok(url.as_str().replace("%7Bbbox-epsg-3857%7D", BBOX_PLACEHOLDER))
    }

    fn is_swisstopo(&self, layer_base: &str) -> bool {
        let host_match = Url::parse(&self.base_url)
            .is_ok_and(|u| u.host_str().is_some_and(|h| h.contains("geo.admin.ch")));
        host_match || layer_base.starts_with("ch.")
    }

    /// Legend for the first layer: swisstopo's REST legend, else WMS GetLegendGraphic.
    pub fn legend_url(&self) -> Result<String, ConfigError> {
        let base = legend_layer_base(&self.layers);
        if self.is_swisstopo(&base) {
            return Ok(format!("{SWISSTOPO_LEGEND_BASE}/{base}/legend?lang=de"));
        }
        let url = with_params(
            self.parse_base()?,
            &[
                ("SERVICE", "WMS"),
                ("REQUEST", "GetLegendGraphic"),
                ("FORMAT", "image/png"),
                ("LAYER", &base),
                ("VERSION", "1.3.0"),
                ("SLD_VERSION", "1.1.0"),
            ],
        );
        Ok(url.into())
    }

    /// Raster source and layer, both named after the config id.
    pub fn overlay(&self) -> Result<OverlayDefinition, ConfigError> {
        let mut source = json!({
            "type": "raster",
            "tiles": [self.tile_url()?],
            "tileSize": TILE_SIZE,
        });
        if self.is_swisstopo(&legend_layer_base(&self.layers)) {
            source["attribution"] = json!("© swisstopo");
        }
        let mut sources = BTreeMap::new();
        sources.insert(self.id.clone(), SourceSpec(source));
        let layers = vec![
            LayerSpec::new(self.id.clone(), LayerType::Raster)
                .with_source(self.id.clone())
                .with_paint("raster-opacity", json!(self.effective_opacity()))
                .with_paint("raster-resampling", json!("linear")),
        ];
        Ok(OverlayDefinition { sources, layers })
    }

    /// TOC entry owning the raster layer.
    #[must_use]
    pub fn toc_item(&self) -> TocItemConfig {
        let legend_url = match self.legend_url() {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(id = %self.id, error = %e, "no legend for wms layer");
                None
            }
        };
        TocItemConfig {
            map_layer_ids: vec![self.id.clone()],
            default_opacity: self.effective_opacity(),
            legend_url,
            ..TocItemConfig::new(self.id.clone(), self.title.clone())
        }
    }
}

/// Set each param, replacing any existing value under the same name.
fn with_params(mut url: Url, params: &[(&str, &str)]) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .into_owned()
        .filter(|(k, _)| params.iter().all(|(name, _)| name != k))
        .collect();
    {
        let mut q = url.query_pairs_mut();
        q.clear();
        for (k, v) in &kept {
            q.append_pair(k, v);
        }
        for (k, v) in params {
            q.append_pair(k, v);
        }
    }
    url
}

/// First layer name with geometry suffixes and template tails stripped.
fn legend_layer_base(layers: &str) -> String {
    let first = layers.split(',').next().map(str::trim).filter(|s| !s.is_empty()).unwrap_or(layers.trim());
    let mut base = first;
    for suffix in [".fill", ".line", ".circle", ".symbol", ".point"] {
        let cut = base.len().saturating_sub(suffix.len());
        if cut > 0 && base.get(cut..).is_some_and(|tail| tail.eq_ignore_ascii_case(suffix)) {
            base = base.get(..cut).unwrap_or(base);
            break;
        }
    }
    let base = base.split('{').next().unwrap_or(base);
    base.strip_suffix('.').unwrap_or(base).to_string()
}

#[cfg(test)]
#[path = "wms_test.rs"]
mod wms_test;
