//! Map view configuration, loaded from JSON with every field defaulted.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AtlasError, Result};
use crate::geometry::Coordinate;
use crate::styles::EmphasisConfig;

/// Raster tile source consumed as an opaque configuration value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileSource {
    pub url_template: String,
    pub attribution: String,
    pub max_zoom: u8,
}

impl TileSource {
    fn new(url_template: &str, attribution: &str) -> Self {
        Self {
            url_template: url_template.to_string(),
            attribution: attribution.to_string(),
            max_zoom: 19,
        }
    }
}

/// Base imagery choices for the map background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseMapStyle {
    /// World imagery with a boundaries-and-places labels overlay.
    #[default]
    Satellite,
    Terrain,
    Osm,
}

impl BaseMapStyle {
    /// Tile sources for this style, bottom first.
    pub fn sources(&self) -> Vec<TileSource> {
        match self {
            BaseMapStyle::Satellite => vec![
                TileSource::new(
                    "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}",
                    "Esri, Maxar, Earthstar Geographics",
                ),
                TileSource::new(
                    "https://services.arcgisonline.com/ArcGIS/rest/services/Reference/World_Boundaries_and_Places/MapServer/tile/{z}/{y}/{x}",
                    "",
                ),
            ],
            BaseMapStyle::Terrain => vec![TileSource::new(
                "https://server.arcgisonline.com/ArcGIS/rest/services/World_Terrain_Base/MapServer/tile/{z}/{y}/{x}",
                "Esri",
            )],
            BaseMapStyle::Osm => vec![TileSource::new(
                "https://tile.openstreetmap.org/{z}/{x}/{y}.png",
                "OpenStreetMap contributors",
            )],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BaseMapStyle::Satellite => "satellite",
            BaseMapStyle::Terrain => "terrain",
            BaseMapStyle::Osm => "osm",
        }
    }
}

impl FromStr for BaseMapStyle {
    type Err = AtlasError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "satellite" => Ok(BaseMapStyle::Satellite),
            "terrain" => Ok(BaseMapStyle::Terrain),
            "osm" | "openstreetmap" => Ok(BaseMapStyle::Osm),
            other => Err(AtlasError::InvalidValue(format!("unknown base map style '{other}'"))),
        }
    }
}

impl fmt::Display for BaseMapStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bounded retry schedule for a render surface that is not laid out yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay_ms: 100,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based), growing linearly.
    pub fn delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.delay_ms.saturating_mul(attempt as u64))
    }
}

/// Settings for one mounted map view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtlasConfig {
    /// Camera center used when there is nothing to frame.
    pub default_center: Coordinate,
    pub default_zoom: u8,
    /// Padding around framed bounds, in screen pixels.
    pub fit_padding_px: u32,
    pub surface_retry: RetryPolicy,
    pub emphasis: EmphasisConfig,
    pub base_style: BaseMapStyle,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            default_center: Coordinate::new(78.9629, 20.5937),
            default_zoom: 5,
            fit_padding_px: 20,
            surface_retry: RetryPolicy::default(),
            emphasis: EmphasisConfig::default(),
            base_style: BaseMapStyle::default(),
        }
    }
}

impl AtlasConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: &str) -> Result<Self> {
        let contents = crate::io::read_to_string(path)?;
        let config = Self::from_json_str(&contents)?;
        log::debug!("loaded map configuration from {path}");
        Ok(config)
    }

    pub fn write_json_file(&self, path: &str) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        crate::io::write_string(path, &json)?;
        Ok(())
    }
}
