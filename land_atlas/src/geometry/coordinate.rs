//! Canonical coordinate type used throughout the crate.

use serde::{Deserialize, Serialize};

/// A geographic position in decimal degrees, always stored as (longitude, latitude).
///
/// Serialized as a two element `[lon, lat]` array, the same order GeoJSON uses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Coordinate {
    pub lon: f64,
    pub lat: f64,
}

impl Coordinate {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Returns `true` when both components are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.lon.is_finite() && self.lat.is_finite()
    }
}

impl From<[f64; 2]> for Coordinate {
    fn from(value: [f64; 2]) -> Self {
        Self::new(value[0], value[1])
    }
}

impl From<Coordinate> for [f64; 2] {
    fn from(value: Coordinate) -> Self {
        [value.lon, value.lat]
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from(value: (f64, f64)) -> Self {
        Self::new(value.0, value.1)
    }
}

impl From<Coordinate> for geo_types::Coord<f64> {
    fn from(value: Coordinate) -> Self {
        geo_types::coord! { x: value.lon, y: value.lat }
    }
}

impl From<geo_types::Coord<f64>> for Coordinate {
    fn from(value: geo_types::Coord<f64>) -> Self {
        Self::new(value.x, value.y)
    }
}
