use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::geometry::{ring_area, square_meters_to_hectares, Ring};
use crate::gis::Attributes;
use crate::styles::FeatureStatus;

/// Opaque, immutable parcel identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParcelId(String);

impl ParcelId {
    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ParcelId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ParcelId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ParcelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Representation of a land parcel defined by a closed boundary.
///
/// The area is derived from the ring and recomputed on every ring change.
#[derive(Debug, Clone, PartialEq)]
pub struct Parcel {
    id: ParcelId,
    ring: Ring,
    area_square_meters: f64,
    attributes: Attributes,
    status: FeatureStatus,
}

impl Parcel {
    /// Creates a new parcel with a generated id and no attributes.
    pub fn new(ring: Ring, status: FeatureStatus) -> Self {
        Self::with_id(ParcelId::generate(), ring, status)
    }

    /// Creates a parcel with a known id, e.g. when loading from a store.
    pub fn with_id(id: ParcelId, ring: Ring, status: FeatureStatus) -> Self {
        let area_square_meters = ring_area(&ring);
        Self {
            id,
            ring,
            area_square_meters,
            attributes: Attributes::new(),
            status,
        }
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn id(&self) -> &ParcelId {
        &self.id
    }

    pub fn ring(&self) -> &Ring {
        &self.ring
    }

    /// Approximate ground area in square meters.
    pub fn area(&self) -> f64 {
        self.area_square_meters
    }

    pub fn hectares(&self) -> f64 {
        square_meters_to_hectares(self.area_square_meters)
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn status(&self) -> FeatureStatus {
        self.status
    }

    /// Replaces the boundary and recomputes the area.
    pub fn set_ring(&mut self, ring: Ring) {
        self.area_square_meters = ring_area(&ring);
        self.ring = ring;
    }

    pub fn set_attribute(&mut self, key: &str, value: Value) {
        self.attributes.insert(key.to_string(), value);
    }

    /// Merges `attributes` into the parcel, overwriting existing keys.
    pub fn merge_attributes(&mut self, attributes: Attributes) {
        for (k, v) in attributes {
            self.attributes.insert(k, v);
        }
    }
}
