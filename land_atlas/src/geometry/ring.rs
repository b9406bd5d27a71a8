//! Closed polygon boundaries.

use serde::{Deserialize, Serialize};

use super::{distinct_count, Coordinate};
use crate::error::{AtlasError, Result};

/// Minimum number of coordinates in a closed ring (three vertices plus closure).
pub const MIN_RING_LEN: usize = 4;

/// A validated, closed sequence of coordinates describing a parcel boundary.
///
/// A ring always has at least [`MIN_RING_LEN`] coordinates, at least three
/// distinct vertices, and its first coordinate equals its last one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Coordinate>", into = "Vec<Coordinate>")]
pub struct Ring(Vec<Coordinate>);

impl Ring {
    /// Validates an already closed coordinate sequence.
    pub fn new(coords: Vec<Coordinate>) -> Result<Self> {
        if coords.len() < MIN_RING_LEN {
            return Err(AtlasError::InvalidGeometry(format!(
                "ring needs at least {} coordinates, got {}",
                MIN_RING_LEN,
                coords.len()
            )));
        }
        if let Some(bad) = coords.iter().find(|c| !c.is_finite()) {
            return Err(AtlasError::InvalidGeometry(format!(
                "non-finite coordinate ({}, {})",
                bad.lon, bad.lat
            )));
        }
        if coords.first() != coords.last() {
            return Err(AtlasError::InvalidGeometry(
                "ring is not closed: first and last coordinates differ".into(),
            ));
        }
        if distinct_count(&coords[..coords.len() - 1]) < 3 {
            return Err(AtlasError::InvalidGeometry(
                "ring collapses to fewer than three distinct points".into(),
            ));
        }
        Ok(Self(coords))
    }

    /// Closes an open vertex list (as most drawing tools report it) and validates it.
    pub fn close(mut vertices: Vec<Coordinate>) -> Result<Self> {
        if let (Some(first), Some(last)) = (vertices.first().copied(), vertices.last()) {
            if first != *last {
                vertices.push(first);
            }
        }
        Self::new(vertices)
    }

    /// All coordinates including the closing one.
    pub fn coords(&self) -> &[Coordinate] {
        &self.0
    }

    /// Vertices without the repeated closing coordinate.
    pub fn vertices(&self) -> &[Coordinate] {
        &self.0[..self.0.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false` for a validated ring.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The same boundary traversed in the opposite direction.
    pub fn reversed(&self) -> Self {
        let mut coords = self.0.clone();
        coords.reverse();
        Self(coords)
    }

    /// Converts into a `geo_types` polygon without holes.
    pub fn to_polygon(&self) -> geo_types::Polygon<f64> {
        let exterior: Vec<geo_types::Coord<f64>> = self.0.iter().map(|c| (*c).into()).collect();
        geo_types::Polygon::new(geo_types::LineString::from(exterior), Vec::new())
    }
}

impl TryFrom<Vec<Coordinate>> for Ring {
    type Error = AtlasError;

    fn try_from(value: Vec<Coordinate>) -> Result<Self> {
        Ring::new(value)
    }
}

impl From<Ring> for Vec<Coordinate> {
    fn from(value: Ring) -> Self {
        value.0
    }
}
