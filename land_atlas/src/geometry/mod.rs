//! Pure geometry helpers for parcel rings: area, centroid and bounds.

pub mod coordinate;
pub mod ring;

pub use coordinate::Coordinate;
pub use ring::{Ring, MIN_RING_LEN};

use serde::{Deserialize, Serialize};

use crate::error::{AtlasError, Result};

/// Empirical meters per degree, applied to both axes.
///
/// This is only accurate near the equator and for small parcels; longitude
/// shrinks with `cos(lat)` which this factor ignores.
pub const DEGREES_TO_METERS: f64 = 111_320.0;

pub const SQUARE_METERS_PER_HECTARE: f64 = 10_000.0;

/// Latitude beyond which the fixed degree scale overstates area noticeably.
pub const HIGH_LATITUDE_DEG: f64 = 30.0;

/// Bounding-box span (either axis, degrees) above which a parcel counts as large.
pub const LARGE_EXTENT_DEG: f64 = 0.1;

/// Twice the signed planar area of a coordinate sequence in square degrees.
///
/// The sequence is treated as implicitly closed.
fn shoelace(points: &[Coordinate]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..points.len() {
        let j = (i + 1) % points.len();
        sum += points[i].lon * points[j].lat - points[j].lon * points[i].lat;
    }
    sum
}

/// Unsigned planar area in square degrees.
pub fn planar_area(points: &[Coordinate]) -> f64 {
    shoelace(points).abs() * 0.5
}

/// Approximate ground area of a ring in square meters.
///
/// Applies the shoelace formula to raw degrees then scales both axes by
/// [`DEGREES_TO_METERS`]. This is not a geodesic area.
pub fn ring_area(ring: &Ring) -> f64 {
    planar_area(ring.vertices()) * DEGREES_TO_METERS * DEGREES_TO_METERS
}

pub fn square_meters_to_hectares(area: f64) -> f64 {
    area / SQUARE_METERS_PER_HECTARE
}

/// Strips the closing coordinate of a closed sequence.
fn open_part(points: &[Coordinate]) -> &[Coordinate] {
    if points.len() > 1 && points.first() == points.last() {
        &points[..points.len() - 1]
    } else {
        points
    }
}

pub(crate) fn distinct_count(points: &[Coordinate]) -> usize {
    let mut seen: Vec<Coordinate> = Vec::with_capacity(points.len());
    for p in points {
        if !seen.contains(p) {
            seen.push(*p);
        }
    }
    seen.len()
}

fn require_three_distinct(points: &[Coordinate]) -> Result<&[Coordinate]> {
    let open = open_part(points);
    if distinct_count(open) < 3 {
        return Err(AtlasError::InvalidGeometry(format!(
            "expected at least 3 distinct points, got {}",
            distinct_count(open)
        )));
    }
    Ok(open)
}

/// Arithmetic mean of the ring's vertices (closing coordinate excluded).
pub fn centroid(points: &[Coordinate]) -> Result<Coordinate> {
    let open = require_three_distinct(points)?;
    let n = open.len() as f64;
    let (lon, lat) = open
        .iter()
        .fold((0.0, 0.0), |(x, y), c| (x + c.lon, y + c.lat));
    Ok(Coordinate::new(lon / n, lat / n))
}

/// Axis-aligned bounds of the ring's vertices.
pub fn bounds(points: &[Coordinate]) -> Result<Bounds> {
    let open = require_three_distinct(points)?;
    // require_three_distinct guarantees at least one point
    let mut b = Bounds::point(open[0]);
    for c in &open[1..] {
        b.expand(*c);
    }
    Ok(b)
}

/// Axis-aligned box in canonical coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Coordinate,
    pub max: Coordinate,
}

impl Bounds {
    /// Zero-sized box around one coordinate.
    pub fn point(c: Coordinate) -> Self {
        Self { min: c, max: c }
    }

    pub fn expand(&mut self, c: Coordinate) {
        self.min.lon = self.min.lon.min(c.lon);
        self.min.lat = self.min.lat.min(c.lat);
        self.max.lon = self.max.lon.max(c.lon);
        self.max.lat = self.max.lat.max(c.lat);
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        let mut out = *self;
        out.expand(other.min);
        out.expand(other.max);
        out
    }

    /// Union of several boxes, `None` for an empty input.
    pub fn union_all<'a, I>(iter: I) -> Option<Bounds>
    where
        I: IntoIterator<Item = &'a Bounds>,
    {
        iter.into_iter().fold(None, |acc, b| match acc {
            None => Some(*b),
            Some(a) => Some(a.union(b)),
        })
    }

    pub fn width(&self) -> f64 {
        self.max.lon - self.min.lon
    }

    pub fn height(&self) -> f64 {
        self.max.lat - self.min.lat
    }

    pub fn center(&self) -> Coordinate {
        Coordinate::new(
            (self.min.lon + self.max.lon) / 2.0,
            (self.min.lat + self.max.lat) / 2.0,
        )
    }

    /// A box with no area cannot be framed by a camera.
    pub fn is_degenerate(&self) -> bool {
        !(self.width() > 0.0 && self.height() > 0.0)
    }
}

fn orientation(a: Coordinate, b: Coordinate, c: Coordinate) -> f64 {
    (b.lon - a.lon) * (c.lat - a.lat) - (b.lat - a.lat) * (c.lon - a.lon)
}

fn segments_cross(a1: Coordinate, a2: Coordinate, b1: Coordinate, b2: Coordinate) -> bool {
    let d1 = orientation(b1, b2, a1);
    let d2 = orientation(b1, b2, a2);
    let d3 = orientation(a1, a2, b1);
    let d4 = orientation(a1, a2, b2);
    ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
}

/// Returns `true` when two non-adjacent edges of the ring properly cross.
pub fn is_self_intersecting(ring: &Ring) -> bool {
    let pts = ring.coords();
    let edges = pts.len() - 1;
    for i in 0..edges {
        for j in (i + 2)..edges {
            // first and last edge share the closing vertex
            if i == 0 && j == edges - 1 {
                continue;
            }
            if segments_cross(pts[i], pts[i + 1], pts[j], pts[j + 1]) {
                return true;
            }
        }
    }
    false
}

/// Known accuracy limitations attached to a computed parcel area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaCaveat {
    /// Area uses a fixed planar degree scale rather than a geodesic formula.
    PlanarApproximation,
    /// Edges cross; the shoelace sum partially cancels and understates area.
    SelfIntersecting,
    /// Far from the equator the longitude scale is overstated.
    HighLatitude,
    /// The parcel is large enough for the flat-earth assumption to drift.
    LargeExtent,
}

impl AreaCaveat {
    pub fn message(&self) -> &'static str {
        match self {
            AreaCaveat::PlanarApproximation => {
                "Area is a planar approximation (111,320 m per degree on both axes)"
            }
            AreaCaveat::SelfIntersecting => {
                "Boundary edges cross each other; the computed area is unreliable"
            }
            AreaCaveat::HighLatitude => {
                "Parcel lies at high latitude; the approximation overstates area"
            }
            AreaCaveat::LargeExtent => {
                "Parcel is large; the approximation error grows with size"
            }
        }
    }
}

/// Collects every caveat that applies to the area of `ring`.
pub fn area_caveats(ring: &Ring) -> Vec<AreaCaveat> {
    let mut caveats = vec![AreaCaveat::PlanarApproximation];
    if is_self_intersecting(ring) {
        caveats.push(AreaCaveat::SelfIntersecting);
    }
    if let Ok(c) = centroid(ring.coords()) {
        if c.lat.abs() > HIGH_LATITUDE_DEG {
            caveats.push(AreaCaveat::HighLatitude);
        }
    }
    if let Ok(b) = bounds(ring.coords()) {
        if b.width() > LARGE_EXTENT_DEG || b.height() > LARGE_EXTENT_DEG {
            caveats.push(AreaCaveat::LargeExtent);
        }
    }
    caveats
}
