//! GeoJSON codec for parcel boundaries.
//!
//! Positions are read and written in `[lon, lat]` order, matching the
//! canonical coordinate order of the engine.

use std::str::FromStr;

use geojson::{feature::Id, FeatureCollection, GeoJson, Geometry, Value};

use crate::error::{AtlasError, Result};
use crate::geometry::{Coordinate, Ring};
use crate::gis::{Attributes, Feature};
use crate::parcel::Parcel;

fn ring_from_positions(positions: &[Vec<f64>]) -> Result<Ring> {
    let coords = positions
        .iter()
        .map(|p| match p.as_slice() {
            [lon, lat, ..] => Ok(Coordinate::new(*lon, *lat)),
            _ => Err(AtlasError::InvalidGeometry(
                "position needs at least two values".into(),
            )),
        })
        .collect::<Result<Vec<_>>>()?;
    Ring::new(coords)
}

/// Outer rings of a polygonal geometry; other geometry types yield nothing.
fn outer_rings(value: &Value) -> Vec<Result<Ring>> {
    match value {
        Value::Polygon(rings) => rings.first().map(|r| ring_from_positions(r)).into_iter().collect(),
        Value::MultiPolygon(polys) => polys
            .iter()
            .filter_map(|rings| rings.first())
            .map(|r| ring_from_positions(r))
            .collect(),
        Value::GeometryCollection(geoms) => geoms.iter().flat_map(|g| outer_rings(&g.value)).collect(),
        _ => Vec::new(),
    }
}

fn id_to_string(id: &Id) -> String {
    match id {
        Id::String(s) => s.clone(),
        Id::Number(n) => n.to_string(),
    }
}

fn push_features(
    out: &mut Vec<Feature<Ring>>,
    geometry: Option<&Geometry>,
    id: Option<&Id>,
    properties: Option<&Attributes>,
) {
    let Some(geometry) = geometry else {
        log::warn!("skipping feature without geometry");
        return;
    };
    let rings = outer_rings(&geometry.value);
    let multi = rings.len() > 1;
    for (part, ring) in rings.into_iter().enumerate() {
        match ring {
            Ok(ring) => {
                let mut feature =
                    Feature::with_attributes(ring, properties.cloned().unwrap_or_default());
                feature.class = id.map(|id| {
                    let id = id_to_string(id);
                    if multi {
                        format!("{id}-{part}")
                    } else {
                        id
                    }
                });
                out.push(feature);
            }
            Err(err) => log::warn!("skipping invalid polygon: {err}"),
        }
    }
}

/// Polygon features of a collection; invalid rings are skipped with a warning.
pub fn features_from_collection(collection: &FeatureCollection) -> Vec<Feature<Ring>> {
    let mut out = Vec::new();
    for f in &collection.features {
        push_features(&mut out, f.geometry.as_ref(), f.id.as_ref(), f.properties.as_ref());
    }
    out
}

/// Parses polygon features from a GeoJSON document.
///
/// Accepts a FeatureCollection, a single Feature or a bare Geometry. Invalid
/// rings and non-polygonal geometries are skipped with a warning. The feature
/// id, if any, is carried in [`Feature::class`].
pub fn read_features(json: &str) -> Result<Vec<Feature<Ring>>> {
    let document = GeoJson::from_str(json)?;
    let mut out = Vec::new();
    match &document {
        GeoJson::FeatureCollection(fc) => out = features_from_collection(fc),
        GeoJson::Feature(f) => {
            push_features(&mut out, f.geometry.as_ref(), f.id.as_ref(), f.properties.as_ref())
        }
        GeoJson::Geometry(g) => push_features(&mut out, Some(g), None, None),
    }
    Ok(out)
}

/// Reads polygon features from a GeoJSON file.
pub fn read_features_file(path: &str) -> Result<Vec<Feature<Ring>>> {
    let contents = super::read_to_string(path)?;
    read_features(&contents)
}

fn polygon_value(ring: &Ring) -> Value {
    Value::from(&ring.to_polygon())
}

fn to_geojson_feature(id: Option<String>, ring: &Ring, attributes: &Attributes) -> geojson::Feature {
    geojson::Feature {
        bbox: None,
        geometry: Some(Geometry::new(polygon_value(ring))),
        id: id.map(Id::String),
        properties: Some(attributes.clone()),
        foreign_members: None,
    }
}

/// Builds a FeatureCollection from loose features.
pub fn features_to_collection(features: &[Feature<Ring>]) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: features
            .iter()
            .map(|f| to_geojson_feature(f.class.clone(), &f.geometry, &f.attributes))
            .collect(),
        foreign_members: None,
    }
}

/// Builds a FeatureCollection from parcels, keeping their ids and adding the
/// derived area.
pub fn parcels_to_collection<'a, I>(parcels: I) -> FeatureCollection
where
    I: IntoIterator<Item = &'a Parcel>,
{
    FeatureCollection {
        bbox: None,
        features: parcels
            .into_iter()
            .map(|p| {
                let mut attributes = p.attributes().clone();
                attributes
                    .entry("areaSquareMeters")
                    .or_insert_with(|| serde_json::json!(p.area()));
                to_geojson_feature(Some(p.id().to_string()), p.ring(), &attributes)
            })
            .collect(),
        foreign_members: None,
    }
}

/// Serializes features as a pretty printed GeoJSON FeatureCollection.
pub fn write_features_string(features: &[Feature<Ring>]) -> Result<String> {
    let doc = GeoJson::FeatureCollection(features_to_collection(features));
    Ok(serde_json::to_string_pretty(&doc)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SQUARE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "id": "p1",
                "properties": {"Village": "X", "Area": 5},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0,0],[0,0.001],[0.001,0.001],[0.001,0],[0,0]]]
                }
            },
            {
                "type": "Feature",
                "properties": {"name": "open"},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0,0],[0,1],[1,1]]]
                }
            },
            {
                "type": "Feature",
                "properties": {},
                "geometry": {"type": "Point", "coordinates": [1, 2]}
            }
        ]
    }"#;

    #[test]
    fn reads_valid_polygons_only() {
        let features = read_features(SQUARE).unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].class.as_deref(), Some("p1"));
        assert_eq!(features[0].attributes["Village"], json!("X"));
        assert_eq!(features[0].geometry.coords()[1], Coordinate::new(0.0, 0.001));
    }

    #[test]
    fn multipolygon_parts_get_suffixed_ids() {
        let doc = r#"{"type":"Feature","id":7,"properties":null,"geometry":{
            "type":"MultiPolygon",
            "coordinates":[
                [[[0,0],[0,1],[1,1],[0,0]]],
                [[[5,5],[5,6],[6,6],[5,5]]]
            ]}}"#;
        let features = read_features(doc).unwrap();
        let ids: Vec<_> = features.iter().filter_map(|f| f.class.as_deref()).collect();
        assert_eq!(ids, vec!["7-0", "7-1"]);
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(read_features("{not json").is_err());
    }

    #[test]
    fn written_collection_reads_back() {
        let features = read_features(SQUARE).unwrap();
        let json = write_features_string(&features).unwrap();
        let again = read_features(&json).unwrap();
        assert_eq!(again, features);
    }
}
