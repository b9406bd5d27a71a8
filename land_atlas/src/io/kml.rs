use std::io;

use kml::types::{Geometry as KmlGeometry, Placemark, Polygon as KmlPolygon};
use kml::{Kml, KmlWriter};

use crate::geometry::Ring;

fn placemark(name: &str, ring: &Ring) -> Kml {
    let polygon: KmlPolygon<f64> = ring.to_polygon().into();
    Kml::Placemark(Placemark {
        name: Some(name.to_string()),
        geometry: Some(KmlGeometry::Polygon(polygon)),
        ..Default::default()
    })
}

/// Encodes named rings as a KML document of polygon placemarks.
pub fn rings_to_kml<'a, I>(rings: I) -> io::Result<Vec<u8>>
where
    I: IntoIterator<Item = (&'a str, &'a Ring)>,
{
    let placemarks: Vec<Kml> = rings
        .into_iter()
        .map(|(name, ring)| placemark(name, ring))
        .collect();
    let doc = Kml::Document {
        attrs: Default::default(),
        elements: placemarks,
    };
    let mut buf = Vec::new();
    KmlWriter::<_, f64>::from_writer(&mut buf)
        .write(&doc)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    Ok(buf)
}
