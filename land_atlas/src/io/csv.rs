//! Vertex table export: one row per ring vertex.

use std::fmt::Write as _;

use crate::geometry::Ring;

pub const CSV_HEADER: &str = "parcel_id,vertex,lon,lat";

fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Formats rings as `parcel_id,vertex,lon,lat` rows, closing vertex included.
pub fn vertices_to_csv<'a, I>(rings: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a Ring)>,
{
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for (id, ring) in rings {
        let id = quote(id);
        for (idx, c) in ring.coords().iter().enumerate() {
            let _ = writeln!(out, "{id},{idx},{},{}", c.lon, c.lat);
        }
    }
    out
}
