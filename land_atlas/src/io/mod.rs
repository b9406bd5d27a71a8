//! File input and output helpers for layer data.

use std::fs::File;
use std::io::{self, Read, Write};

pub mod csv;
pub mod geojson;
#[cfg(feature = "kml")]
pub mod kml;

/// Reads a file to string.
pub fn read_to_string(path: &str) -> io::Result<String> {
    let mut buffer = String::new();
    File::open(path)?.read_to_string(&mut buffer)?;
    Ok(buffer)
}

/// Writes a string to a file, replacing any previous content.
pub fn write_string(path: &str, contents: &str) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(contents.as_bytes())
}

/// Writes raw bytes to a file.
pub fn write_bytes(path: &str, contents: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(contents)
}
