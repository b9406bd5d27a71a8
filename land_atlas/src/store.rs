//! Layer persistence contract and the focus hand-off slot.
//!
//! The store is remote and opaque to the engine: it lists, deletes and
//! exports layers, with no transactional guarantees beyond `list_layers`
//! eventually reflecting a delete.

use std::cell::RefCell;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use geojson::FeatureCollection;
use serde::{Deserialize, Serialize};

use crate::error::{AtlasError, Result};
use crate::geometry::Ring;
use crate::gis::{Attributes, Feature};
use crate::io;
use crate::layers::Layer;
use crate::styles::LayerStyle;

/// A layer as the store keeps it: GeoJSON data plus presentation metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredLayer {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub style: LayerStyle,
    pub data: FeatureCollection,
}

impl StoredLayer {
    pub fn from_features(id: &str, name: &str, style: LayerStyle, features: &[Feature<Ring>]) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            style,
            data: io::geojson::features_to_collection(features),
        }
    }

    /// Snapshot of a registry layer, parcel ids and areas included.
    pub fn from_layer(layer: &Layer) -> Self {
        Self {
            id: layer.id.to_string(),
            name: layer.name.clone(),
            style: layer.style.clone(),
            data: io::geojson::parcels_to_collection(layer.parcels()),
        }
    }

    /// Polygon features; invalid rings are skipped.
    pub fn features(&self) -> Vec<Feature<Ring>> {
        io::geojson::features_from_collection(&self.data)
    }

    pub fn feature_count(&self) -> usize {
        self.data.features.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    GeoJson,
    Csv,
    Kml,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::GeoJson => "geojson",
            ExportFormat::Csv => "csv",
            ExportFormat::Kml => "kml",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = AtlasError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "geojson" | "json" => Ok(ExportFormat::GeoJson),
            "csv" => Ok(ExportFormat::Csv),
            "kml" => Ok(ExportFormat::Kml),
            other => Err(AtlasError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

fn labelled(features: &[Feature<Ring>]) -> Vec<(String, &Ring)> {
    features
        .iter()
        .enumerate()
        .map(|(idx, f)| {
            let label = f.class.clone().unwrap_or_else(|| format!("feature-{}", idx + 1));
            (label, &f.geometry)
        })
        .collect()
}

/// Encodes a stored layer in the requested format.
pub fn export_stored(layer: &StoredLayer, format: ExportFormat) -> Result<Vec<u8>> {
    match format {
        ExportFormat::GeoJson => Ok(serde_json::to_vec_pretty(&geojson::GeoJson::FeatureCollection(
            layer.data.clone(),
        ))?),
        ExportFormat::Csv => {
            let features = layer.features();
            let rows = labelled(&features);
            Ok(io::csv::vertices_to_csv(rows.iter().map(|(id, r)| (id.as_str(), *r))).into_bytes())
        }
        #[cfg(feature = "kml")]
        ExportFormat::Kml => {
            let features = layer.features();
            let rows = labelled(&features);
            Ok(io::kml::rings_to_kml(rows.iter().map(|(id, r)| (id.as_str(), *r)))?)
        }
        #[cfg(not(feature = "kml"))]
        ExportFormat::Kml => Err(AtlasError::UnsupportedFormat(
            "kml (built without the kml feature)".into(),
        )),
    }
}

/// Remote layer persistence.
#[async_trait(?Send)]
pub trait LayerStore {
    async fn list_layers(&self) -> Result<Vec<StoredLayer>>;
    async fn delete_layer(&self, id: &str) -> Result<()>;
    async fn export_layer(&self, id: &str, format: ExportFormat) -> Result<Vec<u8>>;
    /// Inserts or replaces a layer by id.
    async fn save_layer(&self, layer: StoredLayer) -> Result<()>;
}

/// Store backed by a JSON document holding an array of layers.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: String,
}

impl JsonFileStore {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn read(&self) -> Result<Vec<StoredLayer>> {
        if !std::path::Path::new(&self.path).exists() {
            return Ok(Vec::new());
        }
        let contents = io::read_to_string(&self.path)?;
        serde_json::from_str(&contents)
            .map_err(|e| AtlasError::LayerLoad(format!("{}: {e}", self.path)))
    }

    fn write(&self, layers: &[StoredLayer]) -> Result<()> {
        let json = serde_json::to_string_pretty(layers)?;
        io::write_string(&self.path, &json)?;
        Ok(())
    }
}

#[async_trait(?Send)]
impl LayerStore for JsonFileStore {
    async fn list_layers(&self) -> Result<Vec<StoredLayer>> {
        let layers = self.read()?;
        log::debug!("{} layer(s) listed from {}", layers.len(), self.path);
        Ok(layers)
    }

    async fn delete_layer(&self, id: &str) -> Result<()> {
        let mut layers = self.read()?;
        let before = layers.len();
        layers.retain(|l| l.id != id);
        if layers.len() == before {
            return Err(AtlasError::UnknownLayer(id.to_string()));
        }
        self.write(&layers)?;
        log::info!("deleted layer '{id}' from {}", self.path);
        Ok(())
    }

    async fn export_layer(&self, id: &str, format: ExportFormat) -> Result<Vec<u8>> {
        let layers = self.read()?;
        let layer = layers
            .iter()
            .find(|l| l.id == id)
            .ok_or_else(|| AtlasError::UnknownLayer(id.to_string()))?;
        export_stored(layer, format)
    }

    async fn save_layer(&self, layer: StoredLayer) -> Result<()> {
        let mut layers = self.read()?;
        match layers.iter_mut().find(|l| l.id == layer.id) {
            Some(existing) => *existing = layer,
            None => layers.push(layer),
        }
        self.write(&layers)
    }
}

/// In-process store, handy for hosts without a backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    layers: RefCell<Vec<StoredLayer>>,
    offline: RefCell<Option<String>>,
}

impl MemoryStore {
    pub fn new(layers: Vec<StoredLayer>) -> Self {
        Self {
            layers: RefCell::new(layers),
            offline: RefCell::new(None),
        }
    }

    /// Makes `list_layers` fail with `reason` until called with `None`.
    pub fn set_offline(&self, reason: Option<&str>) {
        *self.offline.borrow_mut() = reason.map(str::to_string);
    }

    pub fn len(&self) -> usize {
        self.layers.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.borrow().is_empty()
    }
}

#[async_trait(?Send)]
impl LayerStore for MemoryStore {
    async fn list_layers(&self) -> Result<Vec<StoredLayer>> {
        if let Some(reason) = self.offline.borrow().as_ref() {
            return Err(AtlasError::LayerLoad(reason.clone()));
        }
        Ok(self.layers.borrow().clone())
    }

    async fn delete_layer(&self, id: &str) -> Result<()> {
        let mut layers = self.layers.borrow_mut();
        let before = layers.len();
        layers.retain(|l| l.id != id);
        if layers.len() == before {
            return Err(AtlasError::UnknownLayer(id.to_string()));
        }
        Ok(())
    }

    async fn export_layer(&self, id: &str, format: ExportFormat) -> Result<Vec<u8>> {
        let layers = self.layers.borrow();
        let layer = layers
            .iter()
            .find(|l| l.id == id)
            .ok_or_else(|| AtlasError::UnknownLayer(id.to_string()))?;
        export_stored(layer, format)
    }

    async fn save_layer(&self, layer: StoredLayer) -> Result<()> {
        let mut layers = self.layers.borrow_mut();
        match layers.iter_mut().find(|l| l.id == layer.id) {
            Some(existing) => *existing = layer,
            None => layers.push(layer),
        }
        Ok(())
    }
}

/// Pending "focus this geometry" request left by another page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusRequest {
    pub ring: Ring,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_info: Option<Attributes>,
    /// Persistent requests survive pickup until cleared.
    #[serde(default)]
    pub persistent: bool,
    pub timestamp: DateTime<Utc>,
}

impl FocusRequest {
    pub fn new(ring: Ring, owner_info: Option<Attributes>, persistent: bool) -> Self {
        Self {
            ring,
            owner_info,
            persistent,
            timestamp: Utc::now(),
        }
    }
}

/// Single-slot mailbox for focus requests.
#[derive(Debug, Default)]
pub struct FocusHandoff {
    slot: Option<FocusRequest>,
}

impl FocusHandoff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a request, replacing any previous one.
    pub fn stash(&mut self, request: FocusRequest) {
        self.slot = Some(request);
    }

    /// Picks up the pending request; non-persistent requests are consumed.
    pub fn take(&mut self) -> Option<FocusRequest> {
        match &self.slot {
            Some(req) if req.persistent => Some(req.clone()),
            _ => self.slot.take(),
        }
    }

    pub fn peek(&self) -> Option<&FocusRequest> {
        self.slot.as_ref()
    }

    pub fn clear(&mut self) {
        self.slot = None;
    }

    /// Serialized slot content, as kept in page session storage.
    pub fn to_json(&self) -> Result<Option<String>> {
        self.slot
            .as_ref()
            .map(|r| serde_json::to_string(r).map_err(AtlasError::from))
            .transpose()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self {
            slot: Some(serde_json::from_str(json)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Coordinate;

    fn ring() -> Ring {
        Ring::close(vec![
            Coordinate::new(78.0, 20.0),
            Coordinate::new(78.0, 20.001),
            Coordinate::new(78.001, 20.001),
        ])
        .unwrap()
    }

    #[test]
    fn non_persistent_request_is_taken_once() {
        let mut h = FocusHandoff::new();
        h.stash(FocusRequest::new(ring(), None, false));
        assert!(h.take().is_some());
        assert!(h.take().is_none());
    }

    #[test]
    fn persistent_request_stays_until_cleared() {
        let mut h = FocusHandoff::new();
        h.stash(FocusRequest::new(ring(), None, true));
        assert!(h.take().is_some());
        assert!(h.take().is_some());
        h.clear();
        assert!(h.take().is_none());
    }

    #[test]
    fn handoff_survives_serialization() {
        let mut h = FocusHandoff::new();
        h.stash(FocusRequest::new(ring(), None, true));
        let json = h.to_json().unwrap().unwrap();
        assert!(json.contains("\"persistent\":true"));
        let mut again = FocusHandoff::from_json(&json).unwrap();
        assert_eq!(again.take().unwrap().ring, ring());
    }

    #[test]
    fn export_formats_parse() {
        assert_eq!("GeoJSON".parse::<ExportFormat>().unwrap(), ExportFormat::GeoJson);
        assert!(matches!(
            "shp".parse::<ExportFormat>(),
            Err(AtlasError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryStore::default();
        let layer = StoredLayer::from_features(
            "a",
            "A",
            LayerStyle::default(),
            &[Feature::new(ring())],
        );
        spin_on::spin_on(store.save_layer(layer)).unwrap();
        let csv = spin_on::spin_on(store.export_layer("a", ExportFormat::Csv)).unwrap();
        let csv = String::from_utf8(csv).unwrap();
        assert!(csv.starts_with("parcel_id,vertex,lon,lat"));
        assert!(csv.contains("feature-1,0,78,20"));
        spin_on::spin_on(store.delete_layer("a")).unwrap();
        assert!(spin_on::spin_on(store.delete_layer("a")).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn malformed_style_fails_the_listing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layers.json");
        std::fs::write(
            &path,
            r##"[{"id":"a","name":"A","style":{"strokeColor":"#aéaaa"},
                "data":{"type":"FeatureCollection","features":[]}}]"##,
        )
        .unwrap();
        let store = JsonFileStore::new(path.to_str().unwrap());
        let result = spin_on::spin_on(store.list_layers());
        assert!(matches!(result, Err(AtlasError::LayerLoad(_))));
    }
}
