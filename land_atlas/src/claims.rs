//! Official claim records and their status-partitioned layers.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{AtlasError, Result};
use crate::geometry::{Coordinate, Ring};
use crate::gis::Attributes;
use crate::layers::{Layer, LayerKind};
use crate::parcel::Parcel;
use crate::styles::{FeatureStatus, LayerStyle};

pub const GRANTED_LAYER_ID: &str = "claims-granted";
pub const POTENTIAL_LAYER_ID: &str = "claims-potential";
pub const FULL_DATASET_LAYER_ID: &str = "claims-all";

/// One official claim as published by the claims registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRecord {
    pub id: String,
    pub claimant_name: String,
    /// Claimed area in hectares.
    pub area: f64,
    pub status: FeatureStatus,
    /// Boundary in `[lon, lat]` order; the closing vertex may be omitted.
    pub coordinates: Vec<Coordinate>,
    pub village: String,
    pub district: String,
    pub state: String,
    pub date_submitted: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub survey_number: Option<String>,
}

impl ClaimRecord {
    pub fn ring(&self) -> Result<Ring> {
        Ring::close(self.coordinates.clone())
    }

    fn attributes(&self) -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert("claimantName".into(), json!(self.claimant_name));
        attrs.insert("status".into(), json!(self.status.as_str()));
        attrs.insert("area".into(), json!(format!("{} hectares", self.area)));
        attrs.insert("village".into(), json!(self.village));
        attrs.insert("district".into(), json!(self.district));
        attrs.insert("state".into(), json!(self.state));
        attrs.insert(
            "surveyNumber".into(),
            self.survey_number.clone().map(Value::String).unwrap_or(Value::Null),
        );
        attrs.insert("dateSubmitted".into(), json!(self.date_submitted));
        attrs
    }

    /// Converts the record to a parcel keyed by the record id.
    pub fn to_parcel(&self) -> Result<Parcel> {
        let ring = self.ring()?;
        Ok(Parcel::with_id(self.id.as_str().into(), ring, self.status).with_attributes(self.attributes()))
    }
}

/// Parses a JSON array of claim records.
pub fn read_claims(json: &str) -> Result<Vec<ClaimRecord>> {
    Ok(serde_json::from_str(json)?)
}

/// Optional status, district and state constraints; `None` matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaimFilter {
    pub status: Option<FeatureStatus>,
    pub district: Option<String>,
    pub state: Option<String>,
}

fn choice(value: &str) -> Option<String> {
    let v = value.trim();
    if v.is_empty() || v.eq_ignore_ascii_case("all") {
        None
    } else {
        Some(v.to_string())
    }
}

impl ClaimFilter {
    /// Builds a filter from UI selections where `"all"` means no constraint.
    pub fn from_selection(status: &str, district: &str, state: &str) -> Result<Self> {
        Ok(Self {
            status: choice(status).map(|s| s.parse::<FeatureStatus>()).transpose()?,
            district: choice(district),
            state: choice(state),
        })
    }

    pub fn matches(&self, record: &ClaimRecord) -> bool {
        self.status.map_or(true, |s| record.status == s)
            && self
                .district
                .as_ref()
                .map_or(true, |d| record.district.eq_ignore_ascii_case(d))
            && self
                .state
                .as_ref()
                .map_or(true, |s| record.state.eq_ignore_ascii_case(s))
    }

    pub fn apply<'a>(&self, records: &'a [ClaimRecord]) -> Vec<&'a ClaimRecord> {
        records.iter().filter(|r| self.matches(r)).collect()
    }
}

fn parcels_of<'a, I>(records: I) -> Vec<Parcel>
where
    I: IntoIterator<Item = &'a ClaimRecord>,
{
    records
        .into_iter()
        .filter_map(|r| match r.to_parcel() {
            Ok(p) => Some(p),
            Err(err) => {
                log::warn!("skipping claim {}: {err}", r.id);
                None
            }
        })
        .collect()
}

/// Splits the filtered records into a granted and a potential layer.
pub fn official_layers(records: &[ClaimRecord], filter: &ClaimFilter) -> Vec<Layer> {
    let selected = filter.apply(records);
    [
        (GRANTED_LAYER_ID, "Granted claims", FeatureStatus::Granted),
        (POTENTIAL_LAYER_ID, "Potential claims", FeatureStatus::Potential),
    ]
    .into_iter()
    .map(|(id, name, status)| {
        let parcels = parcels_of(selected.iter().copied().filter(|r| r.status == status));
        Layer::new(id, name, LayerKind::Official(status)).with_parcels(parcels)
    })
    .collect()
}

/// Overlay of every record, styled as the "All Land Plots" preset.
pub fn full_dataset_layer(records: &[ClaimRecord]) -> Layer {
    let style = crate::styles::default_layer_styles()
        .into_iter()
        .find(|(name, _)| name == "All Land Plots")
        .map(|(_, style)| style)
        .unwrap_or_else(LayerStyle::default);
    Layer::new(FULL_DATASET_LAYER_ID, "All land plots", LayerKind::FullDataset)
        .with_style(style)
        .with_parcels(parcels_of(records))
}

/// Looks up a record by id.
pub fn find_claim<'a>(records: &'a [ClaimRecord], id: &str) -> Result<&'a ClaimRecord> {
    records
        .iter()
        .find(|r| r.id == id)
        .ok_or_else(|| AtlasError::UnknownParcel(id.to_string()))
}
