//! Reload of uploaded layers from the layer store.
//!
//! Every load takes a ticket from [`LayerLoader::begin`]. Only the most recent
//! ticket may apply its result, so overlapping reloads never interleave two
//! partial layer sets. Applying clears every uploaded layer and repopulates in
//! one registry step, which makes sequential reloads idempotent.

use std::collections::HashSet;

use crate::error::{AtlasError, Result};
use crate::layers::{Layer, LayerKind, LayerRegistry};
use crate::notice::NoticeBoard;
use crate::parcel::{Parcel, ParcelId};
use crate::store::{LayerStore, StoredLayer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Layers replaced; counts of layers and features now loaded.
    Loaded { layers: usize, features: usize },
    /// The store failed; existing layers were kept.
    Failed,
    /// A newer load started before this one finished.
    Superseded,
}

#[derive(Debug, Default)]
pub struct LayerLoader {
    generation: u64,
    in_flight: Option<u64>,
}

/// Converts a stored layer into an uploaded registry layer.
///
/// Features keep their source id unless it is missing or already taken
/// earlier in the same layer, in which case the position names them.
pub fn uploaded_layer(stored: &StoredLayer) -> Layer {
    let status = LayerKind::Uploaded.default_status();
    let mut seen: HashSet<ParcelId> = HashSet::new();
    let parcels = stored
        .features()
        .into_iter()
        .enumerate()
        .map(|(idx, f)| {
            let positional = || ParcelId::from(format!("{}-{}", stored.id, idx + 1));
            let id = match f.class.map(ParcelId::from) {
                Some(id) if !seen.contains(&id) => id,
                Some(id) => {
                    log::warn!("layer '{}': repeated feature id '{id}'", stored.id);
                    positional()
                }
                None => positional(),
            };
            seen.insert(id.clone());
            Parcel::with_id(id, f.geometry, status).with_attributes(f.attributes)
        })
        .collect::<Vec<_>>();
    let skipped = stored.feature_count().saturating_sub(parcels.len());
    if skipped > 0 {
        log::warn!("layer '{}': skipped {skipped} invalid feature(s)", stored.id);
    }
    Layer::new(stored.id.as_str(), &stored.name, LayerKind::Uploaded)
        .with_style(stored.style.clone())
        .with_parcels(parcels)
}

impl LayerLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a load, superseding any load still in flight.
    pub fn begin(&mut self) -> LoadTicket {
        self.generation += 1;
        if self.in_flight.is_some() {
            log::debug!("layer load superseded by generation {}", self.generation);
        }
        self.in_flight = Some(self.generation);
        LoadTicket(self.generation)
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Applies the result of the load identified by `ticket`.
    pub fn finish(
        &mut self,
        ticket: LoadTicket,
        result: Result<Vec<StoredLayer>>,
        registry: &mut LayerRegistry,
        notices: &mut NoticeBoard,
    ) -> LoadOutcome {
        if self.in_flight != Some(ticket.0) {
            log::debug!("dropping stale layer load {}", ticket.0);
            return LoadOutcome::Superseded;
        }
        self.in_flight = None;

        let stored = match result {
            Ok(stored) => stored,
            Err(err) => {
                log::warn!("layer refresh failed: {err}");
                notices.warn(format!("Could not refresh layers: {err}"));
                return LoadOutcome::Failed;
            }
        };

        let mut layers: Vec<Layer> = Vec::with_capacity(stored.len());
        // Saved plots come back from the store under their own id.
        let mut adopted: Vec<String> = Vec::new();
        for s in &stored {
            if layers.iter().any(|l| l.id.as_str() == s.id) {
                log::warn!("store returned duplicate layer id '{}'", s.id);
                continue;
            }
            match registry.layer(&s.id).map(|l| &l.kind) {
                None | Some(LayerKind::Uploaded) => {}
                Some(LayerKind::Digitized) => {
                    log::debug!("adopting stored copy of saved plot '{}'", s.id);
                    adopted.push(s.id.clone());
                }
                Some(kind) => {
                    log::warn!("store layer '{}' clashes with a {kind:?} layer", s.id);
                    notices.warn(format!("Skipped stored layer '{}': id already in use", s.id));
                    continue;
                }
            }
            layers.push(uploaded_layer(s));
        }
        let features = layers.iter().map(Layer::feature_count).sum();
        let count = layers.len();
        let is_target = |l: &Layer| match l.kind {
            LayerKind::Uploaded => true,
            LayerKind::Digitized => adopted.iter().any(|id| id == l.id.as_str()),
            _ => false,
        };
        match registry.replace_layers(is_target, layers) {
            Ok(_) => {
                log::info!("loaded {count} layer(s) with {features} feature(s)");
                LoadOutcome::Loaded {
                    layers: count,
                    features,
                }
            }
            Err(err) => {
                let err = AtlasError::LayerLoad(err.to_string());
                log::warn!("{err}");
                notices.warn(err.to_string());
                LoadOutcome::Failed
            }
        }
    }

    /// Fetches from `store` and applies the result.
    pub async fn reload<S>(
        &mut self,
        store: &S,
        registry: &mut LayerRegistry,
        notices: &mut NoticeBoard,
    ) -> LoadOutcome
    where
        S: LayerStore + ?Sized,
    {
        let ticket = self.begin();
        let result = store.list_layers().await;
        self.finish(ticket, result, registry, notices)
    }
}
