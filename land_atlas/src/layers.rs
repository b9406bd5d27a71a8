//! Layer registry: the single owner of every layer and parcel on a map view.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::BaseMapStyle;
use crate::error::{AtlasError, Result};
use crate::geometry::{bounds, Bounds, Ring};
use crate::gis::Attributes;
use crate::parcel::{Parcel, ParcelId};
use crate::styles::{FeatureStatus, InteractionState, LayerStyle, PaintParams, StyleResolver};

/// Reserved id of the base imagery layer.
pub const BASE_LAYER_ID: &str = "base-imagery";
/// Reserved id of the drawn-items staging layer.
pub const DRAWN_ITEMS_ID: &str = "drawn-items";

/// Unique layer identifier within a registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(String);

impl LayerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LayerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for LayerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Logical role of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    /// Background imagery; carries no parcels.
    BaseImagery(BaseMapStyle),
    /// Staging area for an in-progress drawing; never persisted directly.
    DrawnItems,
    /// User drawn plots saved from the drawn-items layer.
    Digitized,
    /// Boundary data loaded from the external layer store.
    Uploaded,
    /// The single spotlighted record.
    PersistentFocus,
    /// Official claims of one status.
    Official(FeatureStatus),
    /// Every record of the dataset at once.
    FullDataset,
}

impl LayerKind {
    /// Status that overrides the parcels' own status when painting.
    fn status_override(&self) -> Option<FeatureStatus> {
        match self {
            LayerKind::DrawnItems => Some(FeatureStatus::Draft),
            LayerKind::PersistentFocus => Some(FeatureStatus::Highlighted),
            _ => None,
        }
    }

    /// Status given to parcels created on a layer of this kind.
    pub fn default_status(&self) -> FeatureStatus {
        match self {
            LayerKind::Official(status) => *status,
            LayerKind::Digitized => FeatureStatus::Draft,
            other => other.status_override().unwrap_or(FeatureStatus::Uploaded),
        }
    }

    fn is_reserved(&self) -> bool {
        matches!(self, LayerKind::BaseImagery(_) | LayerKind::DrawnItems)
    }
}

/// Representation of a map layer: a named, styled collection of parcels.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub id: LayerId,
    pub name: String,
    pub kind: LayerKind,
    pub style: LayerStyle,
    pub visible: bool,
    parcels: Vec<Parcel>,
    owner_info: Option<Attributes>,
}

impl Layer {
    /// Creates a new, visible, empty layer.
    pub fn new(id: impl Into<LayerId>, name: &str, kind: LayerKind) -> Self {
        Self {
            id: id.into(),
            name: name.to_string(),
            kind,
            style: LayerStyle::default(),
            visible: true,
            parcels: Vec::new(),
            owner_info: None,
        }
    }

    pub fn with_style(mut self, style: LayerStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_parcels(mut self, parcels: Vec<Parcel>) -> Self {
        self.parcels = parcels;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn parcels(&self) -> &[Parcel] {
        &self.parcels
    }

    pub fn feature_count(&self) -> usize {
        self.parcels.len()
    }

    pub fn owner_info(&self) -> Option<&Attributes> {
        self.owner_info.as_ref()
    }

    /// Union of the bounds of every parcel, `None` when the layer is empty.
    pub fn bounds(&self) -> Option<Bounds> {
        let boxes: Vec<Bounds> = self
            .parcels
            .iter()
            .filter_map(|p| bounds(p.ring().coords()).ok())
            .collect();
        Bounds::union_all(boxes.iter())
    }

    /// Status used to pick the palette for `parcel` on this layer.
    pub fn paint_status(&self, parcel: &Parcel) -> FeatureStatus {
        self.kind.status_override().unwrap_or(parcel.status())
    }
}

/// Receipt for a registered layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerHandle {
    pub id: LayerId,
    /// Position in the z-order, 0 being the bottom.
    pub z_index: usize,
    /// Registry revision right after the insertion.
    pub revision: u64,
}

/// Identity of one drawn feature. Parcel ids are only unique within a layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeatureKey {
    pub layer: LayerId,
    pub parcel: ParcelId,
}

/// One parcel as the renderer should draw it.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureView {
    pub parcel_id: ParcelId,
    pub ring: Ring,
    pub status: FeatureStatus,
    pub attributes: Attributes,
    pub area: f64,
    pub paint: PaintParams,
}

/// One visible layer with resolved paint.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerView {
    pub id: LayerId,
    pub name: String,
    pub kind: LayerKind,
    pub z_index: usize,
    pub style: LayerStyle,
    pub owner_info: Option<Attributes>,
    pub features: Vec<FeatureView>,
}

/// Consistent read view of the registry, bottom layer first.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrySnapshot {
    pub revision: u64,
    pub layers: Vec<LayerView>,
}

impl RegistrySnapshot {
    pub fn feature_count(&self) -> usize {
        self.layers.iter().map(|l| l.features.len()).sum()
    }

    /// Topmost feature carrying `id`.
    pub fn find_feature(&self, id: &ParcelId) -> Option<(&LayerView, &FeatureView)> {
        self.layers
            .iter()
            .rev()
            .find_map(|l| l.features.iter().find(|f| &f.parcel_id == id).map(|f| (l, f)))
    }

    pub fn feature(&self, key: &FeatureKey) -> Option<(&LayerView, &FeatureView)> {
        let layer = self.layers.iter().find(|l| l.id == key.layer)?;
        layer
            .features
            .iter()
            .find(|f| f.parcel_id == key.parcel)
            .map(|f| (layer, f))
    }
}

/// Owner of all layers on one map view.
///
/// Mutations happen on a single logical owner; every mutation bumps the
/// revision so renderers know when to reconcile.
#[derive(Debug)]
pub struct LayerRegistry {
    layers: Vec<Layer>,
    focus: Option<LayerId>,
    revision: u64,
    resolver: StyleResolver,
}

impl Default for LayerRegistry {
    fn default() -> Self {
        Self::new(BaseMapStyle::default())
    }
}

impl LayerRegistry {
    /// Creates a registry holding only the base imagery and drawn-items layers.
    pub fn new(base: BaseMapStyle) -> Self {
        Self::with_resolver(base, StyleResolver::default())
    }

    pub fn with_resolver(base: BaseMapStyle, resolver: StyleResolver) -> Self {
        Self {
            layers: vec![
                Layer::new(BASE_LAYER_ID, "Base imagery", LayerKind::BaseImagery(base)),
                Layer::new(DRAWN_ITEMS_ID, "Drawn items", LayerKind::DrawnItems),
            ],
            focus: None,
            revision: 0,
            resolver,
        }
    }

    pub fn resolver(&self) -> &StyleResolver {
        &self.resolver
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn bump(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.layers.iter().position(|l| l.id.as_str() == id)
    }

    fn handle_at(&self, index: usize) -> LayerHandle {
        LayerHandle {
            id: self.layers[index].id.clone(),
            z_index: index,
            revision: self.revision,
        }
    }

    /// Registers a layer on top of the z-order.
    ///
    /// Persistent focus layers are routed through [`Self::set_persistent_focus`].
    pub fn add_layer(&mut self, layer: Layer) -> Result<LayerHandle> {
        if layer.kind == LayerKind::PersistentFocus {
            let owner = layer.owner_info.clone();
            return self.set_persistent_focus(layer, owner);
        }
        if layer.kind.is_reserved() {
            return Err(AtlasError::InvalidValue(format!(
                "layer '{}' uses a reserved kind",
                layer.id
            )));
        }
        if self.position(layer.id.as_str()).is_some() {
            return Err(AtlasError::DuplicateLayerId(layer.id.to_string()));
        }
        log::debug!("adding layer '{}' with {} feature(s)", layer.id, layer.feature_count());
        self.layers.push(layer);
        self.bump();
        Ok(self.handle_at(self.layers.len() - 1))
    }

    /// Removes a layer; absent ids and reserved layers are left alone.
    pub fn remove_layer(&mut self, id: &str) -> Option<Layer> {
        let index = self.position(id)?;
        if self.layers[index].kind.is_reserved() {
            log::debug!("refusing to remove reserved layer '{id}'");
            return None;
        }
        let layer = self.layers.remove(index);
        if self.focus.as_ref().map(LayerId::as_str) == Some(id) {
            self.focus = None;
        }
        self.bump();
        Some(layer)
    }

    /// Replaces any existing persistent focus layer with `layer` in one step.
    ///
    /// Observers never see two focus layers: the removal and insertion share a
    /// single revision.
    pub fn set_persistent_focus(
        &mut self,
        mut layer: Layer,
        owner_info: Option<Attributes>,
    ) -> Result<LayerHandle> {
        let previous = self.focus.clone();
        if let Some(index) = self.position(layer.id.as_str()) {
            if previous.as_ref() != Some(&self.layers[index].id) {
                return Err(AtlasError::DuplicateLayerId(layer.id.to_string()));
            }
        }
        layer.kind = LayerKind::PersistentFocus;
        layer.owner_info = owner_info;
        if let Some(old) = previous.and_then(|id| self.position(id.as_str())) {
            let removed = self.layers.remove(old);
            log::debug!("replacing persistent focus layer '{}'", removed.id);
        }
        log::info!("persistent focus set to layer '{}'", layer.id);
        self.focus = Some(layer.id.clone());
        self.layers.push(layer);
        self.bump();
        Ok(self.handle_at(self.layers.len() - 1))
    }

    pub fn clear_persistent_focus(&mut self) -> Option<Layer> {
        let id = self.focus.take()?;
        let index = self.position(id.as_str())?;
        let layer = self.layers.remove(index);
        self.bump();
        Some(layer)
    }

    pub fn persistent_focus(&self) -> Option<&Layer> {
        let id = self.focus.as_ref()?;
        self.layer(id.as_str())
    }

    /// Flips the visibility flag, returning the new state.
    pub fn toggle_visibility(&mut self, id: &str) -> Option<bool> {
        let index = self.position(id)?;
        let layer = &mut self.layers[index];
        layer.visible = !layer.visible;
        let visible = layer.visible;
        self.bump();
        Some(visible)
    }

    /// Sets the visibility flag; returns `false` when the layer is unknown.
    pub fn set_visibility(&mut self, id: &str, visible: bool) -> bool {
        match self.position(id) {
            Some(index) => {
                if self.layers[index].visible != visible {
                    self.layers[index].visible = visible;
                    self.bump();
                }
                true
            }
            None => false,
        }
    }

    /// Moves a layer to the top of the z-order.
    pub fn bring_to_front(&mut self, id: &str) -> bool {
        match self.position(id) {
            Some(index) if !matches!(self.layers[index].kind, LayerKind::BaseImagery(_)) => {
                let layer = self.layers.remove(index);
                self.layers.push(layer);
                self.bump();
                true
            }
            _ => false,
        }
    }

    /// Switches the base imagery style.
    pub fn set_base_style(&mut self, style: BaseMapStyle) {
        if let Some(base) = self
            .layers
            .iter_mut()
            .find(|l| matches!(l.kind, LayerKind::BaseImagery(_)))
        {
            base.kind = LayerKind::BaseImagery(style);
            self.bump();
        }
    }

    pub fn base_style(&self) -> BaseMapStyle {
        self.layers
            .iter()
            .find_map(|l| match l.kind {
                LayerKind::BaseImagery(style) => Some(style),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// Atomically swaps every layer matching `is_target` for `replacement`.
    ///
    /// Ids are validated up front, so on error the registry is unchanged.
    pub fn replace_layers<F>(&mut self, is_target: F, replacement: Vec<Layer>) -> Result<usize>
    where
        F: Fn(&Layer) -> bool,
    {
        let mut seen: Vec<&str> = self
            .layers
            .iter()
            .filter(|l| !is_target(l))
            .map(|l| l.id.as_str())
            .collect();
        for layer in &replacement {
            if layer.kind.is_reserved() || layer.kind == LayerKind::PersistentFocus {
                return Err(AtlasError::InvalidValue(format!(
                    "layer '{}' cannot be bulk loaded",
                    layer.id
                )));
            }
            if seen.contains(&layer.id.as_str()) {
                return Err(AtlasError::DuplicateLayerId(layer.id.to_string()));
            }
            seen.push(layer.id.as_str());
        }
        let before = self.layers.len();
        self.layers.retain(|l| !is_target(l));
        let removed = before - self.layers.len();
        if let Some(focus) = &self.focus {
            if !self.layers.iter().any(|l| &l.id == focus) {
                self.focus = None;
            }
        }
        self.layers.extend(replacement);
        self.bump();
        Ok(removed)
    }

    /// Replaces the drawn-items content with a single staged parcel.
    pub fn stage_drawn(&mut self, parcel: Parcel) {
        if let Some(index) = self.position(DRAWN_ITEMS_ID) {
            self.layers[index].parcels = vec![parcel];
            self.bump();
        }
    }

    /// Empties the drawn-items layer.
    pub fn clear_drawn(&mut self) {
        if let Some(index) = self.position(DRAWN_ITEMS_ID) {
            if !self.layers[index].parcels.is_empty() {
                self.layers[index].parcels.clear();
                self.bump();
            }
        }
    }

    pub fn drawn_items(&self) -> Option<&Layer> {
        self.layer(DRAWN_ITEMS_ID)
    }

    /// Moves the drawn-items content into a new named layer.
    pub fn promote_drawn(&mut self, id: &str, name: &str, style: LayerStyle) -> Result<LayerHandle> {
        if self.position(id).is_some() {
            return Err(AtlasError::DuplicateLayerId(id.to_string()));
        }
        let index = self
            .position(DRAWN_ITEMS_ID)
            .ok_or_else(|| AtlasError::UnknownLayer(DRAWN_ITEMS_ID.to_string()))?;
        let parcels = std::mem::take(&mut self.layers[index].parcels);
        if parcels.is_empty() {
            return Err(AtlasError::InvalidGeometry("nothing has been drawn".into()));
        }
        let layer = Layer::new(id, name, LayerKind::Digitized)
            .with_style(style)
            .with_parcels(parcels);
        self.add_layer(layer)
    }

    /// Retrieves a layer by id.
    pub fn layer(&self, id: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id.as_str() == id)
    }

    /// Returns all layers matching `predicate`, bottom first.
    pub fn filter<F>(&self, predicate: F) -> Vec<&Layer>
    where
        F: Fn(&Layer) -> bool,
    {
        self.layers.iter().filter(|l| predicate(l)).collect()
    }

    /// Iterator over all layer ids, bottom first.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|l| l.id.as_str())
    }

    /// Iterator over all layers, bottom first.
    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Always `false`; the reserved layers are permanent.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Total number of parcels across all layers.
    pub fn feature_count(&self) -> usize {
        self.layers.iter().map(Layer::feature_count).sum()
    }

    pub fn find_parcel(&self, id: &ParcelId) -> Option<(&Layer, &Parcel)> {
        self.layers
            .iter()
            .find_map(|l| l.parcels.iter().find(|p| p.id() == id).map(|p| (l, p)))
    }

    fn parcel_mut(&mut self, id: &ParcelId) -> Result<&mut Parcel> {
        self.layers
            .iter_mut()
            .flat_map(|l| l.parcels.iter_mut())
            .find(|p| p.id() == id)
            .ok_or_else(|| AtlasError::UnknownParcel(id.to_string()))
    }

    /// Explicit edit: replaces a parcel boundary (area is recomputed).
    pub fn update_parcel_ring(&mut self, id: &ParcelId, ring: Ring) -> Result<()> {
        self.parcel_mut(id)?.set_ring(ring);
        self.bump();
        Ok(())
    }

    /// Explicit edit: merges attributes into a parcel.
    pub fn update_parcel_attributes(&mut self, id: &ParcelId, attributes: Attributes) -> Result<()> {
        self.parcel_mut(id)?.merge_attributes(attributes);
        self.bump();
        Ok(())
    }

    pub fn remove_parcel(&mut self, id: &ParcelId) -> Option<Parcel> {
        for layer in &mut self.layers {
            if let Some(pos) = layer.parcels.iter().position(|p| p.id() == id) {
                let parcel = layer.parcels.remove(pos);
                self.revision += 1;
                return Some(parcel);
            }
        }
        None
    }

    /// Resting paint for a parcel on a given layer.
    pub fn paint_for(&self, layer: &Layer, parcel: &Parcel, interaction: InteractionState) -> PaintParams {
        self.resolver
            .resolve(&layer.style, layer.paint_status(parcel), interaction)
    }

    /// Ordered list of visible layers with resolved styles.
    pub fn snapshot(&self) -> RegistrySnapshot {
        let layers = self
            .layers
            .iter()
            .enumerate()
            .filter(|(_, l)| l.visible)
            .map(|(z_index, layer)| LayerView {
                id: layer.id.clone(),
                name: layer.name.clone(),
                kind: layer.kind,
                z_index,
                style: layer.style.clone(),
                owner_info: layer.owner_info.clone(),
                features: layer
                    .parcels
                    .iter()
                    .map(|p| FeatureView {
                        parcel_id: p.id().clone(),
                        ring: p.ring().clone(),
                        status: layer.paint_status(p),
                        attributes: p.attributes().clone(),
                        area: p.area(),
                        paint: self.paint_for(layer, p, InteractionState::Normal),
                    })
                    .collect(),
            })
            .collect();
        RegistrySnapshot {
            revision: self.revision,
            layers,
        }
    }
}
