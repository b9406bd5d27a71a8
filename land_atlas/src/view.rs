//! One mounted map view.
//!
//! `MapView` owns the registry, the draw session, the surface adapter, the
//! layer loader and the notice board of a single map. It is created on mount
//! and consumed by [`MapView::dispose`]; there is no process-wide state.

use std::time::Duration;

use chrono::Utc;
use serde_json::json;

use crate::claims::{full_dataset_layer, official_layers, ClaimFilter, ClaimRecord};
use crate::config::{AtlasConfig, BaseMapStyle};
use crate::draw::{DrawState, DrawingSession, PendingParcel};
use crate::error::{AtlasError, Result};
use crate::geometry::{AreaCaveat, Bounds};
use crate::gis::{attribute_text, Attributes};
use crate::inspect::RecognizedField;
use crate::layers::{Layer, LayerHandle, LayerKind, LayerRegistry, DRAWN_ITEMS_ID};
use crate::loader::{LayerLoader, LoadOutcome};
use crate::notice::NoticeBoard;
use crate::parcel::{Parcel, ParcelId};
use crate::store::{FocusHandoff, LayerStore, StoredLayer};
use crate::styles::{LayerStyle, StyleResolver};
use crate::surface::{FeatureCallback, FeatureEvent, MapSurfaceAdapter, PointerEvent, RenderEngine};

/// Layer id used for the spotlighted hand-off record.
pub const FOCUS_LAYER_ID: &str = "persistent-focus";

pub struct MapView<E: RenderEngine> {
    registry: LayerRegistry,
    session: DrawingSession,
    surface: MapSurfaceAdapter<E>,
    loader: LayerLoader,
    notices: NoticeBoard,
    surface_warning: Option<u64>,
    saved_plots: usize,
}

impl<E: RenderEngine> MapView<E> {
    /// Mounts a view on `engine`, waiting for the surface with real sleeps.
    pub fn mount(engine: E, config: AtlasConfig) -> Self {
        Self::mount_with(engine, config, std::thread::sleep)
    }

    /// Mounts a view with an injectable sleep for the surface retry loop.
    ///
    /// A surface that never becomes ready leaves a persistent warning; the view
    /// is still usable and renders once the host reports a layout change.
    pub fn mount_with<S>(engine: E, config: AtlasConfig, sleep: S) -> Self
    where
        S: FnMut(Duration),
    {
        let registry = LayerRegistry::with_resolver(config.base_style, StyleResolver::new(config.emphasis));
        let mut view = Self {
            registry,
            session: DrawingSession::new(),
            surface: MapSurfaceAdapter::new(engine, config),
            loader: LayerLoader::new(),
            notices: NoticeBoard::new(),
            surface_warning: None,
            saved_plots: 0,
        };
        if let Err(err) = view.surface.mount_with(sleep) {
            log::warn!("{err}");
            view.surface_warning = Some(view.notices.warn_persistent(err.to_string()));
        }
        view.render();
        view.surface.fit_bounds(None);
        view
    }

    pub fn registry(&self) -> &LayerRegistry {
        &self.registry
    }

    pub fn surface(&self) -> &MapSurfaceAdapter<E> {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut MapSurfaceAdapter<E> {
        &mut self.surface
    }

    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }

    pub fn draw_state(&self) -> DrawState {
        self.session.state()
    }

    pub fn on_hover(&mut self, callback: FeatureCallback) {
        self.surface.on_hover(callback);
    }

    pub fn on_click(&mut self, callback: FeatureCallback) {
        self.surface.on_click(callback);
    }

    /// Reconciles the surface with the registry; `true` when it was rebuilt.
    pub fn render(&mut self) -> bool {
        let snapshot = self.registry.snapshot();
        self.surface.reconcile(&snapshot)
    }

    fn report<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            self.notices.report(err);
        }
        result
    }

    pub fn start_drawing(&mut self) -> Result<()> {
        let result = self.session.start();
        self.report(result)
    }

    /// Hands the path reported by the drawing tool to the session and stages it.
    pub fn ring_closed(&mut self, path: &[[f64; 2]]) -> Result<PendingParcel> {
        let coords = self.surface.captured_ring(path);
        let result = self.session.on_ring_closed(coords).cloned();
        let pending = self.report(result)?;
        for caveat in &pending.caveats {
            if *caveat != AreaCaveat::PlanarApproximation {
                self.notices.warn(caveat.message());
            }
        }
        self.registry.stage_drawn(pending.parcel.clone());
        self.render();
        Ok(pending)
    }

    /// Saves the captured parcel as a new `Plot N` layer.
    pub fn confirm_save(&mut self, mut attributes: Attributes) -> Result<LayerHandle> {
        let ordinal = self.saved_plots + 1;
        let name = match attribute_text(&attributes, RecognizedField::Name.candidates()) {
            Some(name) => name,
            None => {
                let name = format!("Plot {ordinal}");
                attributes.insert("name".into(), json!(name));
                name
            }
        };
        attributes
            .entry("created")
            .or_insert_with(|| json!(Utc::now().to_rfc3339()));
        attributes.entry("status").or_insert_with(|| json!("active"));

        let result = self.session.confirm_save(attributes);
        let parcel = self.report(result)?;
        let hectares = parcel.hectares();
        let layer_id = format!("plot-{}", parcel.id());
        self.registry.stage_drawn(parcel);
        let result = self.registry.promote_drawn(&layer_id, &name, LayerStyle::default());
        let handle = self.report(result)?;
        self.saved_plots = ordinal;
        self.notices.info(format!("{name} saved ({hectares:.2} ha)"));
        log::info!("saved drawn plot '{name}' as layer '{layer_id}'");
        self.render();
        Ok(handle)
    }

    pub fn discard_drawing(&mut self) -> Result<()> {
        let result = self.session.discard();
        self.report(result)?;
        self.registry.clear_drawn();
        self.render();
        Ok(())
    }

    pub fn cancel_drawing(&mut self) -> Result<()> {
        let result = self.session.cancel();
        self.report(result)?;
        self.registry.clear_drawn();
        self.render();
        Ok(())
    }

    pub fn toggle_layer(&mut self, id: &str) -> Option<bool> {
        let visible = self.registry.toggle_visibility(id);
        self.render();
        visible
    }

    /// Removes a layer from the view; reserved and unknown ids are ignored.
    pub fn remove_layer(&mut self, id: &str) -> bool {
        let removed = self.registry.remove_layer(id).is_some();
        if removed {
            self.render();
        }
        removed
    }

    /// Focuses a parcel: popup, emphasis and camera frame.
    pub fn focus_parcel(&mut self, id: &ParcelId) -> Result<FeatureEvent> {
        self.render();
        let result = self.surface.focus(id);
        self.report(result)
    }

    /// Frames the union of a layer's parcels.
    pub fn fit_layer(&mut self, id: &str) -> Result<()> {
        let result = self
            .registry
            .layer(id)
            .map(Layer::bounds)
            .ok_or_else(|| AtlasError::UnknownLayer(id.to_string()));
        let bounds = self.report(result)?;
        self.surface.fit_bounds(bounds);
        Ok(())
    }

    pub fn set_base_style(&mut self, style: BaseMapStyle) {
        self.registry.set_base_style(style);
        self.render();
    }

    /// Picks up a pending focus request and spotlights it.
    pub fn apply_focus_handoff(&mut self, handoff: &mut FocusHandoff) -> Result<Option<ParcelId>> {
        let Some(request) = handoff.take() else {
            return Ok(None);
        };
        let label = request
            .owner_info
            .as_ref()
            .and_then(|info| attribute_text(info, RecognizedField::Name.candidates()))
            .unwrap_or_else(|| "Focused record".to_string());
        let parcel = Parcel::new(request.ring, LayerKind::Uploaded.default_status());
        let parcel_id = parcel.id().clone();
        let layer = Layer::new(FOCUS_LAYER_ID, &label, LayerKind::PersistentFocus).with_parcels(vec![parcel]);
        let result = self.registry.set_persistent_focus(layer, request.owner_info);
        self.report(result)?;
        self.render();
        self.focus_parcel(&parcel_id)?;
        Ok(Some(parcel_id))
    }

    pub fn clear_focus(&mut self) {
        if self.registry.clear_persistent_focus().is_some() {
            self.render();
        }
    }

    fn uploaded_bounds(&self) -> Option<Bounds> {
        let boxes: Vec<Bounds> = self
            .registry
            .filter(|l| l.kind == LayerKind::Uploaded)
            .into_iter()
            .filter_map(Layer::bounds)
            .collect();
        Bounds::union_all(boxes.iter())
    }

    /// Reloads uploaded layers and frames what was loaded.
    pub async fn reload_layers<S>(&mut self, store: &S) -> LoadOutcome
    where
        S: LayerStore + ?Sized,
    {
        let outcome = self
            .loader
            .reload(store, &mut self.registry, &mut self.notices)
            .await;
        if let LoadOutcome::Loaded { .. } = outcome {
            self.render();
            let bounds = self.uploaded_bounds();
            self.surface.fit_bounds(bounds);
        }
        outcome
    }

    /// Deletes a layer from the store, then from the view.
    pub async fn delete_layer<S>(&mut self, store: &S, id: &str) -> Result<()>
    where
        S: LayerStore + ?Sized,
    {
        let result = store.delete_layer(id).await;
        self.report(result)?;
        self.remove_layer(id);
        self.notices.info(format!("Layer '{id}' deleted"));
        Ok(())
    }

    /// Persists a named registry layer to the store.
    pub async fn save_layer<S>(&mut self, store: &S, id: &str) -> Result<()>
    where
        S: LayerStore + ?Sized,
    {
        let stored = match self.registry.layer(id) {
            Some(layer) if layer.id.as_str() == DRAWN_ITEMS_ID => Err(AtlasError::InvalidValue(
                "the drawn-items layer cannot be stored directly".into(),
            )),
            Some(layer) => Ok(StoredLayer::from_layer(layer)),
            None => Err(AtlasError::UnknownLayer(id.to_string())),
        };
        let stored = self.report(stored)?;
        let result = store.save_layer(stored).await;
        self.report(result)
    }

    /// Replaces the official claim layers; the full dataset overlay starts hidden.
    pub fn load_claims(&mut self, records: &[ClaimRecord], filter: &ClaimFilter) -> Result<usize> {
        let mut layers = official_layers(records, filter);
        layers.push(full_dataset_layer(records).hidden());
        let count = layers
            .iter()
            .filter(|l| matches!(l.kind, LayerKind::Official(_)))
            .map(Layer::feature_count)
            .sum();
        let result = self.registry.replace_layers(
            |l| matches!(l.kind, LayerKind::Official(_) | LayerKind::FullDataset),
            layers,
        );
        self.report(result)?;
        self.render();
        Ok(count)
    }

    pub fn handle_pointer(&mut self, event: PointerEvent) -> Option<String> {
        self.surface.handle_pointer(event)
    }

    pub fn layout_changed(&mut self) {
        self.surface.layout_changed();
        if !self.surface.is_mounted() && self.surface.mount_with(|_| {}).is_ok() {
            if let Some(id) = self.surface_warning.take() {
                self.notices.dismiss(id);
            }
            self.render();
        }
    }

    /// Unmounts the view and returns the engine.
    pub fn dispose(self) -> E {
        self.surface.dispose()
    }
}
