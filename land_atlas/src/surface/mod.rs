//! Bridge between the layer registry and a concrete map rendering engine.
//!
//! The adapter owns the engine for the lifetime of one mounted view. It holds
//! only non-owning render handles keyed by layer and parcel id and rebuilds them from a
//! fresh [`RegistrySnapshot`] whenever the registry revision changes.
//! Coordinates are converted to the engine's axis order here and nowhere else.

use std::collections::HashMap;
use std::time::Duration;

use crate::config::{AtlasConfig, BaseMapStyle, TileSource};
use crate::error::{AtlasError, Result};
use crate::geometry::{Bounds, Coordinate};
use crate::gis::Attributes;
use crate::inspect::{build_popup, build_tooltip, ContentBlock};
use crate::layers::{FeatureKey, FeatureView, LayerId, LayerKind, LayerView, RegistrySnapshot};
use crate::parcel::ParcelId;
use crate::styles::{InteractionState, PaintParams, StyleResolver};

pub mod headless;

pub use headless::{EngineOp, HeadlessEngine};

/// Position order an engine expects on its public API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisOrder {
    /// `[lat, lng]`, as most web map engines take it.
    LatLng,
    /// `[lng, lat]`, as in GeoJSON based engines.
    LngLat,
}

impl AxisOrder {
    pub fn to_engine(&self, c: Coordinate) -> [f64; 2] {
        match self {
            AxisOrder::LatLng => [c.lat, c.lon],
            AxisOrder::LngLat => [c.lon, c.lat],
        }
    }

    pub fn from_engine(&self, p: [f64; 2]) -> Coordinate {
        match self {
            AxisOrder::LatLng => Coordinate::new(p[1], p[0]),
            AxisOrder::LngLat => Coordinate::new(p[0], p[1]),
        }
    }
}

/// Opaque engine-side object id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Operations the adapter needs from a map rendering library.
///
/// Positions are passed in [`Self::AXIS_ORDER`].
pub trait RenderEngine {
    const AXIS_ORDER: AxisOrder;

    /// `true` once the render container is mounted.
    fn is_ready(&self) -> bool;
    fn size(&self) -> ScreenSize;
    /// Re-measures the render container.
    fn invalidate_size(&mut self);

    fn add_tile_layer(&mut self, source: &TileSource) -> RenderHandle;
    fn add_polygon(&mut self, path: &[[f64; 2]], paint: &PaintParams) -> RenderHandle;
    fn set_style(&mut self, handle: RenderHandle, paint: &PaintParams);
    fn remove(&mut self, handle: RenderHandle);
    fn bring_to_front(&mut self, handle: RenderHandle);

    fn fit_bounds(&mut self, south_west: [f64; 2], north_east: [f64; 2], padding_px: u32);
    fn set_view(&mut self, center: [f64; 2], zoom: u8);

    fn show_tooltip(&mut self, handle: RenderHandle, content: &ContentBlock);
    fn open_popup(&mut self, handle: RenderHandle, content: &ContentBlock);
}

/// Pointer input reported by the engine, in engine axis order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Hover(RenderHandle),
    Leave(RenderHandle),
    Click(RenderHandle),
    Move([f64; 2]),
}

/// Payload handed to host callbacks on hover and click.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureEvent {
    pub parcel_id: ParcelId,
    pub layer_id: LayerId,
    pub attributes: Attributes,
    pub content: ContentBlock,
}

pub type FeatureCallback = Box<dyn FnMut(&FeatureEvent)>;

/// Formats a canonical coordinate for the cursor readout.
pub fn format_coordinate(c: Coordinate) -> String {
    format!("Lon: {:.6}, Lat: {:.6}", c.lon, c.lat)
}

struct Resolved {
    handle: RenderHandle,
    paint: PaintParams,
    frame: Option<Bounds>,
    event: FeatureEvent,
}

pub struct MapSurfaceAdapter<E: RenderEngine> {
    engine: E,
    config: AtlasConfig,
    resolver: StyleResolver,
    mounted: bool,
    base: Option<(BaseMapStyle, Vec<RenderHandle>)>,
    handles: HashMap<FeatureKey, RenderHandle>,
    features: HashMap<RenderHandle, FeatureKey>,
    rendered: Option<RegistrySnapshot>,
    hovered: Option<FeatureKey>,
    focused: Option<FeatureKey>,
    on_hover: Option<FeatureCallback>,
    on_click: Option<FeatureCallback>,
}

impl<E: RenderEngine> MapSurfaceAdapter<E> {
    pub fn new(engine: E, config: AtlasConfig) -> Self {
        Self {
            engine,
            resolver: StyleResolver::new(config.emphasis),
            config,
            mounted: false,
            base: None,
            handles: HashMap::new(),
            features: HashMap::new(),
            rendered: None,
            hovered: None,
            focused: None,
            on_hover: None,
            on_click: None,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn on_hover(&mut self, callback: FeatureCallback) {
        self.on_hover = Some(callback);
    }

    pub fn on_click(&mut self, callback: FeatureCallback) {
        self.on_click = Some(callback);
    }

    pub fn to_engine(&self, c: Coordinate) -> [f64; 2] {
        E::AXIS_ORDER.to_engine(c)
    }

    pub fn to_canonical(&self, p: [f64; 2]) -> Coordinate {
        E::AXIS_ORDER.from_engine(p)
    }

    /// Converts a path reported by the drawing tool, closing it if needed.
    pub fn captured_ring(&self, path: &[[f64; 2]]) -> Vec<Coordinate> {
        let mut coords: Vec<Coordinate> = path.iter().map(|p| self.to_canonical(*p)).collect();
        if let (Some(first), Some(last)) = (coords.first().copied(), coords.last().copied()) {
            if coords.len() > 1 && first != last {
                coords.push(first);
            }
        }
        coords
    }

    /// Waits for the render container using the configured retry policy.
    pub fn mount(&mut self) -> Result<u32> {
        self.mount_with(std::thread::sleep)
    }

    /// Like [`Self::mount`] with an injectable sleep, returning the attempts used.
    pub fn mount_with<S>(&mut self, mut sleep: S) -> Result<u32>
    where
        S: FnMut(Duration),
    {
        let policy = self.config.surface_retry;
        let attempts = policy.attempts.max(1);
        for attempt in 1..=attempts {
            if self.engine.is_ready() && !self.engine.size().is_empty() {
                self.mounted = true;
                log::debug!("map surface ready after {attempt} attempt(s)");
                return Ok(attempt);
            }
            if attempt < attempts {
                log::warn!("map surface not ready (attempt {attempt}/{attempts}), retrying");
                sleep(policy.delay(attempt));
                self.engine.invalidate_size();
            }
        }
        Err(AtlasError::SurfaceNotReady { attempts })
    }

    /// Re-validates the surface size after a layout change.
    pub fn layout_changed(&mut self) {
        self.engine.invalidate_size();
    }

    pub fn base_style(&self) -> Option<BaseMapStyle> {
        self.base.as_ref().map(|(style, _)| *style)
    }

    /// Swaps the base imagery tiles for another style.
    pub fn set_base_style(&mut self, style: BaseMapStyle) {
        if self.base_style() == Some(style) {
            return;
        }
        self.clear_base();
        let handles = style
            .sources()
            .iter()
            .map(|src| self.engine.add_tile_layer(src))
            .collect();
        log::debug!("base imagery set to {style}");
        self.base = Some((style, handles));
    }

    fn clear_base(&mut self) {
        if let Some((_, handles)) = self.base.take() {
            for h in handles {
                self.engine.remove(h);
            }
        }
    }

    fn clear_features(&mut self) {
        for (_, handle) in self.handles.drain() {
            self.engine.remove(handle);
        }
        self.features.clear();
    }

    /// Rebuilds render handles from `snapshot` when its revision is new.
    ///
    /// Returns `true` when a rebuild happened.
    pub fn reconcile(&mut self, snapshot: &RegistrySnapshot) -> bool {
        if self
            .rendered
            .as_ref()
            .is_some_and(|r| r.revision == snapshot.revision)
        {
            return false;
        }
        match snapshot.layers.iter().find_map(|l| match l.kind {
            LayerKind::BaseImagery(style) => Some(style),
            _ => None,
        }) {
            Some(style) => self.set_base_style(style),
            None => self.clear_base(),
        }

        self.clear_features();
        for layer in &snapshot.layers {
            for feature in &layer.features {
                let key = FeatureKey {
                    layer: layer.id.clone(),
                    parcel: feature.parcel_id.clone(),
                };
                if self.handles.contains_key(&key) {
                    log::warn!(
                        "layer '{}': skipped duplicate parcel id '{}'",
                        layer.id,
                        feature.parcel_id
                    );
                    continue;
                }
                let path: Vec<[f64; 2]> = feature
                    .ring
                    .coords()
                    .iter()
                    .map(|c| self.to_engine(*c))
                    .collect();
                let handle = self.engine.add_polygon(&path, &feature.paint);
                self.handles.insert(key.clone(), handle);
                self.features.insert(handle, key);
            }
        }
        log::debug!(
            "rendered revision {} with {} feature(s)",
            snapshot.revision,
            self.handles.len()
        );
        self.rendered = Some(snapshot.clone());

        if let Some(id) = self.focused.clone() {
            if self.restyle(&id, InteractionState::Focused).is_none() {
                self.focused = None;
            }
        }
        if let Some(id) = self.hovered.clone() {
            if self.focused.as_ref() != Some(&id)
                && self.restyle(&id, InteractionState::Hovered).is_none()
            {
                self.hovered = None;
            }
        }
        true
    }

    /// Number of parcel handles currently on the surface.
    pub fn rendered_count(&self) -> usize {
        self.handles.len()
    }

    /// Handle of the topmost rendered feature carrying `id`.
    pub fn handle_for(&self, id: &ParcelId) -> Option<RenderHandle> {
        self.key_for(id).and_then(|key| self.handles.get(&key).copied())
    }

    fn key_for(&self, id: &ParcelId) -> Option<FeatureKey> {
        let (layer, feature) = self.rendered.as_ref()?.find_feature(id)?;
        Some(FeatureKey {
            layer: layer.id.clone(),
            parcel: feature.parcel_id.clone(),
        })
    }

    fn lookup(&self, key: &FeatureKey) -> Option<(&LayerView, &FeatureView)> {
        self.rendered.as_ref()?.feature(key)
    }

    fn resolve(&self, key: &FeatureKey, interaction: InteractionState, popup: bool) -> Option<Resolved> {
        let handle = self.handles.get(key).copied()?;
        let (layer, feature) = self.lookup(key)?;
        let paint = self.resolver.resolve(&layer.style, feature.status, interaction);
        let frame = match interaction {
            InteractionState::Focused => self
                .resolver
                .focus(&layer.style, feature.status, &feature.ring)
                .ok()
                .map(|f| f.frame),
            _ => None,
        };
        let builder = if popup { build_popup } else { build_tooltip };
        let content = builder(&feature.attributes, &layer.name, layer.owner_info.as_ref());
        Some(Resolved {
            handle,
            paint,
            frame,
            event: FeatureEvent {
                parcel_id: key.parcel.clone(),
                layer_id: layer.id.clone(),
                attributes: feature.attributes.clone(),
                content,
            },
        })
    }

    fn restyle(&mut self, key: &FeatureKey, interaction: InteractionState) -> Option<RenderHandle> {
        let resolved = self.resolve(key, interaction, false)?;
        self.engine.set_style(resolved.handle, &resolved.paint);
        if resolved.paint.bring_to_front {
            self.engine.bring_to_front(resolved.handle);
        }
        Some(resolved.handle)
    }

    /// Hover: emphasize the feature and show its tooltip.
    pub fn hover(&mut self, id: &ParcelId) -> Option<FeatureEvent> {
        let key = self.key_for(id)?;
        self.hover_feature(key)
    }

    fn hover_feature(&mut self, key: FeatureKey) -> Option<FeatureEvent> {
        if let Some(prev) = self.hovered.take() {
            if prev != key {
                self.unhover_feature(&prev);
            }
        }
        let resolved = self.resolve(&key, InteractionState::Hovered, false)?;
        if self.focused.as_ref() != Some(&key) {
            self.engine.set_style(resolved.handle, &resolved.paint);
        }
        self.engine.show_tooltip(resolved.handle, &resolved.event.content);
        self.hovered = Some(key);
        if let Some(cb) = self.on_hover.as_mut() {
            cb(&resolved.event);
        }
        Some(resolved.event)
    }

    /// Pointer left the feature: restore its resting paint.
    pub fn unhover(&mut self, id: &ParcelId) {
        if let Some(key) = self.key_for(id) {
            self.unhover_feature(&key);
        }
    }

    fn unhover_feature(&mut self, key: &FeatureKey) {
        if self.hovered.as_ref() == Some(key) {
            self.hovered = None;
        }
        if self.focused.as_ref() != Some(key) {
            self.restyle(key, InteractionState::Normal);
        }
    }

    /// Click or explicit focus: emphasize, open the popup and frame the bounds.
    pub fn focus(&mut self, id: &ParcelId) -> Result<FeatureEvent> {
        let key = self
            .key_for(id)
            .ok_or_else(|| AtlasError::UnknownParcel(id.to_string()))?;
        self.focus_feature(key)
    }

    fn focus_feature(&mut self, key: FeatureKey) -> Result<FeatureEvent> {
        let resolved = self
            .resolve(&key, InteractionState::Focused, true)
            .ok_or_else(|| AtlasError::UnknownParcel(key.parcel.to_string()))?;
        if let Some(prev) = self.focused.replace(key.clone()) {
            if prev != key {
                let state = if self.hovered.as_ref() == Some(&prev) {
                    InteractionState::Hovered
                } else {
                    InteractionState::Normal
                };
                self.restyle(&prev, state);
            }
        }
        self.engine.set_style(resolved.handle, &resolved.paint);
        self.engine.bring_to_front(resolved.handle);
        self.engine.open_popup(resolved.handle, &resolved.event.content);
        if let Some(frame) = resolved.frame {
            self.fit_bounds(Some(frame));
        }
        if let Some(cb) = self.on_click.as_mut() {
            cb(&resolved.event);
        }
        Ok(resolved.event)
    }

    pub fn focused(&self) -> Option<&ParcelId> {
        self.focused.as_ref().map(|key| &key.parcel)
    }

    /// Dispatches an engine pointer event; `Move` yields the cursor readout.
    pub fn handle_pointer(&mut self, event: PointerEvent) -> Option<String> {
        match event {
            PointerEvent::Hover(h) => {
                if let Some(key) = self.features.get(&h).cloned() {
                    self.hover_feature(key);
                }
                None
            }
            PointerEvent::Leave(h) => {
                if let Some(key) = self.features.get(&h).cloned() {
                    self.unhover_feature(&key);
                }
                None
            }
            PointerEvent::Click(h) => {
                if let Some(key) = self.features.get(&h).cloned() {
                    if let Err(err) = self.focus_feature(key) {
                        log::warn!("click on stale handle: {err}");
                    }
                }
                None
            }
            PointerEvent::Move(p) => Some(self.cursor_readout(p)),
        }
    }

    /// Frames `bounds` with the configured padding, or falls back to the
    /// default view when there is nothing usable to frame.
    pub fn fit_bounds(&mut self, bounds: Option<Bounds>) {
        match bounds.filter(|b| !b.is_degenerate()) {
            Some(b) => {
                let sw = self.to_engine(b.min);
                let ne = self.to_engine(b.max);
                self.engine.fit_bounds(sw, ne, self.config.fit_padding_px);
            }
            None => {
                let center = self.to_engine(self.config.default_center);
                self.engine.set_view(center, self.config.default_zoom);
            }
        }
    }

    /// Cursor position, given in engine order, as canonical lon/lat text.
    pub fn cursor_readout(&self, p: [f64; 2]) -> String {
        format_coordinate(self.to_canonical(p))
    }

    /// Removes every handle and hands the engine back to the host.
    pub fn dispose(mut self) -> E {
        self.clear_features();
        self.clear_base();
        self.on_hover = None;
        self.on_click = None;
        log::debug!("map surface disposed");
        self.engine
    }
}
