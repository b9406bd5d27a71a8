use std::collections::BTreeMap;

use serde::Serialize;

use super::{AxisOrder, RenderEngine, RenderHandle, ScreenSize};
use crate::config::TileSource;
use crate::inspect::ContentBlock;
use crate::styles::PaintParams;

/// Engine call recorded by [`HeadlessEngine`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EngineOp {
    InvalidateSize,
    AddTiles { handle: u64, url: String },
    AddPolygon { handle: u64, vertices: usize },
    SetStyle { handle: u64 },
    Remove { handle: u64 },
    BringToFront { handle: u64 },
    FitBounds { south_west: [f64; 2], north_east: [f64; 2], padding: u32 },
    SetView { center: [f64; 2], zoom: u8 },
    Tooltip { handle: u64, text: String },
    Popup { handle: u64, text: String },
}

/// Polygon as the headless engine stores it.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawnPolygon {
    /// Path in `[lat, lng]` order.
    pub path: Vec<[f64; 2]>,
    pub paint: PaintParams,
    pub z: u64,
}

/// In-memory rendering engine taking `[lat, lng]` pairs.
///
/// Records every call so tests and the CLI can inspect what a real engine
/// would have been asked to draw.
#[derive(Debug, Default)]
pub struct HeadlessEngine {
    size: ScreenSize,
    pending_size: Option<ScreenSize>,
    /// Number of `invalidate_size` calls before the pending size applies.
    layout_delay: u32,
    next_handle: u64,
    next_z: u64,
    tiles: BTreeMap<RenderHandle, TileSource>,
    polygons: BTreeMap<RenderHandle, DrawnPolygon>,
    ops: Vec<EngineOp>,
}

impl HeadlessEngine {
    /// Create a laid out engine with the given canvas size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: ScreenSize { width, height },
            ..Default::default()
        }
    }

    /// An engine whose container only gets its size after `delay` re-measures.
    pub fn unmounted(width: u32, height: u32, delay: u32) -> Self {
        Self {
            pending_size: Some(ScreenSize { width, height }),
            layout_delay: delay,
            ..Default::default()
        }
    }

    fn allocate(&mut self) -> RenderHandle {
        self.next_handle += 1;
        RenderHandle(self.next_handle)
    }

    pub fn ops(&self) -> &[EngineOp] {
        &self.ops
    }

    pub fn polygon(&self, handle: RenderHandle) -> Option<&DrawnPolygon> {
        self.polygons.get(&handle)
    }

    pub fn polygon_count(&self) -> usize {
        self.polygons.len()
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn tile_urls(&self) -> Vec<&str> {
        self.tiles.values().map(|t| t.url_template.as_str()).collect()
    }

    /// Handle of the polygon drawn on top.
    pub fn topmost(&self) -> Option<RenderHandle> {
        self.polygons
            .iter()
            .max_by_key(|(_, p)| p.z)
            .map(|(h, _)| *h)
    }

    /// Resizes the container; the new size is picked up on the next re-measure.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.pending_size = Some(ScreenSize { width, height });
        self.layout_delay = 0;
    }

    fn raise(&mut self, handle: RenderHandle) {
        self.next_z += 1;
        let z = self.next_z;
        if let Some(p) = self.polygons.get_mut(&handle) {
            p.z = z;
        }
    }
}

impl RenderEngine for HeadlessEngine {
    const AXIS_ORDER: AxisOrder = AxisOrder::LatLng;

    fn is_ready(&self) -> bool {
        !self.size.is_empty()
    }

    fn size(&self) -> ScreenSize {
        self.size
    }

    fn invalidate_size(&mut self) {
        self.ops.push(EngineOp::InvalidateSize);
        if self.layout_delay > 0 {
            self.layout_delay -= 1;
            if self.layout_delay > 0 {
                return;
            }
        }
        if let Some(size) = self.pending_size.take() {
            self.size = size;
        }
    }

    fn add_tile_layer(&mut self, source: &TileSource) -> RenderHandle {
        let handle = self.allocate();
        self.ops.push(EngineOp::AddTiles {
            handle: handle.0,
            url: source.url_template.clone(),
        });
        self.tiles.insert(handle, source.clone());
        handle
    }

    fn add_polygon(&mut self, path: &[[f64; 2]], paint: &PaintParams) -> RenderHandle {
        let handle = self.allocate();
        self.ops.push(EngineOp::AddPolygon {
            handle: handle.0,
            vertices: path.len(),
        });
        self.polygons.insert(
            handle,
            DrawnPolygon {
                path: path.to_vec(),
                paint: paint.clone(),
                z: 0,
            },
        );
        self.raise(handle);
        handle
    }

    fn set_style(&mut self, handle: RenderHandle, paint: &PaintParams) {
        self.ops.push(EngineOp::SetStyle { handle: handle.0 });
        if let Some(p) = self.polygons.get_mut(&handle) {
            p.paint = paint.clone();
        }
    }

    fn remove(&mut self, handle: RenderHandle) {
        self.ops.push(EngineOp::Remove { handle: handle.0 });
        self.polygons.remove(&handle);
        self.tiles.remove(&handle);
    }

    fn bring_to_front(&mut self, handle: RenderHandle) {
        self.ops.push(EngineOp::BringToFront { handle: handle.0 });
        self.raise(handle);
    }

    fn fit_bounds(&mut self, south_west: [f64; 2], north_east: [f64; 2], padding_px: u32) {
        self.ops.push(EngineOp::FitBounds {
            south_west,
            north_east,
            padding: padding_px,
        });
    }

    fn set_view(&mut self, center: [f64; 2], zoom: u8) {
        self.ops.push(EngineOp::SetView { center, zoom });
    }

    fn show_tooltip(&mut self, handle: RenderHandle, content: &ContentBlock) {
        self.ops.push(EngineOp::Tooltip {
            handle: handle.0,
            text: content.to_text(),
        });
    }

    fn open_popup(&mut self, handle: RenderHandle, content: &ContentBlock) {
        self.ops.push(EngineOp::Popup {
            handle: handle.0,
            text: content.to_text(),
        });
    }
}
