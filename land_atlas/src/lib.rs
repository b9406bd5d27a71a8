//! Core library for the Land Atlas map engine: parcel digitization, layer
//! composition and feature inspection.

pub mod claims;
pub mod config;
pub mod draw;
pub mod error;
pub mod geometry;
pub mod gis;
pub mod inspect;
pub mod io;
pub mod layers;
pub mod loader;
pub mod notice;
pub mod parcel;
pub mod store;
pub mod styles;
pub mod surface;
pub mod view;

pub use config::{AtlasConfig, BaseMapStyle};
pub use draw::{DrawState, DrawingSession, PendingParcel};
pub use error::{AtlasError, Result};
pub use geometry::{Bounds, Coordinate, Ring};
pub use gis::{Attributes, Feature};
pub use inspect::{build_popup, build_tooltip, ContentBlock};
pub use layers::{Layer, LayerId, LayerKind, LayerRegistry};
pub use parcel::{Parcel, ParcelId};
pub use styles::{FeatureStatus, InteractionState, LayerStyle, PaintParams, StyleResolver};
pub use surface::{HeadlessEngine, MapSurfaceAdapter, RenderEngine};
pub use view::MapView;
