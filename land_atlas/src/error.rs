//! Error types shared by every component of the engine.

use std::io;
use thiserror::Error;

/// Errors raised by the digitization and layer-composition engine.
#[derive(Debug, Error)]
pub enum AtlasError {
    /// The ring is degenerate, open, or otherwise unusable as a parcel boundary.
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// A layer with the same id is already registered.
    #[error("Layer id '{0}' already exists")]
    DuplicateLayerId(String),

    /// `start` was called while a draw session was not idle.
    #[error("A draw session is already active on this map")]
    SessionAlreadyActive,

    /// A draw session operation was invoked from a state that does not accept it.
    #[error("Cannot {operation} while the draw session is {state}")]
    InvalidSessionState {
        operation: &'static str,
        state: &'static str,
    },

    /// The render container is not mounted or has no usable size.
    #[error("Map surface not ready after {attempts} attempt(s)")]
    SurfaceNotReady { attempts: u32 },

    /// Fetching layers from the external store failed.
    #[error("Failed to load layers: {0}")]
    LayerLoad(String),

    /// The referenced layer is not present in the registry or store.
    #[error("Unknown layer '{0}'")]
    UnknownLayer(String),

    /// No layer in the registry holds a parcel with this id.
    #[error("Unknown parcel '{0}'")]
    UnknownParcel(String),

    /// A style, status or configuration value could not be parsed.
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Export or import format is not supported by this build.
    #[error("Unsupported format '{0}'")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    GeoJson(#[from] geojson::Error),
}

impl AtlasError {
    /// Returns `true` for errors the UI handles in place with an inline message.
    ///
    /// Geometry and session-state errors never tear down the view; everything
    /// else is reported but may leave part of the map without data.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AtlasError::InvalidGeometry(_)
                | AtlasError::DuplicateLayerId(_)
                | AtlasError::SessionAlreadyActive
                | AtlasError::InvalidSessionState { .. }
                | AtlasError::UnknownLayer(_)
                | AtlasError::UnknownParcel(_)
                | AtlasError::InvalidValue(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AtlasError>;
