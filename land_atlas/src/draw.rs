//! Polygon capture state machine.
//!
//! `Idle -> Drawing -> Captured -> Idle`, with `Drawing -> Idle` on cancel.
//! The session only tracks the staged geometry; mirroring it into the
//! registry's drawn-items layer is up to the owner of the session.

use crate::error::{AtlasError, Result};
use crate::geometry::{area_caveats, square_meters_to_hectares, AreaCaveat, Coordinate, Ring};
use crate::gis::Attributes;
use crate::parcel::Parcel;
use crate::styles::FeatureStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawState {
    #[default]
    Idle,
    Drawing,
    Captured,
}

impl DrawState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DrawState::Idle => "idle",
            DrawState::Drawing => "drawing",
            DrawState::Captured => "captured",
        }
    }
}

/// Captured parcel awaiting user confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingParcel {
    pub parcel: Parcel,
    pub caveats: Vec<AreaCaveat>,
}

impl PendingParcel {
    pub fn area(&self) -> f64 {
        self.parcel.area()
    }

    pub fn hectares(&self) -> f64 {
        square_meters_to_hectares(self.parcel.area())
    }
}

#[derive(Debug, Default)]
pub struct DrawingSession {
    state: DrawState,
    pending: Option<PendingParcel>,
}

impl DrawingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DrawState {
        self.state
    }

    pub fn pending(&self) -> Option<&PendingParcel> {
        self.pending.as_ref()
    }

    fn wrong_state(&self, operation: &'static str) -> AtlasError {
        AtlasError::InvalidSessionState {
            operation,
            state: self.state.as_str(),
        }
    }

    /// Activates the drawing tool.
    pub fn start(&mut self) -> Result<()> {
        if self.state != DrawState::Idle {
            return Err(AtlasError::SessionAlreadyActive);
        }
        log::debug!("draw session started");
        self.state = DrawState::Drawing;
        Ok(())
    }

    /// Accepts the closed ring reported by the drawing tool.
    ///
    /// On an invalid ring the session stays in `Drawing` so the user can try again.
    pub fn on_ring_closed(&mut self, coords: Vec<Coordinate>) -> Result<&PendingParcel> {
        if self.state != DrawState::Drawing {
            return Err(self.wrong_state("close a ring"));
        }
        let ring = Ring::new(coords)?;
        let caveats = area_caveats(&ring);
        let parcel = Parcel::new(ring, FeatureStatus::Draft);
        log::debug!(
            "ring captured: {:.2} m2 with {} caveat(s)",
            parcel.area(),
            caveats.len()
        );
        self.state = DrawState::Captured;
        Ok(&*self.pending.insert(PendingParcel { parcel, caveats }))
    }

    /// Finishes the capture with user supplied attributes.
    pub fn confirm_save(&mut self, attributes: Attributes) -> Result<Parcel> {
        if self.state != DrawState::Captured {
            return Err(self.wrong_state("confirm a save"));
        }
        let pending = self.pending.take().ok_or_else(|| self.wrong_state("confirm a save"))?;
        let mut parcel = pending.parcel;
        parcel.merge_attributes(attributes);
        self.state = DrawState::Idle;
        log::info!("draw session saved parcel {}", parcel.id());
        Ok(parcel)
    }

    /// Drops any staged geometry and returns to idle.
    pub fn discard(&mut self) -> Result<()> {
        if self.state == DrawState::Idle {
            return Err(self.wrong_state("discard"));
        }
        self.pending = None;
        self.state = DrawState::Idle;
        log::debug!("draw session discarded");
        Ok(())
    }

    /// Leaves the drawing tool before any ring was closed.
    pub fn cancel(&mut self) -> Result<()> {
        if self.state != DrawState::Drawing {
            return Err(self.wrong_state("cancel"));
        }
        self.state = DrawState::Idle;
        log::debug!("draw session cancelled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Coordinate> {
        vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(0.0, 0.001),
            Coordinate::new(0.001, 0.001),
            Coordinate::new(0.001, 0.0),
            Coordinate::new(0.0, 0.0),
        ]
    }

    #[test]
    fn full_capture_cycle() {
        let mut s = DrawingSession::new();
        s.start().unwrap();
        let pending = s.on_ring_closed(square()).unwrap();
        assert!(pending.area() > 0.0);
        assert!(pending.caveats.contains(&AreaCaveat::PlanarApproximation));
        assert_eq!(s.state(), DrawState::Captured);

        let mut attrs = Attributes::new();
        attrs.insert("name".into(), serde_json::json!("Plot 1"));
        let parcel = s.confirm_save(attrs).unwrap();
        assert_eq!(parcel.attributes()["name"], "Plot 1");
        assert_eq!(s.state(), DrawState::Idle);
        assert!(s.pending().is_none());
    }

    #[test]
    fn second_start_is_rejected() {
        let mut s = DrawingSession::new();
        s.start().unwrap();
        assert!(matches!(s.start(), Err(AtlasError::SessionAlreadyActive)));
        s.on_ring_closed(square()).unwrap();
        assert!(matches!(s.start(), Err(AtlasError::SessionAlreadyActive)));
    }

    #[test]
    fn degenerate_ring_keeps_drawing() {
        let mut s = DrawingSession::new();
        s.start().unwrap();
        let point = vec![Coordinate::new(1.0, 1.0); 4];
        assert!(matches!(
            s.on_ring_closed(point),
            Err(AtlasError::InvalidGeometry(_))
        ));
        let open = square()[..4].to_vec();
        assert!(s.on_ring_closed(open).is_err());
        assert_eq!(s.state(), DrawState::Drawing);
    }

    #[test]
    fn self_intersecting_ring_is_flagged() {
        let mut s = DrawingSession::new();
        s.start().unwrap();
        let bowtie = vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(0.001, 0.001),
            Coordinate::new(0.001, 0.0),
            Coordinate::new(0.0, 0.001),
            Coordinate::new(0.0, 0.0),
        ];
        let pending = s.on_ring_closed(bowtie).unwrap();
        assert!(pending.caveats.contains(&AreaCaveat::SelfIntersecting));
    }

    #[test]
    fn wrong_state_calls_fail() {
        let mut s = DrawingSession::new();
        assert!(matches!(
            s.confirm_save(Attributes::new()),
            Err(AtlasError::InvalidSessionState { state: "idle", .. })
        ));
        assert!(s.discard().is_err());
        assert!(s.cancel().is_err());
        assert!(s.on_ring_closed(square()).is_err());
        s.start().unwrap();
        assert!(s.confirm_save(Attributes::new()).is_err());
        s.on_ring_closed(square()).unwrap();
        assert!(s.cancel().is_err());
    }

    #[test]
    fn discard_and_cancel_return_to_idle() {
        let mut s = DrawingSession::new();
        s.start().unwrap();
        s.cancel().unwrap();
        assert_eq!(s.state(), DrawState::Idle);
        s.start().unwrap();
        s.on_ring_closed(square()).unwrap();
        s.discard().unwrap();
        assert_eq!(s.state(), DrawState::Idle);
        assert!(s.pending().is_none());
    }
}
