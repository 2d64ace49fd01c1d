//! Intersection logic for the traffic simulation
//!
//! Intersections are a closed set of variants that all answer the same
//! right-of-way query, so vehicles never need to know which kind they face.

use super::signal::{LightState, SignalController};
use super::types::{IntersectionId, RoadId, SignalGroupId, Vec2};

/// Construction parameters for an intersection, in simulation units
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IntersectionParams {
    /// Round-robin traffic lights; times in seconds
    Signalised {
        total_cycle_time: f64,
        yellow_duration: f64,
    },
    /// Unsignalled, always yields; speed limit in m/s
    Roundabout { speed_limit: f64 },
}

/// Variant-specific state of an intersection
#[derive(Debug, Clone)]
pub enum IntersectionKind {
    Signalised(SignalController),
    Roundabout { speed_limit: f64 },
}

/// An intersection in the traffic simulation
#[derive(Debug, Clone)]
pub struct SimIntersection {
    id: IntersectionId,
    position: Vec2,
    pub kind: IntersectionKind,
}

impl SimIntersection {
    pub fn new(id: IntersectionId, position: Vec2, params: IntersectionParams) -> Self {
        let kind = match params {
            IntersectionParams::Signalised {
                total_cycle_time,
                yellow_duration,
            } => IntersectionKind::Signalised(SignalController::new(
                total_cycle_time,
                yellow_duration,
            )),
            IntersectionParams::Roundabout { speed_limit } => {
                IntersectionKind::Roundabout { speed_limit }
            }
        };
        Self { id, position, kind }
    }

    pub fn id(&self) -> IntersectionId {
        self.id
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn is_signalised(&self) -> bool {
        matches!(self.kind, IntersectionKind::Signalised(_))
    }

    /// Whether a vehicle on `road` may enter this intersection right now.
    /// Roundabouts always answer GREEN.
    pub fn signal_state_for(&self, road: RoadId) -> LightState {
        match &self.kind {
            IntersectionKind::Signalised(controller) => controller.state_for(road),
            IntersectionKind::Roundabout { .. } => LightState::Green,
        }
    }

    /// Whether vehicles may leave on the road leading straight back to where
    /// they came from
    pub fn allows_u_turn(&self) -> bool {
        !self.is_signalised()
    }

    pub fn signals(&self) -> Option<&SignalController> {
        match &self.kind {
            IntersectionKind::Signalised(controller) => Some(controller),
            IntersectionKind::Roundabout { .. } => None,
        }
    }

    pub fn signals_mut(&mut self) -> Option<&mut SignalController> {
        match &mut self.kind {
            IntersectionKind::Signalised(controller) => Some(controller),
            IntersectionKind::Roundabout { .. } => None,
        }
    }

    /// Roundabout speed limit in m/s; `None` for signalised intersections
    pub fn speed_limit(&self) -> Option<f64> {
        match self.kind {
            IntersectionKind::Roundabout { speed_limit } => Some(speed_limit),
            IntersectionKind::Signalised(_) => None,
        }
    }

    /// Sets the roundabout speed limit; ignored for signalised intersections
    pub fn set_speed_limit(&mut self, limit: f64) {
        if let IntersectionKind::Roundabout { speed_limit } = &mut self.kind {
            *speed_limit = limit;
        }
    }

    pub fn register_incoming_road(&mut self, road: RoadId, group_id: SignalGroupId) {
        if let Some(controller) = self.signals_mut() {
            controller.register_incoming_road(road, group_id);
        }
    }

    pub fn unregister_incoming_road(&mut self, road: RoadId) {
        if let Some(controller) = self.signals_mut() {
            controller.unregister_incoming_road(road);
        }
    }

    /// Advance time-based state
    pub fn update(&mut self, delta_secs: f64) {
        if let Some(controller) = self.signals_mut() {
            controller.update(delta_secs);
        }
    }
}
