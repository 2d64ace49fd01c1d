//! Read-only views of the world, published after every tick
//!
//! Readers on other threads (a renderer, a status line) look at these
//! instead of the live world, which only the simulation thread may touch.

use super::intersection::IntersectionKind;
use super::road_network::SimRoadNetwork;
use super::signal::LightState;
use super::types::{CarId, IntersectionId, RoadId, Vec2};
use super::world::{SimWorld, WorldStats};

/// What a renderer needs to draw an intersection
#[derive(Debug, Clone, PartialEq)]
pub struct IntersectionView {
    pub id: IntersectionId,
    pub position: Vec2,
    pub signalised: bool,
    /// Roundabouts only
    pub speed_limit: Option<f64>,
    /// Light per registered incoming road, in cycle order
    pub signals: Vec<(RoadId, LightState)>,
    /// Index into `signals` of the phase holding right of way
    pub active_phase: Option<usize>,
}

/// What a renderer needs to draw a car
#[derive(Debug, Clone, PartialEq)]
pub struct CarView {
    pub id: CarId,
    pub road: Option<RoadId>,
    pub s: f64,
    pub v: f64,
    pub target_v: f64,
    pub max_speed: f64,
    pub acceleration: f64,
    /// World position including lane offset
    pub position: Vec2,
    /// Radians
    pub heading: f64,
}

/// The world as it stood at the end of a tick
#[derive(Debug, Clone, Default)]
pub struct SimSnapshot {
    /// Simulated time in microseconds
    pub sim_time_us: u64,
    pub running: bool,
    pub network: SimRoadNetwork,
    pub intersections: Vec<IntersectionView>,
    pub cars: Vec<CarView>,
    pub stats: WorldStats,
}

impl SimSnapshot {
    pub fn capture(world: &SimWorld, sim_time_us: u64, running: bool) -> Self {
        let mut intersections: Vec<IntersectionView> = world
            .intersections
            .values()
            .map(|intersection| {
                let (signals, active_phase) = match &intersection.kind {
                    IntersectionKind::Signalised(controller) => (
                        controller
                            .groups()
                            .iter()
                            .map(|group| (group.road, group.state))
                            .collect(),
                        (controller.phase_count() > 0).then(|| controller.current_phase()),
                    ),
                    IntersectionKind::Roundabout { .. } => (Vec::new(), None),
                };
                IntersectionView {
                    id: intersection.id(),
                    position: intersection.position(),
                    signalised: intersection.is_signalised(),
                    speed_limit: intersection.speed_limit(),
                    signals,
                    active_phase,
                }
            })
            .collect();
        intersections.sort_by_key(|view| view.id);

        let mut cars: Vec<CarView> = world
            .cars
            .values()
            .map(|car| {
                let state = car.state();
                CarView {
                    id: car.id(),
                    road: state.road,
                    s: state.s,
                    v: state.v,
                    target_v: state.target_v,
                    max_speed: car.max_speed(),
                    acceleration: car.acceleration(),
                    position: car.world_position(&world.road_network),
                    heading: car.heading(&world.road_network),
                }
            })
            .collect();
        cars.sort_by_key(|view| view.id);

        Self {
            sim_time_us,
            running,
            network: world.road_network.clone(),
            intersections,
            cars,
            stats: world.stats,
        }
    }

    pub fn simulation_time_ms(&self) -> u64 {
        self.sim_time_us / 1000
    }

    pub fn simulation_time_seconds(&self) -> f64 {
        self.sim_time_us as f64 / 1_000_000.0
    }

    pub fn road_network(&self) -> &SimRoadNetwork {
        &self.network
    }

    pub fn car(&self, id: CarId) -> Option<&CarView> {
        self.cars.iter().find(|car| car.id == id)
    }

    pub fn intersection(&self, id: IntersectionId) -> Option<&IntersectionView> {
        self.intersections
            .iter()
            .find(|intersection| intersection.id == id)
    }

    /// Light shown to cars on `road`
    pub fn signal_state(&self, road: RoadId) -> Option<LightState> {
        let destination = self.network.get_road(road)?.to();
        let intersection = self.intersection(destination)?;
        if !intersection.signalised {
            return Some(LightState::Green);
        }
        Some(
            intersection
                .signals
                .iter()
                .find(|(signal_road, _)| *signal_road == road)
                .map(|(_, state)| *state)
                .unwrap_or(LightState::Red),
        )
    }
}
