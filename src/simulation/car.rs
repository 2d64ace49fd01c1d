//! Car movement logic for the traffic simulation
//!
//! Each tick a car picks a target speed from the speed limit, the car ahead
//! and the signal at the end of its road, moves its speed towards that target
//! and then integrates its position along the road.

use ordered_float::OrderedFloat;
use rand::seq::IndexedRandom;
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::intersection::SimIntersection;
use super::road_network::SimRoadNetwork;
use super::signal::LightState;
use super::types::{
    CarId, IntersectionId, RoadId, SimRoad, Vec2, CAR_LENGTH, LANE_OFFSET, SAFE_FOLLOWING_GAP,
};

/// Speeds closer than this to the target snap onto it
const SPEED_SNAP_EPSILON: f64 = 1e-3;

/// Below this a car is treated as unable to brake at all
const MIN_USABLE_ACCELERATION: f64 = 1e-6;

/// Construction parameters for a car, in simulation units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarParams {
    /// m/s
    pub max_speed: f64,
    /// m/s², also used as the braking rate
    pub acceleration: f64,
}

impl Default for CarParams {
    fn default() -> Self {
        Self {
            max_speed: 35.0,
            acceleration: 2.0,
        }
    }
}

/// Dynamic state of a car, guarded by the car's own lock
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarState {
    /// `None` while the car is detached from the network
    pub road: Option<RoadId>,
    /// Progress along the current road in meters
    pub s: f64,
    /// Current speed in m/s
    pub v: f64,
    /// Speed the car was steering towards on its last update
    pub target_v: f64,
    /// Crossed the stop line of the current road under a green light
    pub committed: bool,
}

impl Default for CarState {
    fn default() -> Self {
        Self {
            road: None,
            s: 0.0,
            v: 0.0,
            target_v: 0.0,
            committed: false,
        }
    }
}

/// Result of a car update indicating what happened this tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CarUpdateResult {
    /// Not attached to any road
    Detached,
    /// Its road no longer exists, the car holds still
    Stranded,
    /// Moved along the current road
    Continue,
    /// Held at the stop line of its road
    StoppedAtLine,
    /// Crossed onto another road
    EnteredRoad(RoadId),
    /// Reached the end of its road with nowhere to go
    DeadEnd(IntersectionId),
}

/// Read-only view of the world a car needs during its update
#[derive(Clone, Copy)]
pub struct TrafficView<'a> {
    pub network: &'a SimRoadNetwork,
    pub intersections: &'a HashMap<IntersectionId, SimIntersection>,
    pub cars: &'a HashMap<CarId, SimCar>,
}

/// A car in the traffic simulation
#[derive(Debug)]
pub struct SimCar {
    id: CarId,
    max_speed: f64,
    acceleration: f64,
    /// Positional state; locked for the car's own update and for any read
    /// from another car
    state: Mutex<CarState>,
    initial_road: Option<RoadId>,
    initial_s: f64,
    initial_committed: bool,
}

impl SimCar {
    /// Creates a detached car
    pub fn new(id: CarId, params: CarParams) -> Self {
        Self {
            id,
            max_speed: params.max_speed.max(0.0),
            acceleration: params.acceleration.max(0.0),
            state: Mutex::new(CarState::default()),
            initial_road: None,
            initial_s: 0.0,
            initial_committed: false,
        }
    }

    pub fn id(&self) -> CarId {
        self.id
    }

    fn lock_state(&self) -> MutexGuard<'_, CarState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current dynamic state
    pub fn state(&self) -> CarState {
        *self.lock_state()
    }

    pub fn road(&self) -> Option<RoadId> {
        self.lock_state().road
    }

    pub fn velocity(&self) -> f64 {
        self.lock_state().v
    }

    pub fn max_speed(&self) -> f64 {
        self.max_speed
    }

    pub fn acceleration(&self) -> f64 {
        self.acceleration
    }

    pub fn set_max_speed(&mut self, max_speed: f64) {
        self.max_speed = max_speed.max(0.0);
    }

    pub fn set_acceleration(&mut self, acceleration: f64) {
        self.acceleration = acceleration.max(0.0);
    }

    pub fn initial_road(&self) -> Option<RoadId> {
        self.initial_road
    }

    pub fn initial_s(&self) -> f64 {
        self.initial_s
    }

    /// Places the car on `road` at `offset` meters and remembers that spot
    /// as the place to return to on reset. A car placed beyond the stop line
    /// counts as already through it.
    pub fn attach_to(&mut self, road: &SimRoad, offset: f64) {
        let s = offset.clamp(0.0, road.length());
        let committed = s > road.stop_line();
        *self.lock_state() = CarState {
            road: Some(road.id()),
            s,
            v: 0.0,
            target_v: 0.0,
            committed,
        };
        self.initial_road = Some(road.id());
        self.initial_s = s;
        self.initial_committed = committed;
    }

    /// Puts the car back where it was attached, at rest
    pub fn reset_to_initial_state(&self) {
        *self.lock_state() = CarState {
            road: self.initial_road,
            s: self.initial_s,
            v: 0.0,
            target_v: 0.0,
            committed: self.initial_committed,
        };
    }

    /// Update car movement logic for one tick
    pub fn update(
        &self,
        delta_secs: f64,
        view: TrafficView<'_>,
        rng: &mut impl Rng,
    ) -> CarUpdateResult {
        let current = self.state();
        let Some(road_id) = current.road else {
            return CarUpdateResult::Detached;
        };
        let Some(road) = view.network.get_road(road_id) else {
            let mut state = self.lock_state();
            state.v = 0.0;
            state.target_v = 0.0;
            return CarUpdateResult::Stranded;
        };

        let stop_line = road.stop_line();
        let must_stop = !current.committed && !signal_allows_entry(road, view);
        let target_v = self.decide_target_speed(road, &current, must_stop, view);

        let v = approach(current.v, target_v, self.acceleration * delta_secs);
        let potential_s = current.s + v * delta_secs;

        let mut next = CarState {
            road: Some(road_id),
            s: potential_s,
            v,
            target_v,
            committed: current.committed,
        };

        let result = if must_stop && potential_s >= stop_line {
            next.s = stop_line;
            next.v = 0.0;
            CarUpdateResult::StoppedAtLine
        } else if potential_s >= road.length() {
            match self.choose_next_road(road, view, rng) {
                Some(next_road) => {
                    let overflow = (potential_s - road.length()).min(next_road.length());
                    let next_stop_line = next_road.stop_line();
                    next.road = Some(next_road.id());
                    next.v = v.min(next_road.speed_limit());
                    if signal_allows_entry(next_road, view) {
                        next.s = overflow;
                        next.committed = overflow > next_stop_line;
                    } else {
                        // Carried distance never takes a car past a closed stop line
                        next.s = overflow.min(next_stop_line);
                        next.committed = false;
                        if overflow >= next_stop_line {
                            next.v = 0.0;
                        }
                    }
                    CarUpdateResult::EnteredRoad(next_road.id())
                }
                None => {
                    next.s = road.length();
                    next.v = 0.0;
                    CarUpdateResult::DeadEnd(road.to())
                }
            }
        } else {
            // must_stop implies potential_s < stop_line here
            next.committed = current.committed || potential_s > stop_line;
            CarUpdateResult::Continue
        };

        *self.lock_state() = next;
        result
    }

    fn decide_target_speed(
        &self,
        road: &SimRoad,
        current: &CarState,
        must_stop: bool,
        view: TrafficView<'_>,
    ) -> f64 {
        let effective_limit = self.max_speed.min(road.speed_limit());
        let mut closest_obstacle = f64::INFINITY;

        if must_stop {
            closest_obstacle = (road.stop_line() - current.s).max(0.0);
        }

        if let Some(leader_s) = self.find_leader(road.id(), current.s, view.cars) {
            let gap = leader_s - current.s - CAR_LENGTH - SAFE_FOLLOWING_GAP;
            closest_obstacle = closest_obstacle.min(gap.max(0.0));
        }

        if closest_obstacle.is_finite() {
            effective_limit.min(self.safe_speed(closest_obstacle))
        } else {
            effective_limit
        }
    }

    /// Highest speed from which the car can still stop within `distance`.
    /// A car that cannot brake must always stop.
    fn safe_speed(&self, distance: f64) -> f64 {
        if self.acceleration < MIN_USABLE_ACCELERATION {
            return 0.0;
        }
        (2.0 * self.acceleration * distance).sqrt()
    }

    /// Position of the nearest car ahead on the same road.
    /// Cars level with this one count as ahead if they were spawned earlier.
    /// Cars on the next road are not considered, so a car entering a road can
    /// land closer than `CAR_LENGTH` behind one queued near its start.
    fn find_leader(&self, road_id: RoadId, s: f64, cars: &HashMap<CarId, SimCar>) -> Option<f64> {
        cars.values()
            .filter(|other| other.id != self.id)
            .filter_map(|other| {
                let other_state = other.state();
                let ahead = other_state.s > s || (other_state.s == s && other.id < self.id);
                (other_state.road == Some(road_id) && ahead).then_some(other_state.s)
            })
            .min_by_key(|leader_s| OrderedFloat(*leader_s - s))
    }

    /// Picks a random legal successor of `road`; no U-turns through signals
    fn choose_next_road<'a>(
        &self,
        road: &SimRoad,
        view: TrafficView<'a>,
        rng: &mut impl Rng,
    ) -> Option<&'a SimRoad> {
        let destination = view.intersections.get(&road.to())?;
        let candidates: Vec<&SimRoad> = view
            .network
            .outgoing(road.to())
            .into_iter()
            .filter_map(|id| view.network.get_road(id))
            .filter(|next| destination.allows_u_turn() || next.to() != road.from())
            .collect();
        candidates.choose(rng).copied()
    }

    /// World position including the lane offset; origin when detached
    pub fn world_position(&self, network: &SimRoadNetwork) -> Vec2 {
        let state = self.state();
        let Some(road_id) = state.road else {
            return Vec2::ZERO;
        };
        let (Some(road), Some((start, end))) =
            (network.get_road(road_id), network.road_endpoints(road_id))
        else {
            return Vec2::ZERO;
        };
        let t = if road.length() > 0.0 {
            (state.s / road.length()).min(1.0)
        } else {
            0.0
        };
        start.lerp(&end, t) + network.lane_offset(road_id, LANE_OFFSET)
    }

    /// Heading in radians along the current road
    pub fn heading(&self, network: &SimRoadNetwork) -> f64 {
        self.road()
            .and_then(|road_id| network.road_endpoints(road_id))
            .map(|(start, end)| start.angle_to(&end))
            .unwrap_or(0.0)
    }
}

/// Whether the destination of `road` currently lets cars on it through.
/// A missing destination counts as RED.
fn signal_allows_entry(road: &SimRoad, view: TrafficView<'_>) -> bool {
    view.intersections
        .get(&road.to())
        .map(|intersection| intersection.signal_state_for(road.id()))
        .unwrap_or(LightState::Red)
        == LightState::Green
}

/// Moves `v` towards `target` by at most `step`
fn approach(v: f64, target: f64, step: f64) -> f64 {
    if (v - target).abs() < SPEED_SNAP_EPSILON {
        target
    } else if v < target {
        (v + step).min(target)
    } else {
        (v - step).max(target)
    }
}
