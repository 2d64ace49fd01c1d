//! Commands posted to the simulation thread and the changes it reports back

use std::fmt;
use std::ops::Deref;

use super::car::{CarParams, SimCar};
use super::intersection::{IntersectionParams, SimIntersection};
use super::types::{CarId, IntersectionId, RoadId, SimRoad, Vec2};

/// Handle to any entity in the world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ItemId {
    Intersection(IntersectionId),
    Road(RoadId),
    Car(CarId),
}

impl From<IntersectionId> for ItemId {
    fn from(id: IntersectionId) -> Self {
        ItemId::Intersection(id)
    }
}

impl From<RoadId> for ItemId {
    fn from(id: RoadId) -> Self {
        ItemId::Road(id)
    }
}

impl From<CarId> for ItemId {
    fn from(id: CarId) -> Self {
        ItemId::Car(id)
    }
}

/// Access to an entity handed to update closures.
///
/// Each handle derefs to the entity for reading but only exposes the tunable
/// parameters for writing, so identity and topology stay fixed.
pub enum ItemMut<'a> {
    Intersection(IntersectionMut<'a>),
    Road(RoadMut<'a>),
    Car(CarMut<'a>),
}

pub struct IntersectionMut<'a>(&'a mut SimIntersection);

impl<'a> IntersectionMut<'a> {
    pub(crate) fn new(intersection: &'a mut SimIntersection) -> Self {
        Self(intersection)
    }

    /// Roundabouts only
    pub fn set_speed_limit(&mut self, speed_limit: f64) {
        self.0.set_speed_limit(speed_limit);
    }

    /// Signalised only
    pub fn set_total_cycle_time(&mut self, total_cycle_time: f64) {
        if let Some(signals) = self.0.signals_mut() {
            signals.set_total_cycle_time(total_cycle_time);
        }
    }

    /// Signalised only
    pub fn set_yellow_duration(&mut self, yellow_duration: f64) {
        if let Some(signals) = self.0.signals_mut() {
            signals.set_yellow_duration(yellow_duration);
        }
    }
}

impl Deref for IntersectionMut<'_> {
    type Target = SimIntersection;

    fn deref(&self) -> &SimIntersection {
        self.0
    }
}

pub struct RoadMut<'a>(&'a mut SimRoad);

impl<'a> RoadMut<'a> {
    pub(crate) fn new(road: &'a mut SimRoad) -> Self {
        Self(road)
    }

    pub fn set_speed_limit(&mut self, speed_limit: f64) {
        self.0.set_speed_limit(speed_limit);
    }
}

impl Deref for RoadMut<'_> {
    type Target = SimRoad;

    fn deref(&self) -> &SimRoad {
        self.0
    }
}

pub struct CarMut<'a>(&'a mut SimCar);

impl<'a> CarMut<'a> {
    pub(crate) fn new(car: &'a mut SimCar) -> Self {
        Self(car)
    }

    pub fn set_max_speed(&mut self, max_speed: f64) {
        self.0.set_max_speed(max_speed);
    }

    pub fn set_acceleration(&mut self, acceleration: f64) {
        self.0.set_acceleration(acceleration);
    }
}

impl Deref for CarMut<'_> {
    type Target = SimCar;

    fn deref(&self) -> &SimCar {
        self.0
    }
}

/// Closure applied to an entity on the simulation thread
pub type ItemUpdate = Box<dyn FnOnce(ItemMut<'_>) + Send>;

/// Where a new car enters the network
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VehicleSpawn {
    /// Start of the first outgoing road of the intersection
    AtIntersection(IntersectionId),
    /// A given distance along a road
    OnRoad { road: RoadId, offset: f64 },
}

/// A request to change the simulation, applied on the next tick
pub enum SimCommand {
    Start,
    Pause,
    /// Pause, rewind the clock to zero and put every car back at its spawn
    Stop,
    AddIntersection {
        id: IntersectionId,
        position: Vec2,
        params: IntersectionParams,
    },
    AddRoad {
        id: RoadId,
        from: IntersectionId,
        to: IntersectionId,
        speed_limit: f64,
    },
    AddVehicle {
        id: CarId,
        params: CarParams,
        spawn: VehicleSpawn,
    },
    Delete(ItemId),
    Update {
        item: ItemId,
        apply: ItemUpdate,
    },
    ClearAll,
}

impl fmt::Debug for SimCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimCommand::Start => write!(f, "Start"),
            SimCommand::Pause => write!(f, "Pause"),
            SimCommand::Stop => write!(f, "Stop"),
            SimCommand::AddIntersection {
                id,
                position,
                params,
            } => f
                .debug_struct("AddIntersection")
                .field("id", id)
                .field("position", position)
                .field("params", params)
                .finish(),
            SimCommand::AddRoad {
                id,
                from,
                to,
                speed_limit,
            } => f
                .debug_struct("AddRoad")
                .field("id", id)
                .field("from", from)
                .field("to", to)
                .field("speed_limit", speed_limit)
                .finish(),
            SimCommand::AddVehicle { id, params, spawn } => f
                .debug_struct("AddVehicle")
                .field("id", id)
                .field("params", params)
                .field("spawn", spawn)
                .finish(),
            SimCommand::Delete(item) => f.debug_tuple("Delete").field(item).finish(),
            SimCommand::Update { item, .. } => {
                f.debug_struct("Update").field("item", item).finish_non_exhaustive()
            }
            SimCommand::ClearAll => write!(f, "ClearAll"),
        }
    }
}

/// A structural change committed by the simulation thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimChange {
    Added(ItemId),
    Removed(ItemId),
    Cleared,
}
