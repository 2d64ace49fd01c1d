//! Traffic simulation engine core
//!
//! This module contains the road network, intersections, cars and the
//! fixed-rate engine that advances them. It runs headless; anything that
//! wants to draw the world reads published snapshots.

mod car;
mod command;
mod engine;
mod intersection;
mod layout;
mod road_network;
mod signal;
mod snapshot;
mod types;
mod world;

// Re-export public types for external use
pub use car::{CarParams, CarState, CarUpdateResult, SimCar, TrafficView};
pub use command::{
    CarMut, IntersectionMut, ItemId, ItemMut, ItemUpdate, RoadMut, SimChange, SimCommand,
    VehicleSpawn,
};
pub use engine::{EngineConfig, EngineHandle, RunState, SimClient, SimEngine};
pub use intersection::{IntersectionKind, IntersectionParams, SimIntersection};
pub use layout::{
    build_default_layout, DefaultLayout, DEFAULT_CAR_ACCELERATION, DEFAULT_CAR_MAX_SPEED,
    DEFAULT_CYCLE_TIME, DEFAULT_ROAD_SPEED_LIMIT, DEFAULT_YELLOW_DURATION,
};
pub use road_network::SimRoadNetwork;
pub use signal::{LightState, SignalController, SignalGroup};
pub use snapshot::{CarView, IntersectionView, SimSnapshot};
pub use types::{
    CarId, IdAllocator, IntersectionId, RoadId, SignalGroupId, SimId, SimRoad, Vec2, CAR_LENGTH,
    LANE_OFFSET, SAFE_FOLLOWING_GAP, STOP_LINE_OFFSET, TICK_MS,
};
pub use world::{SimWorld, WorldStats};
