//! Core types for the traffic simulation
//!
//! Identifiers, world-space vectors and the road record shared by every
//! other module.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A unique identifier for simulation entities
/// This is a simple wrapper around a usize for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SimId(pub usize);

/// A wrapper type for intersection IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IntersectionId(pub SimId);

/// A wrapper type for road IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoadId(pub SimId);

/// A wrapper type for car IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CarId(pub SimId);

/// A wrapper type for signal group IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignalGroupId(pub SimId);

/// Hands out ids that are unique across every entity kind.
///
/// Cloning shares the counter, so ids allocated on a UI thread never collide
/// with ids allocated elsewhere. Ids are never reused.
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    next: Arc<AtomicUsize>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_sim_id(&self) -> SimId {
        SimId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// A 2D position in world meters
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Vec2) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn lerp(&self, other: &Vec2, t: f64) -> Vec2 {
        Vec2 {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    /// Angle in radians of the direction from this position to another
    pub fn angle_to(&self, other: &Vec2) -> f64 {
        (other.y - self.y).atan2(other.x - self.x)
    }

    /// Offset of length `offset` perpendicular to the direction towards `other`
    pub fn perpendicular_offset(&self, other: &Vec2, offset: f64) -> Vec2 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let len = (dx * dx + dy * dy).sqrt();
        if len > 1e-6 {
            Vec2 {
                x: -dy / len * offset,
                y: dx / len * offset,
            }
        } else {
            Vec2::ZERO
        }
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

/// A directed road between two intersections.
///
/// A two-way street is two opposing roads.
#[derive(Debug, Clone, PartialEq)]
pub struct SimRoad {
    id: RoadId,
    from: IntersectionId,
    to: IntersectionId,
    length: f64,
    speed_limit: f64,
}

impl SimRoad {
    pub fn new(
        id: RoadId,
        from: IntersectionId,
        to: IntersectionId,
        length: f64,
        speed_limit: f64,
    ) -> Self {
        Self {
            id,
            from,
            to,
            length: length.max(0.0),
            speed_limit,
        }
    }

    pub fn id(&self) -> RoadId {
        self.id
    }

    pub fn from(&self) -> IntersectionId {
        self.from
    }

    pub fn to(&self) -> IntersectionId {
        self.to
    }

    /// Length in meters, fixed at construction
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Speed limit in m/s
    pub fn speed_limit(&self) -> f64 {
        self.speed_limit
    }

    pub fn set_speed_limit(&mut self, speed_limit: f64) {
        self.speed_limit = speed_limit;
    }

    /// Distance from the start of the road at which vehicles halt for a signal
    pub fn stop_line(&self) -> f64 {
        (self.length - STOP_LINE_OFFSET).max(0.0)
    }
}

/// Fixed simulation step in milliseconds (~60 Hz)
pub const TICK_MS: u64 = 16;

/// Length of a car in meters
pub const CAR_LENGTH: f64 = 5.0;

/// Gap kept behind the car ahead, on top of its length
pub const SAFE_FOLLOWING_GAP: f64 = 3.0;

/// Distance before the intersection at which vehicles stop for a signal
pub const STOP_LINE_OFFSET: f64 = 7.0;

/// Lateral offset of a lane from the road centre line
pub const LANE_OFFSET: f64 = 1.4;
