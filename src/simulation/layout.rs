//! Built-in demo layout: a block of four signalised corners

use super::car::CarParams;
use super::command::VehicleSpawn;
use super::engine::SimClient;
use super::intersection::IntersectionParams;
use super::types::{CarId, IntersectionId, RoadId, Vec2};

/// 35 mph
pub const DEFAULT_ROAD_SPEED_LIMIT: f64 = 15.6464;

/// 30 mph
pub const DEFAULT_CAR_MAX_SPEED: f64 = 13.4112;

/// 0 to 60 mph in 15 s
pub const DEFAULT_CAR_ACCELERATION: f64 = 1.78816;

pub const DEFAULT_CYCLE_TIME: f64 = 25.0;
pub const DEFAULT_YELLOW_DURATION: f64 = 3.0;

const CORNERS: [(f64, f64); 4] = [(20.0, 20.0), (83.0, 20.0), (83.0, 52.0), (20.0, 52.0)];

/// Ids of everything the default layout posted
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultLayout {
    pub intersections: Vec<IntersectionId>,
    pub roads: Vec<RoadId>,
    pub cars: Vec<CarId>,
}

/// Posts the default layout through `client`; it appears on the next tick
pub fn build_default_layout(client: &SimClient) -> DefaultLayout {
    let intersections: Vec<IntersectionId> = CORNERS
        .iter()
        .map(|&(x, y)| {
            client.add_intersection(
                Vec2::new(x, y),
                IntersectionParams::Signalised {
                    total_cycle_time: DEFAULT_CYCLE_TIME,
                    yellow_duration: DEFAULT_YELLOW_DURATION,
                },
            )
        })
        .collect();

    let mut roads = Vec::with_capacity(intersections.len() * 2);
    for (i, &a) in intersections.iter().enumerate() {
        let b = intersections[(i + 1) % intersections.len()];
        let (forward, backward) = client.add_two_way_road(a, b, DEFAULT_ROAD_SPEED_LIMIT);
        roads.push(forward);
        roads.push(backward);
    }

    let params = CarParams {
        max_speed: DEFAULT_CAR_MAX_SPEED,
        acceleration: DEFAULT_CAR_ACCELERATION,
    };
    let cars = intersections
        .iter()
        .map(|&intersection| client.add_vehicle(params, VehicleSpawn::AtIntersection(intersection)))
        .collect();

    DefaultLayout {
        intersections,
        roads,
        cars,
    }
}
