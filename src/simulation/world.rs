//! Main simulation world that ties everything together
//!
//! The world owns every entity and the road network. It is only ever touched
//! by one thread at a time; [`crate::simulation::SimEngine`] owns it on the
//! simulation thread and feeds it commands between ticks.

use anyhow::{Context, Result};
use log::{debug, trace};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;

use super::car::{CarParams, CarUpdateResult, SimCar, TrafficView};
use super::command::{
    CarMut, IntersectionMut, ItemId, ItemMut, ItemUpdate, RoadMut, SimChange, VehicleSpawn,
};
use super::intersection::{IntersectionKind, IntersectionParams, SimIntersection};
use super::road_network::SimRoadNetwork;
use super::signal::LightState;
use super::types::{CarId, IdAllocator, IntersectionId, RoadId, SignalGroupId, SimRoad, Vec2};

/// Running counters over the lifetime of a world
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorldStats {
    /// Cars that crossed from one road onto another
    pub road_transitions: u64,
    /// Updates that ended with a car halted at a dead end
    pub dead_end_stops: u64,
}

/// The main simulation world
pub struct SimWorld {
    /// Road network and connectivity
    pub road_network: SimRoadNetwork,

    /// All intersections
    pub intersections: HashMap<IntersectionId, SimIntersection>,

    /// All cars
    pub cars: HashMap<CarId, SimCar>,

    /// Every entity in the order it is updated each tick
    entities: Vec<ItemId>,

    /// Shared with any client posting commands for this world
    ids: IdAllocator,

    /// Source of randomness for route choice
    rng: StdRng,

    /// Structural changes not yet collected
    changes: Vec<SimChange>,

    pub stats: WorldStats,
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl SimWorld {
    fn new_internal(ids: IdAllocator, rng: StdRng) -> Self {
        Self {
            road_network: SimRoadNetwork::new(),
            intersections: HashMap::new(),
            cars: HashMap::new(),
            entities: Vec::new(),
            ids,
            rng,
            changes: Vec::new(),
            stats: WorldStats::default(),
        }
    }

    pub fn new() -> Self {
        Self::new_internal(IdAllocator::new(), StdRng::from_os_rng())
    }

    /// Create a new SimWorld with a seeded RNG for reproducible simulations
    pub fn new_with_seed(seed: u64) -> Self {
        Self::new_internal(IdAllocator::new(), StdRng::seed_from_u64(seed))
    }

    /// Create a world that draws ids from `ids`, optionally seeded
    pub fn with_allocator(ids: IdAllocator, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self::new_internal(ids, rng)
    }

    pub fn id_allocator(&self) -> &IdAllocator {
        &self.ids
    }

    /// Entities in update order
    pub fn entities(&self) -> &[ItemId] {
        &self.entities
    }

    pub fn contains(&self, item: ItemId) -> bool {
        match item {
            ItemId::Intersection(id) => self.intersections.contains_key(&id),
            ItemId::Road(id) => self.road_network.get_road(id).is_some(),
            ItemId::Car(id) => self.cars.contains_key(&id),
        }
    }

    /// Takes the structural changes recorded since the last call
    pub fn drain_changes(&mut self) -> Vec<SimChange> {
        std::mem::take(&mut self.changes)
    }

    /// Add an intersection to the world
    pub fn add_intersection(
        &mut self,
        position: Vec2,
        params: IntersectionParams,
    ) -> IntersectionId {
        let id = IntersectionId(self.ids.next_sim_id());
        self.push_intersection(id, position, params);
        id
    }

    /// Add an intersection under an id allocated elsewhere
    pub fn insert_intersection(
        &mut self,
        id: IntersectionId,
        position: Vec2,
        params: IntersectionParams,
    ) -> Result<()> {
        if self.intersections.contains_key(&id) {
            anyhow::bail!("Intersection {:?} already exists", id);
        }
        self.push_intersection(id, position, params);
        Ok(())
    }

    fn push_intersection(&mut self, id: IntersectionId, position: Vec2, params: IntersectionParams) {
        self.intersections
            .insert(id, SimIntersection::new(id, position, params));
        self.road_network.add_intersection(id, position);
        self.entities.push(ItemId::Intersection(id));
        self.changes.push(SimChange::Added(ItemId::Intersection(id)));
    }

    /// Add a one-way road between two intersections
    pub fn add_road(
        &mut self,
        from: IntersectionId,
        to: IntersectionId,
        speed_limit: f64,
    ) -> Result<RoadId> {
        let id = RoadId(self.ids.next_sim_id());
        self.insert_road(id, from, to, speed_limit)?;
        Ok(id)
    }

    /// Add a road under an id allocated elsewhere.
    /// Its length is the distance between the two intersections.
    pub fn insert_road(
        &mut self,
        id: RoadId,
        from: IntersectionId,
        to: IntersectionId,
        speed_limit: f64,
    ) -> Result<()> {
        let start_pos = *self
            .road_network
            .get_intersection_position(from)
            .context("Start intersection not found")?;
        let end_pos = *self
            .road_network
            .get_intersection_position(to)
            .context("End intersection not found")?;

        let road = SimRoad::new(id, from, to, start_pos.distance(&end_pos), speed_limit);
        self.road_network.add_road(road)?;

        let group_id = SignalGroupId(self.ids.next_sim_id());
        if let Some(destination) = self.intersections.get_mut(&to) {
            destination.register_incoming_road(id, group_id);
        }

        self.entities.push(ItemId::Road(id));
        self.changes.push(SimChange::Added(ItemId::Road(id)));
        Ok(())
    }

    /// Add a two-way road between intersections (creates two logical roads)
    pub fn add_two_way_road(
        &mut self,
        a: IntersectionId,
        b: IntersectionId,
        speed_limit: f64,
    ) -> Result<(RoadId, RoadId)> {
        let forward = self.add_road(a, b, speed_limit)?;
        let backward = self.add_road(b, a, speed_limit)?;
        Ok((forward, backward))
    }

    /// Spawn a car
    pub fn add_vehicle(&mut self, params: CarParams, spawn: VehicleSpawn) -> Result<CarId> {
        let id = CarId(self.ids.next_sim_id());
        self.insert_vehicle(id, params, spawn)?;
        Ok(id)
    }

    /// Spawn a car under an id allocated elsewhere
    pub fn insert_vehicle(&mut self, id: CarId, params: CarParams, spawn: VehicleSpawn) -> Result<()> {
        if self.cars.contains_key(&id) {
            anyhow::bail!("Car {:?} already exists", id);
        }

        let (road_id, offset) = match spawn {
            VehicleSpawn::AtIntersection(intersection_id) => {
                let first = self
                    .road_network
                    .outgoing(intersection_id)
                    .first()
                    .copied()
                    .with_context(|| {
                        format!("No road leaves spawn intersection {:?}", intersection_id)
                    })?;
                (first, 0.0)
            }
            VehicleSpawn::OnRoad { road, offset } => (road, offset),
        };
        let road = self
            .road_network
            .get_road(road_id)
            .context("Spawn road not found")?;

        let mut car = SimCar::new(id, params);
        car.attach_to(road, offset);
        self.cars.insert(id, car);
        self.entities.push(ItemId::Car(id));
        self.changes.push(SimChange::Added(ItemId::Car(id)));
        Ok(())
    }

    /// Remove any entity. Returns `false` if it was already gone.
    pub fn remove(&mut self, item: ItemId) -> bool {
        match item {
            ItemId::Intersection(id) => self.remove_intersection(id),
            ItemId::Road(id) => self.remove_road(id),
            ItemId::Car(id) => self.remove_car(id),
        }
    }

    /// Remove an intersection together with every road touching it
    pub fn remove_intersection(&mut self, intersection_id: IntersectionId) -> bool {
        if !self.intersections.contains_key(&intersection_id)
            && !self.road_network.contains_intersection(intersection_id)
        {
            return false;
        }

        for road in self.road_network.remove_intersection(intersection_id) {
            self.forget_road(&road);
        }

        self.intersections.remove(&intersection_id);
        self.entities
            .retain(|entity| *entity != ItemId::Intersection(intersection_id));
        self.changes
            .push(SimChange::Removed(ItemId::Intersection(intersection_id)));
        true
    }

    /// Remove a road; its intersections stay
    pub fn remove_road(&mut self, road_id: RoadId) -> bool {
        match self.road_network.remove_road(road_id) {
            Some(road) => {
                self.forget_road(&road);
                true
            }
            None => false,
        }
    }

    /// Drops every reference to a road already taken out of the network
    fn forget_road(&mut self, road: &SimRoad) {
        if let Some(destination) = self.intersections.get_mut(&road.to()) {
            destination.unregister_incoming_road(road.id());
        }
        self.entities.retain(|entity| *entity != ItemId::Road(road.id()));
        self.changes.push(SimChange::Removed(ItemId::Road(road.id())));
    }

    /// Remove a car from the simulation
    pub fn remove_car(&mut self, car_id: CarId) -> bool {
        if self.cars.remove(&car_id).is_none() {
            return false;
        }
        self.entities.retain(|entity| *entity != ItemId::Car(car_id));
        self.changes.push(SimChange::Removed(ItemId::Car(car_id)));
        true
    }

    /// Run `apply` against an entity. Returns `false` if it no longer exists.
    pub fn update_item(&mut self, item: ItemId, apply: ItemUpdate) -> bool {
        let target = match item {
            ItemId::Intersection(id) => self
                .intersections
                .get_mut(&id)
                .map(|intersection| ItemMut::Intersection(IntersectionMut::new(intersection))),
            ItemId::Road(id) => self
                .road_network
                .get_road_mut(id)
                .map(|road| ItemMut::Road(RoadMut::new(road))),
            ItemId::Car(id) => self
                .cars
                .get_mut(&id)
                .map(|car| ItemMut::Car(CarMut::new(car))),
        };
        match target {
            Some(target) => {
                apply(target);
                true
            }
            None => false,
        }
    }

    /// Put every car back on its spawn road, at rest
    pub fn reset_cars(&mut self) {
        for car in self.cars.values() {
            car.reset_to_initial_state();
        }
    }

    /// Remove everything
    pub fn clear(&mut self) {
        self.road_network.clear();
        self.intersections.clear();
        self.cars.clear();
        self.entities.clear();
        self.changes.push(SimChange::Cleared);
    }

    /// Light shown to cars on `road` by its destination intersection
    pub fn signal_state(&self, road_id: RoadId) -> Option<LightState> {
        let road = self.road_network.get_road(road_id)?;
        let intersection = self.intersections.get(&road.to())?;
        Some(intersection.signal_state_for(road_id))
    }

    /// Advance every entity by `delta_secs`, in entity order
    pub fn tick(&mut self, delta_secs: f64) {
        let Self {
            road_network,
            intersections,
            cars,
            entities,
            rng,
            stats,
            ..
        } = self;

        for entity in entities.iter() {
            match *entity {
                ItemId::Road(_) => {}
                ItemId::Intersection(id) => {
                    if let Some(intersection) = intersections.get_mut(&id) {
                        intersection.update(delta_secs);
                    }
                }
                ItemId::Car(id) => {
                    let Some(car) = cars.get(&id) else {
                        continue;
                    };
                    let view = TrafficView {
                        network: &*road_network,
                        intersections: &*intersections,
                        cars: &*cars,
                    };
                    match car.update(delta_secs, view, &mut *rng) {
                        CarUpdateResult::EnteredRoad(road_id) => {
                            stats.road_transitions += 1;
                            trace!("car {:?} entered road {:?}", id, road_id);
                        }
                        CarUpdateResult::DeadEnd(intersection_id) => {
                            stats.dead_end_stops += 1;
                            trace!("car {:?} halted at dead end {:?}", id, intersection_id);
                        }
                        CarUpdateResult::Stranded => {
                            debug!("car {:?} is on a road that no longer exists", id);
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    /// Print a summary of the world state
    pub fn print_summary(&self, sim_time_secs: f64) {
        println!("=== Traffic Simulation Summary ===");
        println!("Time: {:.2}s", sim_time_secs);
        println!(
            "Intersections: {}, Roads: {}",
            self.road_network.intersection_count(),
            self.road_network.road_count()
        );
        println!("Cars: {}", self.cars.len());
        println!();

        let mut intersection_ids: Vec<_> = self.intersections.keys().copied().collect();
        intersection_ids.sort_unstable();
        println!("--- Intersections ---");
        for id in intersection_ids {
            let intersection = &self.intersections[&id];
            let position = intersection.position();
            match &intersection.kind {
                IntersectionKind::Signalised(signals) => println!(
                    "  Signal {:?} at ({:.1}, {:.1}): phase {}/{}, timer={:.1}s, green={:.1}s, active={:?}",
                    id.0 .0,
                    position.x,
                    position.y,
                    signals.current_phase(),
                    signals.phase_count(),
                    signals.phase_timer(),
                    signals.green_duration(),
                    signals.active_road().map(|road| road.0 .0)
                ),
                IntersectionKind::Roundabout { speed_limit } => println!(
                    "  Roundabout {:?} at ({:.1}, {:.1}): limit={:.1} m/s",
                    id.0 .0, position.x, position.y, speed_limit
                ),
            }
        }

        if !self.cars.is_empty() {
            let mut car_ids: Vec<_> = self.cars.keys().copied().collect();
            car_ids.sort_unstable();
            println!("--- Active Cars ---");
            for id in car_ids {
                let car = &self.cars[&id];
                let state = car.state();
                let position = car.world_position(&self.road_network);
                let light = state
                    .road
                    .and_then(|road| self.signal_state(road))
                    .map(|light| format!("{:?}", light))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "  Car {:?}: road={:?}, s={:.1}, speed={:.1}, position=({:.1}, {:.1}), light={}",
                    id.0 .0,
                    state.road.map(|road| road.0 .0),
                    state.s,
                    state.v,
                    position.x,
                    position.y,
                    light
                );
            }
        }
    }

    /// Draw a visual map of the world in the terminal
    pub fn draw_map(&self) {
        let positions = self.road_network.intersection_positions();
        if positions.is_empty() {
            println!("\n=== World Map ===\n(empty)\n");
            return;
        }

        // Find bounds of the world
        let mut min_x = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_y = f64::NEG_INFINITY;

        for pos in positions.values() {
            min_x = min_x.min(pos.x);
            max_x = max_x.max(pos.x);
            min_y = min_y.min(pos.y);
            max_y = max_y.max(pos.y);
        }

        // Add padding
        min_x -= 2.0;
        max_x += 2.0;
        min_y -= 2.0;
        max_y += 2.0;

        // One character per world meter horizontally, two meters vertically
        let scale_x = 1.0;
        let scale_y = 0.5;
        let width = (((max_x - min_x) * scale_x) as usize).max(1);
        let height = (((max_y - min_y) * scale_y) as usize).max(1);

        let mut grid = vec![vec![' '; width]; height];

        let to_grid = |pos: &Vec2| -> (usize, usize) {
            let col = ((pos.x - min_x) * scale_x) as usize;
            let row = ((pos.y - min_y) * scale_y) as usize;
            (row.min(height - 1), col.min(width - 1))
        };

        // Draw roads
        for road in self.road_network.roads().values() {
            let Some((start_pos, end_pos)) = self.road_network.road_endpoints(road.id()) else {
                continue;
            };

            let (start_row, start_col) = to_grid(&start_pos);
            let (end_row, end_col) = to_grid(&end_pos);

            // Simple line drawing (Bresenham-like)
            let dx = (end_col as i32 - start_col as i32).abs();
            let dy = (end_row as i32 - start_row as i32).abs();
            let sx = if start_col < end_col { 1 } else { -1 };
            let sy = if start_row < end_row { 1 } else { -1 };

            let mut err = dx - dy;
            let mut x = start_col as i32;
            let mut y = start_row as i32;

            loop {
                if x >= 0 && x < width as i32 && y >= 0 && y < height as i32 {
                    let cell = &mut grid[y as usize][x as usize];
                    if *cell == ' ' {
                        *cell = '.';
                    }
                }

                if x == end_col as i32 && y == end_row as i32 {
                    break;
                }

                let e2 = 2 * err;
                if e2 > -dy {
                    err -= dy;
                    x += sx;
                }
                if e2 < dx {
                    err += dx;
                    y += sy;
                }
            }
        }

        // Draw intersections
        for intersection in self.intersections.values() {
            let (row, col) = to_grid(&intersection.position());
            grid[row][col] = if intersection.is_signalised() { 'S' } else { 'R' };
        }

        // Draw cars
        for car in self.cars.values() {
            let (row, col) = to_grid(&car.world_position(&self.road_network));
            if grid[row][col] == ' ' || grid[row][col] == '.' {
                grid[row][col] = 'C';
            }
        }

        println!("\n=== World Map ===");
        println!("Legend: S=Signalised, R=Roundabout, C=Car, .=Road");
        println!();
        for row in &grid {
            let line: String = row.iter().collect();
            println!("{}", line);
        }
        println!();
    }
}
