//! Road network graph
//!
//! Adjacency over intersections and directed roads, kept in a stable
//! `petgraph` digraph so node and edge handles survive removals.

use anyhow::{Context, Result};
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashMap;

use super::types::{IntersectionId, RoadId, SimRoad, Vec2};

/// Directed road network
#[derive(Debug, Clone, Default)]
pub struct SimRoadNetwork {
    /// Nodes are intersections, edges are roads
    graph: StableDiGraph<IntersectionId, RoadId>,

    /// Maps intersection IDs to their node indices in the graph
    intersection_to_node: HashMap<IntersectionId, NodeIndex>,

    /// Maps road IDs to their edge indices in the graph
    road_to_edge: HashMap<RoadId, EdgeIndex>,

    /// Storage for road data
    roads: HashMap<RoadId, SimRoad>,

    /// Storage for intersection positions
    intersection_positions: HashMap<IntersectionId, Vec2>,
}

impl SimRoadNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an intersection to the network graph
    pub fn add_intersection(&mut self, intersection_id: IntersectionId, position: Vec2) {
        if self.intersection_to_node.contains_key(&intersection_id) {
            return;
        }

        let node_index = self.graph.add_node(intersection_id);
        self.intersection_to_node.insert(intersection_id, node_index);
        self.intersection_positions.insert(intersection_id, position);
    }

    pub fn contains_intersection(&self, intersection_id: IntersectionId) -> bool {
        self.intersection_to_node.contains_key(&intersection_id)
    }

    /// Gets the position of an intersection
    pub fn get_intersection_position(&self, intersection_id: IntersectionId) -> Option<&Vec2> {
        self.intersection_positions.get(&intersection_id)
    }

    /// Adds a road to the network; both endpoints must already be present
    pub fn add_road(&mut self, road: SimRoad) -> Result<()> {
        let from_node = *self
            .intersection_to_node
            .get(&road.from())
            .with_context(|| format!("Start intersection {:?} not found", road.from()))?;
        let to_node = *self
            .intersection_to_node
            .get(&road.to())
            .with_context(|| format!("End intersection {:?} not found", road.to()))?;

        if self.roads.contains_key(&road.id()) {
            anyhow::bail!("Road {:?} already exists", road.id());
        }

        let edge = self.graph.add_edge(from_node, to_node, road.id());
        self.road_to_edge.insert(road.id(), edge);
        self.roads.insert(road.id(), road);
        Ok(())
    }

    /// Gets a road by ID
    pub fn get_road(&self, road_id: RoadId) -> Option<&SimRoad> {
        self.roads.get(&road_id)
    }

    pub(crate) fn get_road_mut(&mut self, road_id: RoadId) -> Option<&mut SimRoad> {
        self.roads.get_mut(&road_id)
    }

    fn roads_directed(&self, intersection_id: IntersectionId, direction: Direction) -> Vec<RoadId> {
        let Some(node) = self.intersection_to_node.get(&intersection_id) else {
            return Vec::new();
        };
        let mut roads: Vec<RoadId> = self
            .graph
            .edges_directed(*node, direction)
            .map(|edge| *edge.weight())
            .collect();
        // Ids are handed out monotonically, so id order is insertion order
        roads.sort_unstable();
        roads
    }

    /// Roads leaving an intersection, in insertion order
    pub fn outgoing(&self, intersection_id: IntersectionId) -> Vec<RoadId> {
        self.roads_directed(intersection_id, Direction::Outgoing)
    }

    /// Roads arriving at an intersection, in insertion order
    pub fn incoming(&self, intersection_id: IntersectionId) -> Vec<RoadId> {
        self.roads_directed(intersection_id, Direction::Incoming)
    }

    /// Finds the first road connecting two intersections
    pub fn find_road_between(
        &self,
        from_intersection: IntersectionId,
        to_intersection: IntersectionId,
    ) -> Option<RoadId> {
        self.outgoing(from_intersection)
            .into_iter()
            .find(|road_id| {
                self.roads
                    .get(road_id)
                    .is_some_and(|road| road.to() == to_intersection)
            })
    }

    /// The road running in the reverse direction of `road_id`, if any
    pub fn find_opposite_road(&self, road_id: RoadId) -> Option<RoadId> {
        let road = self.roads.get(&road_id)?;
        self.find_road_between(road.to(), road.from())
    }

    /// Gets all roads starting or ending at an intersection
    pub fn connected_roads(&self, intersection_id: IntersectionId) -> Vec<RoadId> {
        let mut roads = self.outgoing(intersection_id);
        roads.extend(self.incoming(intersection_id));
        roads.sort_unstable();
        roads.dedup();
        roads
    }

    /// Remove a road from the network, returning it if it was present
    pub fn remove_road(&mut self, road_id: RoadId) -> Option<SimRoad> {
        let road = self.roads.remove(&road_id)?;
        if let Some(edge) = self.road_to_edge.remove(&road_id) {
            self.graph.remove_edge(edge);
        }
        Some(road)
    }

    /// Remove an intersection and every road touching it.
    /// Returns the removed roads in id order.
    pub fn remove_intersection(&mut self, intersection_id: IntersectionId) -> Vec<SimRoad> {
        let removed: Vec<SimRoad> = self
            .connected_roads(intersection_id)
            .into_iter()
            .filter_map(|road_id| self.remove_road(road_id))
            .collect();

        if let Some(node) = self.intersection_to_node.remove(&intersection_id) {
            self.graph.remove_node(node);
        }
        self.intersection_positions.remove(&intersection_id);

        removed
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Get number of roads
    pub fn road_count(&self) -> usize {
        self.roads.len()
    }

    /// Get number of intersections
    pub fn intersection_count(&self) -> usize {
        self.intersection_to_node.len()
    }

    /// Get all roads
    pub fn roads(&self) -> &HashMap<RoadId, SimRoad> {
        &self.roads
    }

    /// Get all intersection positions
    pub fn intersection_positions(&self) -> &HashMap<IntersectionId, Vec2> {
        &self.intersection_positions
    }

    /// Start and end position of a road
    pub fn road_endpoints(&self, road_id: RoadId) -> Option<(Vec2, Vec2)> {
        let road = self.roads.get(&road_id)?;
        let start = *self.intersection_positions.get(&road.from())?;
        let end = *self.intersection_positions.get(&road.to())?;
        Some((start, end))
    }

    /// Lane offset for a road: perpendicular to the canonical direction of the
    /// pair of endpoints, positive for the road travelling canonically
    pub fn lane_offset(&self, road_id: RoadId, offset: f64) -> Vec2 {
        let Some((start, end)) = self.road_endpoints(road_id) else {
            return Vec2::ZERO;
        };
        let canonical = start.x < end.x || ((start.x - end.x).abs() < 1e-6 && start.y < end.y);
        if canonical {
            start.perpendicular_offset(&end, offset)
        } else {
            end.perpendicular_offset(&start, -offset)
        }
    }
}
