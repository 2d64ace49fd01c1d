//! Road network topology and deletion tests

use traffic_engine::simulation::{
    IdAllocator, IntersectionId, IntersectionParams, ItemId, RoadId, SimChange, SimRoad,
    SimRoadNetwork, SimWorld, Vec2,
};

fn signalised() -> IntersectionParams {
    IntersectionParams::Signalised {
        total_cycle_time: 25.0,
        yellow_duration: 3.0,
    }
}

fn network_with(ids: &IdAllocator, positions: &[(f64, f64)]) -> (SimRoadNetwork, Vec<IntersectionId>) {
    let mut network = SimRoadNetwork::new();
    let intersections = positions
        .iter()
        .map(|&(x, y)| {
            let id = IntersectionId(ids.next_sim_id());
            network.add_intersection(id, Vec2::new(x, y));
            id
        })
        .collect();
    (network, intersections)
}

fn road(ids: &IdAllocator, from: IntersectionId, to: IntersectionId) -> SimRoad {
    SimRoad::new(RoadId(ids.next_sim_id()), from, to, 10.0, 15.0)
}

#[test]
fn test_opposite_road_lookup() {
    let ids = IdAllocator::new();
    let (mut network, i) = network_with(&ids, &[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]);
    let ab = road(&ids, i[0], i[1]);
    let ba = road(&ids, i[1], i[0]);
    let bc = road(&ids, i[1], i[2]);
    let (ab_id, ba_id, bc_id) = (ab.id(), ba.id(), bc.id());
    network.add_road(ab).expect("endpoints exist");
    network.add_road(ba).expect("endpoints exist");
    network.add_road(bc).expect("endpoints exist");

    assert_eq!(network.find_opposite_road(ab_id), Some(ba_id));
    assert_eq!(network.find_opposite_road(ba_id), Some(ab_id));
    assert_eq!(network.find_opposite_road(bc_id), None);
    assert_eq!(network.find_road_between(i[1], i[2]), Some(bc_id));
    assert_eq!(network.find_road_between(i[2], i[1]), None);
}

#[test]
fn test_outgoing_in_insertion_order() {
    let ids = IdAllocator::new();
    let (mut network, i) = network_with(&ids, &[(0.0, 0.0), (10.0, 0.0), (0.0, 10.0), (-10.0, 0.0)]);
    let mut expected = Vec::new();
    for &to in &[i[3], i[1], i[2]] {
        let r = road(&ids, i[0], to);
        expected.push(r.id());
        network.add_road(r).expect("endpoints exist");
    }

    assert_eq!(network.outgoing(i[0]), expected);
    assert!(network.incoming(i[0]).is_empty());
    assert_eq!(network.incoming(i[1]), vec![expected[1]]);
}

#[test]
fn test_connected_roads_both_directions() {
    let ids = IdAllocator::new();
    let (mut network, i) = network_with(&ids, &[(0.0, 0.0), (10.0, 0.0), (20.0, 0.0)]);
    let ab = road(&ids, i[0], i[1]);
    let cb = road(&ids, i[2], i[1]);
    let ac = road(&ids, i[0], i[2]);
    let (ab_id, cb_id) = (ab.id(), cb.id());
    network.add_road(ab).expect("endpoints exist");
    network.add_road(cb).expect("endpoints exist");
    network.add_road(ac).expect("endpoints exist");

    assert_eq!(network.connected_roads(i[1]), vec![ab_id, cb_id]);
    assert_eq!(network.connected_roads(i[0]).len(), 2);
}

#[test]
fn test_add_road_requires_endpoints() {
    let ids = IdAllocator::new();
    let (mut network, i) = network_with(&ids, &[(0.0, 0.0)]);
    let missing = IntersectionId(ids.next_sim_id());

    assert!(network.add_road(road(&ids, i[0], missing)).is_err());
    assert_eq!(network.road_count(), 0);
}

#[test]
fn test_add_road_rejects_duplicate_id() {
    let ids = IdAllocator::new();
    let (mut network, i) = network_with(&ids, &[(0.0, 0.0), (10.0, 0.0)]);
    let ab = road(&ids, i[0], i[1]);

    network.add_road(ab.clone()).expect("first insert succeeds");
    assert!(network.add_road(ab).is_err());
    assert_eq!(network.road_count(), 1);
}

#[test]
fn test_road_length_from_positions() {
    let mut world = SimWorld::new_with_seed(3);
    let a = world.add_intersection(Vec2::new(0.0, 0.0), signalised());
    let b = world.add_intersection(Vec2::new(30.0, 40.0), signalised());
    let ab = world.add_road(a, b, 15.0).expect("endpoints exist");

    let road = world.road_network.get_road(ab).expect("road was added");
    assert!((road.length() - 50.0).abs() < 1e-9);
    assert!((road.stop_line() - 43.0).abs() < 1e-9);
}

#[test]
fn test_deleting_middle_intersection_cascades() {
    let mut world = SimWorld::new_with_seed(3);
    let a = world.add_intersection(Vec2::new(0.0, 0.0), signalised());
    let b = world.add_intersection(Vec2::new(50.0, 0.0), signalised());
    let c = world.add_intersection(Vec2::new(100.0, 0.0), signalised());
    let (ab, ba) = world.add_two_way_road(a, b, 15.0).expect("endpoints exist");
    let (bc, cb) = world.add_two_way_road(b, c, 15.0).expect("endpoints exist");
    world.drain_changes();

    assert!(world.remove(ItemId::Intersection(b)));

    assert_eq!(world.road_network.road_count(), 0);
    assert_eq!(world.road_network.intersection_count(), 2);
    assert!(!world.contains(ItemId::Intersection(b)));
    assert!(world.contains(ItemId::Intersection(a)));
    assert!(world.contains(ItemId::Intersection(c)));
    for removed in [ab, ba, bc, cb] {
        assert!(!world.contains(ItemId::Road(removed)));
    }

    // their incoming roads went with b
    assert_eq!(world.intersections[&a].signals().map(|s| s.phase_count()), Some(0));
    assert_eq!(world.intersections[&c].signals().map(|s| s.phase_count()), Some(0));

    let changes = world.drain_changes();
    assert_eq!(changes.len(), 5);
    assert_eq!(changes.last(), Some(&SimChange::Removed(ItemId::Intersection(b))));
    assert_eq!(world.entities(), &[ItemId::Intersection(a), ItemId::Intersection(c)]);
}

#[test]
fn test_deleting_road_unregisters_signal_group() {
    let mut world = SimWorld::new_with_seed(3);
    let a = world.add_intersection(Vec2::new(0.0, 0.0), signalised());
    let b = world.add_intersection(Vec2::new(50.0, 0.0), signalised());
    let c = world.add_intersection(Vec2::new(50.0, 50.0), signalised());
    let ab = world.add_road(a, b, 15.0).expect("endpoints exist");
    let cb = world.add_road(c, b, 15.0).expect("endpoints exist");

    assert_eq!(world.intersections[&b].signals().map(|s| s.phase_count()), Some(2));
    assert!(world.remove_road(ab));
    assert!(!world.remove_road(ab));

    let signals = world.intersections[&b].signals().expect("b is signalised");
    assert_eq!(signals.phase_count(), 1);
    assert_eq!(signals.active_road(), Some(cb));
    assert_eq!(world.road_network.intersection_count(), 3);
}

#[test]
fn test_clear_empties_world() {
    let mut world = SimWorld::new_with_seed(3);
    let a = world.add_intersection(Vec2::new(0.0, 0.0), signalised());
    let b = world.add_intersection(Vec2::new(50.0, 0.0), signalised());
    world.add_two_way_road(a, b, 15.0).expect("endpoints exist");
    world.drain_changes();

    world.clear();

    assert_eq!(world.road_network.road_count(), 0);
    assert_eq!(world.road_network.intersection_count(), 0);
    assert!(world.intersections.is_empty());
    assert!(world.entities().is_empty());
    assert_eq!(world.drain_changes(), vec![SimChange::Cleared]);
}
