//! Traffic signal phase machine tests

use traffic_engine::simulation::{
    IdAllocator, LightState, RoadId, SignalController, SignalGroupId, SimId,
};

fn controller_with_roads(total: f64, yellow: f64, count: usize) -> (SignalController, Vec<RoadId>) {
    let ids = IdAllocator::new();
    let mut controller = SignalController::new(total, yellow);
    let roads: Vec<RoadId> = (0..count).map(|_| RoadId(ids.next_sim_id())).collect();
    for road in &roads {
        controller.register_incoming_road(*road, SignalGroupId(ids.next_sim_id()));
    }
    (controller, roads)
}

#[test]
fn test_green_duration_splits_cycle() {
    let (single, _) = controller_with_roads(25.0, 3.0, 1);
    assert!((single.green_duration() - 22.0).abs() < 1e-9);

    let (pair, _) = controller_with_roads(25.0, 3.0, 2);
    assert!((pair.green_duration() - 9.5).abs() < 1e-9);

    let (four, _) = controller_with_roads(25.0, 3.0, 4);
    assert!((four.green_duration() - 3.25).abs() < 1e-9);
    assert!((four.phase_duration() - 6.25).abs() < 1e-9);
}

#[test]
fn test_green_duration_never_negative() {
    let (controller, _) = controller_with_roads(25.0, 10.0, 4);
    assert_eq!(controller.green_duration(), 0.0);
}

#[test]
fn test_green_duration_follows_setters() {
    let (mut controller, _) = controller_with_roads(25.0, 3.0, 2);
    controller.set_total_cycle_time(40.0);
    assert!((controller.green_duration() - 17.0).abs() < 1e-9);
    controller.set_yellow_duration(5.0);
    assert!((controller.green_duration() - 15.0).abs() < 1e-9);
}

#[test]
fn test_first_registered_road_starts_green() {
    let (controller, roads) = controller_with_roads(25.0, 3.0, 3);
    assert_eq!(controller.state_for(roads[0]), LightState::Green);
    assert_eq!(controller.state_for(roads[1]), LightState::Red);
    assert_eq!(controller.state_for(roads[2]), LightState::Red);
}

#[test]
fn test_unknown_road_sees_red() {
    let (controller, _) = controller_with_roads(25.0, 3.0, 2);
    assert_eq!(controller.state_for(RoadId(SimId(9999))), LightState::Red);
}

#[test]
fn test_registering_twice_is_ignored() {
    let (mut controller, roads) = controller_with_roads(25.0, 3.0, 2);
    controller.register_incoming_road(roads[1], SignalGroupId(SimId(500)));
    assert_eq!(controller.phase_count(), 2);
}

#[test]
fn test_at_most_one_group_not_red() {
    let (mut controller, roads) = controller_with_roads(25.0, 3.0, 4);

    for _ in 0..(60_000 / 16) {
        controller.update(0.016);
        let not_red = roads
            .iter()
            .filter(|road| controller.state_for(**road) != LightState::Red)
            .count();
        assert!(not_red <= 1, "{} groups showed a non-red light", not_red);
    }
}

#[test]
fn test_phases_advance_in_registration_order() {
    // green 4s, yellow 1s per phase
    let (mut controller, roads) = controller_with_roads(10.0, 1.0, 2);

    for _ in 0..3 {
        controller.update(1.0);
    }
    assert_eq!(controller.state_for(roads[0]), LightState::Green);

    controller.update(1.0);
    assert_eq!(controller.state_for(roads[0]), LightState::Yellow);
    assert_eq!(controller.state_for(roads[1]), LightState::Red);

    controller.update(1.0);
    assert_eq!(controller.state_for(roads[0]), LightState::Red);
    assert_eq!(controller.state_for(roads[1]), LightState::Green);
    assert_eq!(controller.current_phase(), 1);
    assert_eq!(controller.phase_timer(), 0.0);

    for _ in 0..5 {
        controller.update(1.0);
    }
    assert_eq!(controller.current_phase(), 0);
    assert_eq!(controller.state_for(roads[0]), LightState::Green);
}

#[test]
fn test_removing_active_group_hands_over_phase() {
    let (mut controller, roads) = controller_with_roads(30.0, 3.0, 3);
    controller.update(2.0);

    controller.unregister_incoming_road(roads[0]);

    assert_eq!(controller.phase_count(), 2);
    assert_eq!(controller.current_phase(), 0);
    assert_eq!(controller.phase_timer(), 0.0);
    assert_eq!(controller.state_for(roads[1]), LightState::Green);
    assert_eq!(controller.state_for(roads[2]), LightState::Red);
    assert!((controller.green_duration() - 12.0).abs() < 1e-9);
}

#[test]
fn test_removing_earlier_group_keeps_active_road() {
    let (mut controller, roads) = controller_with_roads(10.0, 1.0, 3);
    // 10/3 - 1 green, so 3.4s lands in phase 1
    controller.update(3.4);
    assert_eq!(controller.active_road(), Some(roads[1]));

    controller.unregister_incoming_road(roads[0]);
    assert_eq!(controller.active_road(), Some(roads[1]));
    assert_eq!(controller.current_phase(), 0);
}

#[test]
fn test_empty_controller_update_is_noop() {
    let mut controller = SignalController::new(25.0, 3.0);
    controller.update(1.0);
    assert_eq!(controller.phase_count(), 0);
    assert_eq!(controller.green_duration(), 0.0);
}
