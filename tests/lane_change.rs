//! Tests that involve vehicles changing lanes on a multi-lane road.

use traffic_behavior::{
    math::Point2d, LaneIndex, Policy, RoadNetwork, Simulation, StraightLane, VehicleAttributes,
};

/// A straight road with `count` lanes, 2 km long, heading along +x with lane `i` at `y = 4i`.
fn highway(count: usize) -> (Simulation, Vec<LaneIndex>) {
    let mut network = RoadNetwork::new();
    let a = network.add_node();
    let b = network.add_node();
    let lanes = (0..count)
        .map(|i| {
            let y = 4.0 * i as f64;
            network.add_lane(
                a,
                b,
                StraightLane::from_ends(Point2d::new(0.0, y), Point2d::new(2000.0, y)),
            )
        })
        .collect();
    (Simulation::with_seed(network, 1), lanes)
}

/// Test that a vehicle moves into a free lane to overtake a slow vehicle.
#[test]
fn overtakes_slow_vehicle() {
    let (mut sim, lanes) = highway(2);
    let veh = sim.add_vehicle(
        &VehicleAttributes {
            speed: 25.0,
            target_speed: Some(30.0),
            ..Default::default()
        },
        lanes[0],
        0.0,
        Some(Policy::idm()),
    );
    let slow = sim.add_vehicle(
        &VehicleAttributes {
            speed: 10.0,
            ..Default::default()
        },
        lanes[0],
        60.0,
        None,
    );

    let mut changed = false;
    for _ in 0..200 {
        sim.step(0.1);
        let vehicle = sim.get_vehicle(veh);
        assert!(!vehicle.crashed());
        changed |= vehicle.lane_index() == lanes[1];
    }

    let vehicle = sim.get_vehicle(veh);
    assert!(changed);
    assert!(vehicle.position().x > sim.get_vehicle(slow).position().x + 50.0);
    assert!(!sim.get_vehicle(slow).crashed());
}

/// Test that a vehicle sent to another lane settles on its centre line.
#[test]
fn converges_to_target_lane() {
    let (mut sim, lanes) = highway(3);
    let veh = sim.add_vehicle(
        &VehicleAttributes {
            speed: 20.0,
            target_lane_index: Some(lanes[1]),
            enable_lane_change: false,
            ..Default::default()
        },
        lanes[0],
        0.0,
        Some(Policy::idm()),
    );

    let mut max_y: f64 = 0.0;
    for _ in 0..300 {
        sim.step(0.05);
        max_y = max_y.max(sim.get_vehicle(veh).position().y);
    }

    let vehicle = sim.get_vehicle(veh);
    assert_eq!(vehicle.lane_index(), lanes[1]);
    assert_eq!(vehicle.target_lane_index(), lanes[1]);
    assert!((vehicle.position().y - 4.0).abs() < 0.2);
    assert!(vehicle.heading().abs() < 0.02);
    assert!(max_y < 8.0);
}

/// Test that a vehicle which may not change lanes stays behind a slow vehicle.
#[test]
fn lane_change_disabled() {
    let (mut sim, lanes) = highway(2);
    let veh = sim.add_vehicle(
        &VehicleAttributes {
            speed: 25.0,
            target_speed: Some(30.0),
            enable_lane_change: false,
            ..Default::default()
        },
        lanes[0],
        0.0,
        Some(Policy::idm()),
    );
    let slow = sim.add_vehicle(
        &VehicleAttributes {
            speed: 10.0,
            ..Default::default()
        },
        lanes[0],
        60.0,
        None,
    );

    for _ in 0..200 {
        sim.step(0.1);
        assert_eq!(sim.get_vehicle(veh).target_lane_index(), lanes[0]);
    }
    let vehicle = sim.get_vehicle(veh);
    assert!(!vehicle.crashed());
    assert!(vehicle.position().x < sim.get_vehicle(slow).position().x);
    assert!((vehicle.speed() - 10.0).abs() < 1.0);
}
