//! Tests of the simulation driver: behaviour randomisation, respawning and data collection.

use traffic_behavior::{
    behavior::{FeatureLog, LinearPolicy},
    math::Point2d,
    LaneIndex, Policy, RoadNetwork, Simulation, StraightLane, VehicleAttributes,
};

fn two_lanes(seed: u64) -> (Simulation, [LaneIndex; 2]) {
    let mut network = RoadNetwork::new();
    let a = network.add_node();
    let b = network.add_node();
    let lanes = [0.0, 4.0].map(|y| {
        network.add_lane(
            a,
            b,
            StraightLane::from_ends(Point2d::new(0.0, y), Point2d::new(1000.0, y)),
        )
    });
    (Simulation::with_seed(network, seed), lanes)
}

fn cruising() -> VehicleAttributes {
    VehicleAttributes {
        speed: 20.0,
        target_speed: Some(25.0),
        ..Default::default()
    }
}

fn linear_weights(sim: &Simulation) -> Vec<[f64; 3]> {
    sim.iter_vehicles()
        .filter_map(|v| match v.policy() {
            Some(Policy::Linear(policy)) => Some(policy.params.acceleration),
            _ => None,
        })
        .collect()
}

/// Test that behaviour randomisation is reproducible from the seed.
#[test]
fn seeded_randomisation() {
    let run = |seed| {
        let (mut sim, lanes) = two_lanes(seed);
        for i in 0..4 {
            sim.add_vehicle(&cruising(), lanes[i % 2], 50.0 * i as f64, Some(Policy::linear()));
        }
        sim.randomize_behaviors();
        linear_weights(&sim)
    };

    let first = run(3);
    assert_eq!(first, run(3));
    assert_ne!(first, run(4));
    assert!(first.iter().all(|w| *w != [0.3, 0.3, 2.0]));
}

/// Test that respawning a vehicle with a new policy keeps its dynamical state.
#[test]
fn respawn_keeps_state() {
    let (mut sim, lanes) = two_lanes(0);
    let veh = sim.add_vehicle(&cruising(), lanes[0], 0.0, Some(Policy::idm()));
    for _ in 0..10 {
        sim.step(0.1);
    }
    let before = sim.get_vehicle(veh).clone();

    sim.respawn_vehicle(veh, Some(Policy::rule_based()));
    let after = sim.get_vehicle(veh);
    assert_eq!(after.id(), veh);
    assert_eq!(after.position(), before.position());
    assert_eq!(after.speed(), before.speed());
    assert_eq!(after.target_speed(), before.target_speed());
    assert_eq!(after.timer(), before.timer());
    assert!(matches!(after.policy(), Some(Policy::RuleBased(_))));
}

/// Test that linear vehicles record one sample per decision into a shared log.
#[test]
fn collects_features() {
    let (mut sim, lanes) = two_lanes(0);
    let log = FeatureLog::shared();
    for lane in lanes {
        let policy = LinearPolicy::default().with_sink(log.clone());
        sim.add_vehicle(&cruising(), lane, 0.0, Some(Policy::Linear(policy)));
    }
    sim.add_vehicle(&cruising(), lanes[0], 100.0, Some(Policy::idm()));

    for _ in 0..25 {
        sim.step(0.1);
    }

    let log = log.borrow();
    assert_eq!(log.longitudinal.len(), 50);
    assert_eq!(log.lateral.len(), 50);
    assert!(log.longitudinal.features.iter().all(|f| f.len() == 3));
    assert!(log.lateral.features.iter().all(|f| f.len() == 2));
}

/// Test that removed vehicles no longer take part in the simulation.
#[test]
fn remove_vehicle() {
    let (mut sim, lanes) = two_lanes(0);
    let veh = sim.add_vehicle(&cruising(), lanes[0], 0.0, Some(Policy::idm()));
    let other = sim.add_obstacle(lanes[1], 50.0);
    assert!(sim.remove_vehicle(veh).is_some());
    assert!(sim.remove_vehicle(veh).is_none());
    sim.step(0.1);
    assert_eq!(sim.iter_vehicles().count(), 1);
    assert_eq!(sim.get_vehicle(other).speed(), 0.0);
}
