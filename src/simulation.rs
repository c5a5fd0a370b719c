use crate::behavior::{Policy, Scene};
use crate::road::{LaneIndex, RoadNetwork};
use crate::vehicle::{Vehicle, VehicleAttributes};
use crate::{VehicleId, VehicleSet};
use itertools::Itertools;
use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// A traffic simulation.
pub struct Simulation {
    /// The road network.
    network: RoadNetwork,
    /// The vehicles being simulated.
    vehicles: VehicleSet,
    /// The source of randomness for behaviour randomisation.
    rng: StdRng,
    /// The current frame of simulation.
    frame: usize,
}

impl Simulation {
    /// Creates a new simulation on the given road network.
    pub fn new(network: RoadNetwork) -> Self {
        Self::with_rng(network, StdRng::from_entropy())
    }

    /// Creates a new simulation whose behaviour randomisation is reproducible.
    pub fn with_seed(network: RoadNetwork, seed: u64) -> Self {
        Self::with_rng(network, StdRng::seed_from_u64(seed))
    }

    fn with_rng(network: RoadNetwork, rng: StdRng) -> Self {
        Self {
            network,
            vehicles: VehicleSet::with_key(),
            rng,
            frame: 0,
        }
    }

    /// Adds a vehicle to the simulation.
    ///
    /// # Parameters
    /// * `attributes` - The vehicle's attributes
    /// * `lane` - The lane to place the vehicle on
    /// * `long` - The distance along the lane in m
    /// * `policy` - The driving policy, or `None` for a vehicle which keeps its speed and heading
    pub fn add_vehicle(
        &mut self,
        attributes: &VehicleAttributes,
        lane: LaneIndex,
        long: f64,
        policy: Option<Policy>,
    ) -> VehicleId {
        let network = &self.network;
        self.vehicles
            .insert_with_key(|id| Vehicle::new(id, network, attributes, lane, long, policy))
    }

    /// Adds a stationary obstacle the size of a vehicle.
    pub fn add_obstacle(&mut self, lane: LaneIndex, long: f64) -> VehicleId {
        let attributes = VehicleAttributes {
            enable_lane_change: false,
            ..Default::default()
        };
        self.add_vehicle(&attributes, lane, long, None)
    }

    /// Removes a vehicle from the simulation.
    pub fn remove_vehicle(&mut self, id: VehicleId) -> Option<Vehicle> {
        self.vehicles.remove(id)
    }

    /// Replaces a vehicle's policy, keeping its dynamical state. See [Vehicle::spawn_from].
    pub fn respawn_vehicle(&mut self, id: VehicleId, policy: Option<Policy>) {
        let vehicle = Vehicle::spawn_from(id, &self.vehicles[id], policy);
        self.vehicles[id] = vehicle;
    }

    /// Samples new behaviour parameters for a vehicle, from the ranges of its policy.
    pub fn randomize_behavior(&mut self, id: VehicleId) {
        if let Some(policy) = self.vehicles[id].policy_mut() {
            policy.randomize(&mut self.rng);
            debug!("Randomised behaviour of vehicle {:?}: {:?}", id, policy);
        }
    }

    /// Samples new behaviour parameters for every vehicle.
    pub fn randomize_behaviors(&mut self) {
        for (id, vehicle) in &mut self.vehicles {
            if let Some(policy) = vehicle.policy_mut() {
                policy.randomize(&mut self.rng);
                debug!("Randomised behaviour of vehicle {:?}: {:?}", id, policy);
            }
        }
    }

    /// Advances the simulation by `dt` seconds.
    ///
    /// Every vehicle first decides what to do from the same snapshot of the road,
    /// then the decisions are applied and the vehicles move.
    pub fn step(&mut self, dt: f64) {
        let decisions = {
            let scene = Scene::new(&self.network, &self.vehicles);
            self.vehicles
                .iter()
                .filter_map(|(id, vehicle)| vehicle.decide(&scene).map(|d| (id, d)))
                .collect::<Vec<_>>()
        };
        for (id, decision) in decisions {
            self.vehicles[id].commit(decision);
        }
        for (_, vehicle) in &mut self.vehicles {
            vehicle.integrate(dt, &self.network);
        }
        self.handle_collisions();
        self.frame += 1;
    }

    /// Marks every pair of overlapping vehicles as crashed.
    fn handle_collisions(&mut self) {
        let collisions = self
            .vehicles
            .values()
            .collect::<Vec<_>>()
            .into_iter()
            .tuple_combinations()
            .filter(|(a, b)| a.collides_with(b))
            .map(|(a, b)| (a.id(), b.id()))
            .collect::<Vec<_>>();

        for (a, b) in collisions {
            debug!("Vehicles {:?} and {:?} collided", a, b);
            self.vehicles[a].crash();
            self.vehicles[b].crash();
        }
    }

    /// Gets the current simulation frame index.
    pub fn frame(&self) -> usize {
        self.frame
    }

    /// Gets the road network.
    pub fn network(&self) -> &RoadNetwork {
        &self.network
    }

    /// Returns an iterator over all the vehicles in the simulation.
    pub fn iter_vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    /// Gets a reference to the vehicle with the given ID.
    pub fn get_vehicle(&self, vehicle_id: VehicleId) -> &Vehicle {
        &self.vehicles[vehicle_id]
    }

    /// Gets a mutable reference to the vehicle with the given ID.
    pub fn get_vehicle_mut(&mut self, vehicle_id: VehicleId) -> &mut Vehicle {
        &mut self.vehicles[vehicle_id]
    }

    /// Takes a snapshot of the current state of the road, as seen by the vehicles.
    pub fn scene(&self) -> Scene {
        Scene::new(&self.network, &self.vehicles)
    }
}
