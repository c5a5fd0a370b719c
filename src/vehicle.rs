use self::dynamics::{bicycle_step, clip_action, Action, KinematicState};
use crate::behavior::{self, Decision, Policy, Scene};
use crate::math::{heading_vector, polygons_intersect, rot90, Point2d, Vector2d};
use crate::road::{LaneIndex, RoadNetwork, RouteStep};
use crate::VehicleId;
use cgmath::prelude::*;
use std::f64::consts::PI;

pub mod control;
pub mod dynamics;

/// The default vehicle length in m.
pub const LENGTH: f64 = 5.0;

/// The default vehicle width in m.
pub const WIDTH: f64 = 2.0;

/// A simulated vehicle.
#[derive(Clone, Debug)]
pub struct Vehicle {
    /// The vehicle's ID
    pub(crate) id: VehicleId,
    /// Half the vehicle's width in m.
    half_wid: f64,
    /// Half the vehicle's length in m.
    half_len: f64,
    /// The world space coordinates of the centre of the vehicle.
    position: Point2d,
    /// The heading in rad.
    heading: f64,
    /// The speed in m/s.
    speed: f64,
    /// The command applied during the next integration.
    action: Action,
    /// The lane the vehicle currently occupies.
    lane_index: LaneIndex,
    /// The lane the vehicle is committed to reach.
    target_lane_index: LaneIndex,
    /// The desired cruising speed in m/s.
    target_speed: f64,
    /// The remaining route, starting with the current or next segment.
    route: Vec<RouteStep>,
    /// The time since the last lane change evaluation in s.
    timer: f64,
    /// Whether the vehicle has collided with another.
    crashed: bool,
    /// Whether the vehicle may decide to change lanes by itself.
    enable_lane_change: bool,
    /// The driving policy, or `None` for a passive vehicle which issues no commands.
    policy: Option<Policy>,
}

/// The attributes of a simulated vehicle.
#[derive(Clone, Debug)]
pub struct VehicleAttributes {
    /// The vehicle length in m.
    pub length: f64,
    /// The vehicle width in m.
    pub width: f64,
    /// The initial speed in m/s.
    pub speed: f64,
    /// The initial heading in rad. Defaults to the heading of the lane.
    pub heading: Option<f64>,
    /// The desired cruising speed in m/s. Defaults to the initial speed.
    pub target_speed: Option<f64>,
    /// The lane to reach. Defaults to the initial lane.
    pub target_lane_index: Option<LaneIndex>,
    /// The route to follow.
    pub route: Vec<RouteStep>,
    /// Whether the vehicle may decide to change lanes by itself.
    pub enable_lane_change: bool,
    /// The initial lane change timer in s. Defaults to a value derived from the position.
    pub timer: Option<f64>,
}

impl Default for VehicleAttributes {
    fn default() -> Self {
        Self {
            length: LENGTH,
            width: WIDTH,
            speed: 0.0,
            heading: None,
            target_speed: None,
            target_lane_index: None,
            route: vec![],
            enable_lane_change: true,
            timer: None,
        }
    }
}

impl Vehicle {
    /// Creates a new vehicle on the centre line of a lane.
    ///
    /// # Parameters
    /// * `id` - The vehicle's ID
    /// * `network` - The road network
    /// * `attributes` - The vehicle's attributes
    /// * `lane_index` - The lane to place the vehicle on
    /// * `long` - The longitudinal position along the lane in m
    /// * `policy` - The driving policy, or `None` for a passive vehicle
    pub(crate) fn new(
        id: VehicleId,
        network: &RoadNetwork,
        attributes: &VehicleAttributes,
        lane_index: LaneIndex,
        long: f64,
        policy: Option<Policy>,
    ) -> Self {
        let lane = &network[lane_index];
        let position = lane.position(long, 0.0);
        let heading = attributes.heading.unwrap_or_else(|| lane.heading_at(long));
        let mut vehicle = Self {
            id,
            half_wid: 0.5 * attributes.width,
            half_len: 0.5 * attributes.length,
            position,
            heading,
            speed: attributes.speed,
            action: Action::default(),
            lane_index,
            target_lane_index: attributes.target_lane_index.unwrap_or(lane_index),
            target_speed: attributes.speed,
            route: attributes.route.clone(),
            timer: 0.0,
            crashed: false,
            enable_lane_change: attributes.enable_lane_change,
            policy,
        };
        vehicle.set_target_speed(attributes.target_speed.unwrap_or(attributes.speed));
        let timer = attributes.timer.unwrap_or_else(|| vehicle.initial_timer());
        vehicle.timer = timer;
        vehicle
    }

    /// Creates a new vehicle with the given policy from an existing one.
    ///
    /// The dynamical state, target lane, target speed, route and lane change timer are carried
    /// over. Everything else, including any collected training data, starts afresh.
    pub fn spawn_from(id: VehicleId, vehicle: &Vehicle, policy: Option<Policy>) -> Self {
        let mut spawned = Self {
            id,
            action: Action::default(),
            crashed: false,
            enable_lane_change: true,
            policy,
            route: vehicle.route.clone(),
            ..*vehicle
        };
        spawned.set_target_speed(vehicle.target_speed);
        spawned
    }

    /// A pseudo-random timer derived from the vehicle's position, which desynchronises
    /// the lane change decisions of different vehicles.
    fn initial_timer(&self) -> f64 {
        match &self.policy {
            Some(policy) => {
                let delay = policy.driver().lane_change().delay;
                ((self.position.x + self.position.y) * PI).rem_euclid(delay)
            }
            None => 0.0,
        }
    }

    /// Gets the vehicle's ID.
    pub fn id(&self) -> VehicleId {
        self.id
    }

    /// The vehicle's width in m.
    pub fn width(&self) -> f64 {
        2.0 * self.half_wid
    }

    /// The vehicle's length in m.
    pub fn length(&self) -> f64 {
        2.0 * self.half_len
    }

    /// The coordinates in world space of the centre of the vehicle.
    pub fn position(&self) -> Point2d {
        self.position
    }

    /// The vehicle's heading in rad.
    pub fn heading(&self) -> f64 {
        self.heading
    }

    /// A unit vector in world space aligned with the vehicle's heading.
    pub fn direction(&self) -> Vector2d {
        heading_vector(self.heading)
    }

    /// The vehicle's speed in m/s.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// The vehicle's velocity in world space, in m/s.
    pub fn velocity(&self) -> Vector2d {
        self.speed * self.direction()
    }

    /// The command applied during the next integration.
    pub fn action(&self) -> Action {
        self.action
    }

    /// The lane the vehicle currently occupies.
    pub fn lane_index(&self) -> LaneIndex {
        self.lane_index
    }

    /// The lane the vehicle is committed to reach.
    pub fn target_lane_index(&self) -> LaneIndex {
        self.target_lane_index
    }

    /// Whether the vehicle is part way through a lane change.
    pub fn is_changing_lane(&self) -> bool {
        self.lane_index != self.target_lane_index
    }

    /// The desired cruising speed in m/s.
    pub fn target_speed(&self) -> f64 {
        self.target_speed
    }

    /// Sets the desired cruising speed, clamped into the policy's speed range.
    pub fn set_target_speed(&mut self, target_speed: f64) {
        self.target_speed = match &self.policy {
            Some(policy) => policy.driver().target_speeds().clamp(target_speed),
            None => target_speed,
        };
    }

    /// The remaining route.
    pub fn route(&self) -> &[RouteStep] {
        &self.route
    }

    /// The time since the last lane change evaluation in s.
    pub fn timer(&self) -> f64 {
        self.timer
    }

    /// Whether the vehicle has collided with another.
    pub fn crashed(&self) -> bool {
        self.crashed
    }

    /// Whether the vehicle may decide to change lanes by itself.
    pub fn lane_change_enabled(&self) -> bool {
        self.enable_lane_change
    }

    /// The vehicle's driving policy.
    pub fn policy(&self) -> Option<&Policy> {
        self.policy.as_ref()
    }

    /// The vehicle's driving policy.
    pub fn policy_mut(&mut self) -> Option<&mut Policy> {
        self.policy.as_mut()
    }

    /// Whether the vehicle is driven by a policy, and so can change lanes.
    pub fn is_controlled(&self) -> bool {
        self.policy.is_some()
    }

    /// The longitudinal distance from this vehicle to another, along this vehicle's lane.
    pub fn lane_distance_to(&self, other: &Vehicle, network: &RoadNetwork) -> f64 {
        let lane = &network[self.lane_index];
        lane.local_coordinates(other.position).0 - lane.local_coordinates(self.position).0
    }

    /// The corners of the vehicle's footprint in world space.
    pub fn polygon(&self) -> [Point2d; 4] {
        let long = self.half_len * self.direction();
        let lat = self.half_wid * rot90(self.direction());
        let c = self.position;
        [c - long - lat, c + long - lat, c + long + lat, c - long + lat]
    }

    /// Determines whether the footprints of two vehicles intersect.
    pub fn collides_with(&self, other: &Vehicle) -> bool {
        if self.id == other.id {
            return false;
        }
        let diagonal = |v: &Vehicle| 2.0 * Vector2d::new(v.half_len, v.half_wid).magnitude();
        let reach = 0.5 * (diagonal(self) + diagonal(other));
        if (other.position - self.position).magnitude() > reach {
            return false;
        }
        polygons_intersect(&self.polygon(), &other.polygon())
    }

    /// Decides on the vehicle's next command, without modifying the vehicle.
    /// Returns `None` for passive or crashed vehicles.
    pub fn decide(&self, scene: &Scene) -> Option<Decision> {
        behavior::act(scene, self)
    }

    /// Applies a decision made by [Vehicle::decide].
    pub fn commit(&mut self, decision: Decision) {
        if self.crashed {
            return;
        }
        self.target_lane_index = decision.state.target_lane_index;
        self.target_speed = decision.state.target_speed;
        self.timer = decision.state.timer;
        if decision.state.route_consumed && !self.route.is_empty() {
            self.route.remove(0);
        }
        self.action = decision.action;
    }

    /// Marks the vehicle as crashed.
    pub(crate) fn crash(&mut self) {
        self.crashed = true;
    }

    /// Integrates the vehicle's kinematic state and advances its lane change timer.
    ///
    /// # Parameters
    /// * `dt` - The time step in seconds
    /// * `network` - The road network, used to find the lane the vehicle ends up in
    pub(crate) fn integrate(&mut self, dt: f64, network: &RoadNetwork) {
        if self.policy.is_some() && !self.crashed {
            self.timer += dt;
        }

        let action = clip_action(self.action, self.speed, self.crashed);
        let state = KinematicState {
            position: self.position,
            heading: self.heading,
            speed: self.speed,
        };
        let state = bicycle_step(state, action, self.half_len, dt);
        self.position = state.position;
        self.heading = state.heading;
        self.speed = state.speed;

        if let Some(lane_index) = network.closest_lane_index(self.position, Some(self.heading)) {
            self.lane_index = lane_index;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::behavior::fixture::Highway;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn target_speed_is_clamped() {
        let mut road = Highway::new();
        let attributes = VehicleAttributes {
            speed: 20.0,
            target_speed: Some(50.0),
            ..Default::default()
        };
        let id = road.spawn_with(&attributes, 0, 10.0, Some(Policy::rule_based()));
        assert_eq!(road.get(id).target_speed(), 30.0);
        let id = road.spawn_with(&attributes, 0, 50.0, None);
        assert_eq!(road.get(id).target_speed(), 50.0);
    }

    #[test]
    fn timer_is_desynchronised() {
        let mut road = Highway::new();
        let a = road.spawn(0, 10.0, 20.0, Some(Policy::idm()));
        let b = road.spawn(0, 10.37, 20.0, Some(Policy::idm()));
        let delay = Policy::idm().driver().lane_change().delay;
        for id in [a, b] {
            let timer = road.get(id).timer();
            assert!((0.0..delay).contains(&timer));
        }
        assert!(road.get(a).timer() != road.get(b).timer());
    }

    #[test]
    fn spawn_from_copies_dynamics() {
        let mut road = Highway::new();
        let attributes = VehicleAttributes {
            speed: 22.0,
            target_speed: Some(25.0),
            target_lane_index: Some(road.lanes[2]),
            timer: Some(0.05),
            ..Default::default()
        };
        let id = road.spawn_with(&attributes, 1, 40.0, Some(Policy::idm()));
        let original = road.get(id);
        let copy = Vehicle::spawn_from(id, original, Some(Policy::linear()));
        assert_eq!(copy.position(), original.position());
        assert_eq!(copy.speed(), 22.0);
        assert_eq!(copy.target_speed(), 25.0);
        assert_eq!(copy.target_lane_index(), road.lanes[2]);
        assert_eq!(copy.lane_index(), road.lanes[1]);
        assert_eq!(copy.timer(), 0.05);
        assert!(matches!(copy.policy(), Some(Policy::Linear(_))));
    }

    #[test]
    fn lane_distance() {
        let mut road = Highway::new();
        let a = road.spawn(0, 10.0, 20.0, None);
        let b = road.spawn(2, 35.0, 20.0, None);
        assert_approx_eq!(road.get(a).lane_distance_to(road.get(b), &road.network), 25.0);
        assert_approx_eq!(road.get(b).lane_distance_to(road.get(a), &road.network), -25.0);
    }

    #[test]
    fn collisions() {
        let mut road = Highway::new();
        let a = road.spawn(0, 10.0, 20.0, None);
        let b = road.spawn(0, 14.0, 20.0, None);
        let c = road.spawn(1, 14.0, 20.0, None);
        assert!(road.get(a).collides_with(road.get(b)));
        assert!(!road.get(a).collides_with(road.get(c)));
        assert!(!road.get(a).collides_with(road.get(a)));
    }

    #[test]
    fn wide_vehicle_spans_lanes() {
        let mut road = Highway::new();
        let attributes = VehicleAttributes {
            width: 7.0,
            length: 8.0,
            ..Default::default()
        };
        let wide = road.spawn_with(&attributes, 0, 20.0, None);
        let beside = road.spawn(1, 20.0, 20.0, None);
        let wide = road.get(wide);
        assert_eq!(wide.width(), 7.0);
        assert_eq!(wide.length(), 8.0);
        assert_eq!(road.get(beside).width(), WIDTH);
        assert!(wide.collides_with(road.get(beside)));
    }

    #[test]
    fn integrate_follows_lane() {
        let mut road = Highway::new();
        let id = road.spawn(1, 10.0, 10.0, Some(Policy::idm()));
        let Highway {
            network,
            lanes,
            vehicles,
        } = &mut road;
        let vehicle = &mut vehicles[id];
        let timer = vehicle.timer();
        vehicle.integrate(0.1, network);
        assert_approx_eq!(vehicle.position().x, 11.0);
        assert_approx_eq!(vehicle.timer(), timer + 0.1);
        assert_eq!(vehicle.lane_index(), lanes[1]);
    }
}
