pub use behavior::{Decision, DrivingPolicy, Policy, Scene};
pub use cgmath;
pub use road::{CircularLane, Lane, LaneIndex, RoadNetwork, RouteStep, StraightLane};
pub use simulation::Simulation;
use slotmap::{new_key_type, SlotMap};
pub use slotmap::{Key, KeyData};
pub use util::Interval;
pub use vehicle::{Vehicle, VehicleAttributes};

pub mod behavior;
pub mod math;
pub mod road;
mod simulation;
mod util;
pub mod vehicle;

new_key_type! {
    /// Unique ID of a node in the [RoadNetwork].
    pub struct NodeId;
    /// Unique ID of a [Vehicle].
    pub struct VehicleId;
}

type VehicleSet = SlotMap<VehicleId, Vehicle>;
