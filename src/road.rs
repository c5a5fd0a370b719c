//! The road network: a directed graph of nodes whose edges are segments of parallel lanes.

use crate::math::Point2d;
use crate::NodeId;
use arrayvec::ArrayVec;
use log::warn;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

pub use lane::{CircularLane, Lane, StraightLane, DEFAULT_WIDTH};

mod lane;

/// Weight of the heading misalignment, in m/rad, when looking up the closest lane.
const HEADING_WEIGHT: f64 = 1.0;

/// Identifies a lane: the segment running from `from` to `to`, and the lateral index
/// of the lane within that segment, in the order the lanes were added.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LaneIndex {
    pub from: NodeId,
    pub to: NodeId,
    pub id: usize,
}

impl LaneIndex {
    /// Creates a new lane index.
    pub const fn new(from: NodeId, to: NodeId, id: usize) -> Self {
        Self { from, to, id }
    }

    /// Whether both lanes belong to the same segment.
    pub fn same_segment(&self, other: &LaneIndex) -> bool {
        self.from == other.from && self.to == other.to
    }
}

/// A waypoint on a vehicle's route: a segment and, optionally, the lane it must be driven in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RouteStep {
    pub from: NodeId,
    pub to: NodeId,
    pub lane: Option<usize>,
}

impl RouteStep {
    /// Whether the waypoint refers to the segment containing the given lane.
    pub fn matches(&self, lane_index: &LaneIndex) -> bool {
        self.from == lane_index.from && self.to == lane_index.to
    }
}

impl From<LaneIndex> for RouteStep {
    fn from(index: LaneIndex) -> Self {
        Self {
            from: index.from,
            to: index.to,
            lane: Some(index.id),
        }
    }
}

/// The road network.
#[derive(Default)]
pub struct RoadNetwork {
    nodes: SlotMap<NodeId, Node>,
}

#[derive(Default)]
struct Node {
    /// The segments leaving this node, in insertion order.
    exits: Vec<Segment>,
}

struct Segment {
    to: NodeId,
    lanes: Vec<Box<dyn Lane>>,
}

/// The outcome of a [RoadNetwork::next_lane] query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NextLane {
    /// The lane to follow next.
    pub index: LaneIndex,
    /// Whether the first step of the route was consumed.
    pub route_consumed: bool,
}

impl RoadNetwork {
    /// Creates an empty road network.
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a node to the network.
    pub fn add_node(&mut self) -> NodeId {
        self.nodes.insert(Node::default())
    }

    /// Adds a lane to the segment running between two nodes, after any lanes
    /// already in the segment.
    pub fn add_lane(&mut self, from: NodeId, to: NodeId, lane: impl Lane + 'static) -> LaneIndex {
        let exits = &mut self.nodes[from].exits;
        let idx = match exits.iter().position(|s| s.to == to) {
            Some(idx) => idx,
            None => {
                exits.push(Segment { to, lanes: vec![] });
                exits.len() - 1
            }
        };
        let lanes = &mut exits[idx].lanes;
        lanes.push(Box::new(lane));
        LaneIndex::new(from, to, lanes.len() - 1)
    }

    /// Gets the lane with the given index, if it exists.
    pub fn lane(&self, index: LaneIndex) -> Option<&(dyn Lane + 'static)> {
        self.segment(index.from, index.to)?
            .get(index.id)
            .map(|lane| lane.as_ref())
    }

    /// Gets the lanes of the segment between two nodes.
    fn segment(&self, from: NodeId, to: NodeId) -> Option<&[Box<dyn Lane>]> {
        self.nodes
            .get(from)?
            .exits
            .iter()
            .find(|s| s.to == to)
            .map(|s| s.lanes.as_slice())
    }

    /// Iterates over the indices of every lane in the network.
    pub fn lane_indices(&self) -> impl Iterator<Item = LaneIndex> + '_ {
        self.nodes.iter().flat_map(|(from, node)| {
            node.exits
                .iter()
                .flat_map(move |s| (0..s.lanes.len()).map(move |id| LaneIndex::new(from, s.to, id)))
        })
    }

    /// The lanes adjacent to the given lane within its segment, lower index first.
    pub fn side_lanes(&self, index: LaneIndex) -> ArrayVec<LaneIndex, 2> {
        let mut lanes = ArrayVec::new();
        let count = self.segment(index.from, index.to).map_or(0, |s| s.len());
        if index.id > 0 {
            lanes.push(LaneIndex { id: index.id - 1, ..index });
        }
        if index.id + 1 < count {
            lanes.push(LaneIndex { id: index.id + 1, ..index });
        }
        lanes
    }

    /// Finds the lane closest to a point, favouring lanes aligned with `heading` if given.
    pub fn closest_lane_index(&self, position: Point2d, heading: Option<f64>) -> Option<LaneIndex> {
        self.lane_indices()
            .map(|index| {
                let lane = &self[index];
                let dist = match heading {
                    Some(heading) => lane.distance_with_heading(position, heading, HEADING_WEIGHT),
                    None => lane.distance(position),
                };
                (index, dist)
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(index, _)| index)
    }

    /// Determines the lane a vehicle should follow once it reaches the end of its current lane.
    ///
    /// If the route's first step is the current segment it is consumed. If the route then
    /// continues from the end of the current segment that segment is taken, otherwise the
    /// successor segment whose best lane is closest to the vehicle is chosen. The lateral index
    /// is kept when both segments have the same number of lanes, unless the route requires a
    /// specific lane; otherwise the closest lane is taken. Returns the current lane at dead ends.
    ///
    /// # Parameters
    /// * `current` - The lane currently being followed
    /// * `route` - The vehicle's route
    /// * `position` - The vehicle's position
    pub fn next_lane(&self, current: LaneIndex, route: &[RouteStep], position: Point2d) -> NextLane {
        let route_consumed = route.first().map_or(false, |step| step.matches(&current));
        let route = if route_consumed { &route[1..] } else { route };

        let planned = match route.first() {
            Some(step) if step.from == current.to => Some((step.to, step.lane)),
            Some(step) => {
                warn!("Route step {:?} does not start after current road {:?}", step, current);
                None
            }
            None => None,
        };

        // Project the vehicle onto the centre line of its lane
        let lane = &self[current];
        let (long, _) = lane.local_coordinates(position);
        let projected = lane.position(long, 0.0);

        let next = match planned {
            Some((next_to, next_id)) => self
                .next_lane_given_next_road(current, next_to, next_id, projected)
                .map(|(id, _)| LaneIndex::new(current.to, next_to, id)),
            None => self.nodes[current.to]
                .exits
                .iter()
                .filter_map(|s| {
                    self.next_lane_given_next_road(current, s.to, None, projected)
                        .map(|(id, dist)| (LaneIndex::new(current.to, s.to, id), dist))
                })
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(index, _)| index),
        };

        NextLane {
            index: next.unwrap_or(current),
            route_consumed,
        }
    }

    /// Chooses a lane on the segment from `current.to` to `next_to`, and its distance to `position`.
    fn next_lane_given_next_road(
        &self,
        current: LaneIndex,
        next_to: NodeId,
        next_id: Option<usize>,
        position: Point2d,
    ) -> Option<(usize, f64)> {
        let count = self.segment(current.from, current.to)?.len();
        let next_lanes = self.segment(current.to, next_to)?;
        let id = match next_id {
            Some(id) if id < next_lanes.len() => id,
            _ if count == next_lanes.len() => current.id,
            _ => (0..next_lanes.len())
                .min_by(|a, b| {
                    let da = next_lanes[*a].distance(position);
                    let db = next_lanes[*b].distance(position);
                    da.total_cmp(&db)
                })?,
        };
        Some((id, next_lanes[id].distance(position)))
    }
}

impl std::ops::Index<LaneIndex> for RoadNetwork {
    type Output = dyn Lane;

    fn index(&self, index: LaneIndex) -> &Self::Output {
        self.lane(index).expect("Lane index is not in the network.")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// Two nodes joined by a straight three-lane road heading along +x.
    fn highway() -> (RoadNetwork, [LaneIndex; 3]) {
        let mut network = RoadNetwork::new();
        let a = network.add_node();
        let b = network.add_node();
        let lanes = [0.0, 1.0, 2.0].map(|i| {
            let y = DEFAULT_WIDTH * i;
            network.add_lane(
                a,
                b,
                StraightLane::from_ends(Point2d::new(0.0, y), Point2d::new(500.0, y)),
            )
        });
        (network, lanes)
    }

    #[test]
    fn side_lanes() {
        let (network, [l0, l1, l2]) = highway();
        assert_eq!(network.side_lanes(l0).as_slice(), &[l1]);
        assert_eq!(network.side_lanes(l1).as_slice(), &[l0, l2]);
        assert_eq!(network.side_lanes(l2).as_slice(), &[l1]);
    }

    #[test]
    fn closest_lane() {
        let (network, [l0, l1, l2]) = highway();
        assert_eq!(network.closest_lane_index(Point2d::new(10.0, 0.5), None), Some(l0));
        assert_eq!(network.closest_lane_index(Point2d::new(10.0, 3.5), Some(0.0)), Some(l1));
        assert_eq!(network.closest_lane_index(Point2d::new(10.0, 9.0), Some(0.1)), Some(l2));
    }

    #[test]
    fn next_lane_keeps_lateral_index() {
        let mut network = RoadNetwork::new();
        let [a, b, c] = [(); 3].map(|_| network.add_node());
        for i in 0..2 {
            let y = DEFAULT_WIDTH * i as f64;
            network.add_lane(a, b, StraightLane::from_ends(Point2d::new(0.0, y), Point2d::new(100.0, y)));
            network.add_lane(b, c, StraightLane::from_ends(Point2d::new(100.0, y), Point2d::new(200.0, y)));
        }
        let current = LaneIndex::new(a, b, 1);
        let next = network.next_lane(current, &[], Point2d::new(99.0, 4.0));
        assert_eq!(next.index, LaneIndex::new(b, c, 1));
        assert!(!next.route_consumed);

        let route = [
            RouteStep { from: a, to: b, lane: None },
            RouteStep { from: b, to: c, lane: Some(0) },
        ];
        let next = network.next_lane(current, &route, Point2d::new(99.0, 4.0));
        assert_eq!(next.index, LaneIndex::new(b, c, 0));
        assert!(next.route_consumed);
    }

    #[test]
    fn next_lane_at_dead_end() {
        let (network, [_, l1, _]) = highway();
        let next = network.next_lane(l1, &[], Point2d::new(499.0, 4.0));
        assert_eq!(next.index, l1);
    }
}
