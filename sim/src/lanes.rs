//! Lane registry: waypoint storage and lane lookups.
//!
//! Lanes are ordered waypoint handles. Waypoints are registered once and keep
//! their identity, so two lanes built from the same positions are still
//! different lanes unless they share waypoint handles.

use crate::components::Position;
use crate::error::{SimError, SimResult};
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Stable lane identifier, assigned in registration order and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct LaneId(pub u32);

impl fmt::Display for LaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lane#{}", self.0)
    }
}

/// Handle to a registered waypoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WaypointId(pub u32);

impl fmt::Display for WaypointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "waypoint#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lane {
    pub id: LaneId,
    pub waypoints: Vec<WaypointId>,
}

/// Registry of waypoints and lanes. Shared read-only by all units once the
/// match is set up.
#[derive(Resource, Debug, Default, Clone)]
pub struct LaneRegistry {
    waypoints: HashMap<WaypointId, Position>,
    /// Keyed by id, so iteration follows registration order.
    lanes: BTreeMap<LaneId, Lane>,
    next_waypoint: u32,
    next_lane: u32,
}

impl LaneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waypoint position and return its handle.
    pub fn add_waypoint(&mut self, position: Position) -> WaypointId {
        let id = WaypointId(self.next_waypoint);
        self.next_waypoint += 1;
        self.waypoints.insert(id, position);
        id
    }

    /// Remove a waypoint. Paths still referencing it become invalid.
    pub fn remove_waypoint(&mut self, id: WaypointId) -> Option<Position> {
        self.waypoints.remove(&id)
    }

    pub fn waypoint(&self, id: WaypointId) -> Option<Position> {
        self.waypoints.get(&id).copied()
    }

    /// Position of a waypoint, or a configuration error if it is gone.
    pub fn resolve(&self, id: WaypointId) -> SimResult<Position> {
        self.waypoint(id).ok_or(SimError::UnknownWaypoint(id))
    }

    /// Register a lane over already-registered waypoints.
    pub fn register(&mut self, waypoints: Vec<WaypointId>) -> SimResult<LaneId> {
        if let Some(missing) = waypoints.iter().find(|w| !self.waypoints.contains_key(w)) {
            return Err(SimError::UnknownWaypoint(*missing));
        }
        let id = LaneId(self.next_lane);
        self.next_lane += 1;
        self.lanes.insert(id, Lane { id, waypoints });
        Ok(id)
    }

    /// Register fresh waypoints at `positions` and a lane through them.
    pub fn register_positions(&mut self, positions: &[Position]) -> LaneId {
        let waypoints: Vec<WaypointId> = positions.iter().map(|p| self.add_waypoint(*p)).collect();
        let id = LaneId(self.next_lane);
        self.next_lane += 1;
        self.lanes.insert(id, Lane { id, waypoints });
        id
    }

    pub fn deregister(&mut self, id: LaneId) -> Option<Lane> {
        self.lanes.remove(&id)
    }

    pub fn lane(&self, id: LaneId) -> Option<&Lane> {
        self.lanes.get(&id)
    }

    /// Lanes in registration order.
    pub fn lanes(&self) -> impl Iterator<Item = &Lane> {
        self.lanes.values()
    }

    pub fn lane_ids(&self) -> Vec<LaneId> {
        self.lanes.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    /// Lane whose waypoint sequence is element-wise identical to `waypoints`.
    pub fn find_lane_by_waypoints(&self, waypoints: &[WaypointId]) -> Option<LaneId> {
        self.lanes
            .values()
            .find(|lane| lane.waypoints.as_slice() == waypoints)
            .map(|lane| lane.id)
    }

    /// Arithmetic mean of a lane's waypoint positions. `None` for empty lanes.
    pub fn centroid(&self, id: LaneId) -> Option<Position> {
        let lane = self.lanes.get(&id)?;
        let mut sum = Position::default();
        let mut count = 0usize;
        for wp in &lane.waypoints {
            if let Some(p) = self.waypoints.get(wp) {
                sum.x += p.x;
                sum.y += p.y;
                sum.z += p.z;
                count += 1;
            }
        }
        if count == 0 {
            return None;
        }
        let n = count as f32;
        Some(Position::new(sum.x / n, sum.y / n, sum.z / n))
    }

    /// Lane whose centroid is closest to `position`. Ties go to the lowest id.
    pub fn find_nearest_lane(&self, position: &Position) -> Option<LaneId> {
        let mut best: Option<(LaneId, f32)> = None;
        for id in self.lanes.keys() {
            let Some(center) = self.centroid(*id) else {
                continue;
            };
            let dist = position.distance_to(&center);
            if best.map_or(true, |(_, d)| dist < d) {
                best = Some((*id, dist));
            }
        }
        best.map(|(id, _)| id)
    }
}
