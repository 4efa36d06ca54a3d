//! Per-lane index of live units for opponent lookups.
//!
//! Units only ever fight opponents on their own lane, so the index buckets
//! entries by lane instead of by grid cell. Queries are O(k) in the number of
//! units on one lane.

use crate::components::{DistanceMetric, Faction, LaneAxis, OnLane, Position, UnitId, UnitState};
use crate::lanes::LaneId;
use bevy_ecs::prelude::*;
use std::collections::HashMap;

/// Entry for one live unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaneEntry {
    pub entity: Entity,
    pub id: UnitId,
    pub faction: Faction,
    pub lane: LaneId,
    pub position: Position,
}

/// Live-unit table, rebuilt at the start of every tick.
///
/// Also serves as the liveness check for non-owning `UnitId` target handles:
/// a handle is valid exactly when it resolves here.
#[derive(Resource, Debug, Default)]
pub struct LaneIndex {
    lanes: HashMap<LaneId, Vec<LaneEntry>>,
    by_id: HashMap<UnitId, LaneEntry>,
}

impl LaneIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all entries (call at start of each tick before rebuilding).
    pub fn clear(&mut self) {
        self.lanes.clear();
        self.by_id.clear();
    }

    pub fn insert(&mut self, entry: LaneEntry) {
        if self.by_id.contains_key(&entry.id) {
            self.remove(entry.id);
        }
        self.lanes.entry(entry.lane).or_default().push(entry);
        self.by_id.insert(entry.id, entry);
    }

    /// Drop a unit, e.g. when it dies mid-tick.
    pub fn remove(&mut self, id: UnitId) -> Option<LaneEntry> {
        let entry = self.by_id.remove(&id)?;
        if let Some(bucket) = self.lanes.get_mut(&entry.lane) {
            bucket.retain(|e| e.id != id);
        }
        Some(entry)
    }

    pub fn get(&self, id: UnitId) -> Option<&LaneEntry> {
        self.by_id.get(&id)
    }

    pub fn is_live(&self, id: UnitId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Units registered on `lane`.
    pub fn on_lane(&self, lane: LaneId) -> &[LaneEntry] {
        self.lanes.get(&lane).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Nearest opponent of `faction` on `lane` within `radius`.
    ///
    /// Equal distances resolve to the lowest unit id so results do not depend
    /// on iteration order.
    pub fn nearest_opponent(
        &self,
        lane: LaneId,
        faction: Faction,
        position: &Position,
        metric: DistanceMetric,
        axis: LaneAxis,
        radius: f32,
    ) -> Option<LaneEntry> {
        let opponent = faction.opponent();
        let mut best: Option<(LaneEntry, f32)> = None;
        for entry in self.on_lane(lane) {
            if entry.faction != opponent {
                continue;
            }
            let dist = metric.measure(position, &entry.position, axis);
            if dist > radius {
                continue;
            }
            let better = match best {
                None => true,
                Some((b, d)) => dist < d || (dist == d && entry.id < b.id),
            };
            if better {
                best = Some((*entry, dist));
            }
        }
        best.map(|(e, _)| e)
    }

    pub fn total_count(&self) -> usize {
        self.by_id.len()
    }
}

/// System that rebuilds the lane index each tick.
///
/// Inactive units stay in the index: they cannot act, but they can be hit.
pub fn lane_index_update_system(
    mut index: ResMut<LaneIndex>,
    query: Query<(Entity, &UnitId, &Faction, &OnLane, &Position, &UnitState)>,
) {
    index.clear();

    for (entity, id, faction, lane, pos, state) in query.iter() {
        if *state == UnitState::Dead {
            continue;
        }
        index.insert(LaneEntry {
            entity,
            id: *id,
            faction: *faction,
            lane: lane.0,
            position: *pos,
        });
    }
}
