//! Snapshot types.
//!
//! The `Snapshot` struct provides a serializable view of the simulation state
//! for a renderer or any other host.

use crate::components::*;
use crate::lanes::{LaneId, LaneRegistry};
use crate::systems::economy::{MatchContext, MatchOutcome};
use crate::systems::movement::facing;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Snapshot of a single unit's state for serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSnapshot {
    pub id: UnitId,
    pub faction: Faction,
    pub kind: UnitKind,
    pub state: UnitState,
    pub lane: LaneId,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub health: i32,
    pub health_max: i32,
    /// Lane-axis direction the unit faces: `1.0`, `-1.0` or `0.0`.
    pub facing: f32,
    pub waypoint_index: usize,
    pub inactive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureSnapshot {
    pub id: StructureId,
    pub owner: Faction,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub health: i32,
    pub health_max: i32,
    pub destroyed: bool,
}

/// Complete simulation state snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Current simulation tick.
    pub tick: u64,
    /// Elapsed simulation time in seconds.
    pub time: f32,
    pub energy: f32,
    pub max_energy: f32,
    pub outcome: Option<MatchOutcome>,
    /// Units ordered by id.
    pub units: Vec<UnitSnapshot>,
    /// Structures ordered by id.
    pub structures: Vec<StructureSnapshot>,
}

impl Snapshot {
    /// Create a snapshot from the ECS world.
    pub fn from_world(world: &mut World, tick: u64, time: f32, axis: LaneAxis) -> Self {
        let mut structures = Vec::new();
        let mut structure_positions = HashMap::new();
        let mut structure_query = world
            .query_filtered::<(&StructureId, &Faction, &Position, &Vitality), With<Structure>>();
        for (id, owner, pos, vitality) in structure_query.iter(world) {
            structure_positions.insert(*id, *pos);
            structures.push(StructureSnapshot {
                id: *id,
                owner: *owner,
                x: pos.x,
                y: pos.y,
                z: pos.z,
                health: vitality.current(),
                health_max: vitality.max(),
                destroyed: !vitality.is_alive(),
            });
        }
        structures.sort_by_key(|s| s.id);

        let mut unit_positions = HashMap::new();
        let mut position_query = world.query_filtered::<(&UnitId, &Position), Without<Structure>>();
        for (id, pos) in position_query.iter(world) {
            unit_positions.insert(*id, *pos);
        }

        let mut units = Vec::new();
        let mut next_waypoints = Vec::new();
        let mut unit_query = world.query_filtered::<(
            &UnitId,
            &Faction,
            &UnitKind,
            &UnitState,
            &OnLane,
            &Position,
            &Vitality,
            &PathFollower,
            &Engagement,
            Has<Inactive>,
        ), Without<Structure>>();

        for (id, faction, kind, state, lane, pos, vitality, path, engagement, inactive) in
            unit_query.iter(world)
        {
            let looking_at = match state {
                UnitState::EngagingUnit => {
                    engagement.target.and_then(|t| unit_positions.get(&t).copied())
                }
                UnitState::EngagingStructure => {
                    engagement.structure.and_then(|s| structure_positions.get(&s).copied())
                }
                UnitState::Moving | UnitState::Dead => None,
            };
            next_waypoints.push(match state {
                UnitState::Moving => path.next_waypoint(),
                _ => None,
            });
            units.push(UnitSnapshot {
                id: *id,
                faction: *faction,
                kind: *kind,
                state: *state,
                lane: lane.0,
                x: pos.x,
                y: pos.y,
                z: pos.z,
                health: vitality.current(),
                health_max: vitality.max(),
                facing: looking_at.map(|to| facing(pos, &to, axis)).unwrap_or(0.0),
                waypoint_index: path.index,
                inactive,
            });
        }

        // Moving units face their next waypoint.
        if let Some(registry) = world.get_resource::<LaneRegistry>() {
            for (unit, next) in units.iter_mut().zip(next_waypoints) {
                if let Some(to) = next.and_then(|wp| registry.waypoint(wp)) {
                    let from = Position::new(unit.x, unit.y, unit.z);
                    unit.facing = facing(&from, &to, axis);
                }
            }
        }
        units.sort_by_key(|u| u.id);

        let (energy, max_energy, outcome) = world
            .get_resource::<MatchContext>()
            .map(|ctx| (ctx.energy(), ctx.max_energy(), ctx.outcome()))
            .unwrap_or((0.0, 0.0, None));

        Self {
            tick,
            time,
            energy,
            max_energy,
            outcome,
            units,
            structures,
        }
    }

    /// Serialize snapshot to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize snapshot to pretty JSON string.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }

    pub fn unit(&self, id: UnitId) -> Option<&UnitSnapshot> {
        self.units.iter().find(|u| u.id == id)
    }
}
