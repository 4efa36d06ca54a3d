//! Unit behavior - the per-unit state machine shared by both factions.
//!
//! Each tick a unit runs, in order:
//! 1. Structure resolution (attackers die when none can be found).
//! 2. Cooldown decrement.
//! 3. One step of its current state: Moving, EngagingUnit or EngagingStructure.
//!
//! ## Phases
//!
//! 1. **Perception** - for every Moving unit, find the nearest same-lane
//!    opponent in the start-of-tick `LaneIndex`. Pure reads, so it runs with
//!    rayon under the `parallel` feature.
//! 2. **Act** - units are processed sequentially in id order. Unit hits are
//!    queued in `PendingDamage`; structure hits land immediately.
//!
//! Opponent positions come from the start-of-tick snapshot for every unit,
//! whatever order units are processed in.

use crate::components::*;
use crate::config::SimConfig;
use crate::events::{DeathCause, SimEvent, SimEventBuffer};
use crate::lanes::{LaneId, LaneRegistry};
use crate::policy::{FactionPolicy, RangedApproach, TimeoutAction};
use crate::spatial::{LaneEntry, LaneIndex};
use crate::systems::damage::{strike_structure, Hit, PendingDamage};
use crate::systems::economy::MatchContext;
use crate::systems::movement::{advance_along, DeltaTime};
use bevy_ecs::prelude::*;
use std::collections::HashMap;
use tracing::{debug, error, info};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Float slack on structure range checks, so a unit parked exactly at its
/// standoff point counts as in range.
const RANGE_SLACK: f32 = 1e-3;

/// Start-of-tick copy of a structure's identity and placement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StructureView {
    pub entity: Entity,
    pub id: StructureId,
    pub owner: Faction,
    pub position: Position,
    /// Health above zero at the start of the tick.
    pub standing: bool,
}

/// The structure `faction` fights against: lowest id among the standing
/// structures owned by the opponent.
pub fn find_enemy_structure(
    views: &[StructureView],
    faction: Faction,
) -> Option<StructureView> {
    let owner = faction.opponent();
    views
        .iter()
        .filter(|v| v.owner == owner && v.standing)
        .min_by_key(|v| v.id)
        .copied()
}

/// Keep the current structure if it still exists, otherwise look one up.
fn resolve_structure(
    views: &[StructureView],
    current: Option<StructureId>,
    faction: Faction,
) -> Option<StructureView> {
    if let Some(id) = current {
        if let Some(view) = views.iter().find(|v| v.id == id) {
            return Some(*view);
        }
    }
    find_enemy_structure(views, faction)
}

/// Lane-axis point exactly `range` short of the structure, on the unit's side.
fn standoff_point(pos: &Position, structure: &Position, range: f32, axis: LaneAxis) -> Position {
    let tower = structure.along(axis);
    let desired = if tower - pos.along(axis) >= 0.0 {
        tower - range
    } else {
        tower + range
    };
    let mut point = *pos;
    point.set_along(axis, desired);
    point
}

/// Detection request for one Moving unit.
#[derive(Debug, Clone, Copy)]
struct Probe {
    entity: Entity,
    lane: LaneId,
    faction: Faction,
    position: Position,
    radius: f32,
    metric: DistanceMetric,
}

fn perceive(probe: &Probe, index: &LaneIndex, axis: LaneAxis) -> Option<(Entity, LaneEntry)> {
    index
        .nearest_opponent(
            probe.lane,
            probe.faction,
            &probe.position,
            probe.metric,
            axis,
            probe.radius,
        )
        .map(|found| (probe.entity, found))
}

fn mark_dead(
    state: &mut UnitState,
    id: UnitId,
    faction: Faction,
    cause: DeathCause,
    index: &mut LaneIndex,
    events: &mut SimEventBuffer,
) {
    *state = UnitState::Dead;
    index.remove(id);
    events.push(SimEvent::UnitDied {
        unit: id,
        faction,
        cause,
    });
}

/// System that advances every active unit's state machine by one tick.
#[allow(clippy::too_many_arguments)]
pub fn unit_behavior_system(
    dt: Res<DeltaTime>,
    config: Res<SimConfig>,
    registry: Res<LaneRegistry>,
    mut index: ResMut<LaneIndex>,
    mut pending: ResMut<PendingDamage>,
    mut ctx: ResMut<MatchContext>,
    mut events: ResMut<SimEventBuffer>,
    mut commands: Commands,
    mut units: Query<
        (
            Entity,
            &UnitId,
            &Faction,
            &UnitKind,
            &UnitStats,
            &OnLane,
            &mut Position,
            &mut UnitState,
            &mut PathFollower,
            &mut CombatTimers,
            &mut Engagement,
        ),
        (Without<Structure>, Without<Inactive>),
    >,
    mut structures: Query<
        (Entity, &StructureId, &Faction, &Position, &mut Vitality),
        With<Structure>,
    >,
) {
    let delta = dt.0;
    let axis = config.lane_axis;
    let threshold = config.arrival_threshold;

    let mut views: Vec<StructureView> = structures
        .iter()
        .map(|(entity, id, owner, position, vitality)| StructureView {
            entity,
            id: *id,
            owner: *owner,
            position: *position,
            standing: vitality.is_alive(),
        })
        .collect();
    views.sort_by_key(|v| v.id);

    // PERCEPTION PHASE
    let probes: Vec<Probe> = units
        .iter()
        .filter(|item| *item.7 == UnitState::Moving)
        .map(|(entity, _, faction, kind, stats, lane, pos, ..)| {
            let detection = config.policy(*faction).detection;
            Probe {
                entity,
                lane: lane.0,
                faction: *faction,
                position: *pos,
                radius: detection.radius(*kind, stats.attack_range),
                metric: detection.metric(),
            }
        })
        .collect();

    #[cfg(feature = "parallel")]
    let sightings: HashMap<Entity, LaneEntry> = {
        let snapshot: &LaneIndex = &index;
        probes
            .par_iter()
            .filter_map(|probe| perceive(probe, snapshot, axis))
            .collect()
    };

    #[cfg(not(feature = "parallel"))]
    let sightings: HashMap<Entity, LaneEntry> = probes
        .iter()
        .filter_map(|probe| perceive(probe, &index, axis))
        .collect();

    // ACT PHASE
    let mut order: Vec<(UnitId, Entity)> =
        units.iter().map(|item| (*item.1, item.0)).collect();
    order.sort_unstable_by_key(|(id, _)| *id);

    for (_, entity) in order {
        let Ok((
            _,
            id,
            faction,
            kind,
            stats,
            _lane,
            mut pos,
            mut state,
            mut path,
            mut timers,
            mut engagement,
        )) = units.get_mut(entity)
        else {
            continue;
        };
        if *state == UnitState::Dead {
            continue;
        }
        let id = *id;
        let faction = *faction;
        let kind = *kind;
        let policy: &FactionPolicy = config.policy(faction);

        // 1. Structure resolution
        let structure = resolve_structure(&views, engagement.structure, faction);
        match structure {
            Some(view) => {
                // Read live health: an earlier unit may have brought it down this tick.
                let standing = structures
                    .get(view.entity)
                    .is_ok_and(|(.., vitality)| vitality.is_alive());
                if !standing {
                    // The siege is over for every unit bound to the fallen structure.
                    info!(unit = %id, structure = %view.id, "enemy structure down, unit removed");
                    mark_dead(
                        &mut state,
                        id,
                        faction,
                        DeathCause::SiegeComplete,
                        &mut index,
                        &mut events,
                    );
                    continue;
                }
                if engagement.structure != Some(view.id) {
                    debug!(unit = %id, structure = %view.id, "enemy structure resolved");
                }
                engagement.structure = Some(view.id);
            }
            None => {
                engagement.structure = None;
                if policy.dies_without_structure {
                    info!(unit = %id, "no enemy structure, unit removed");
                    mark_dead(
                        &mut state,
                        id,
                        faction,
                        DeathCause::StructureMissing,
                        &mut index,
                        &mut events,
                    );
                    continue;
                }
                if *state == UnitState::EngagingStructure {
                    debug!(unit = %id, "enemy structure lost, waiting");
                    *state = UnitState::Moving;
                }
            }
        }

        // 2. Cooldown
        timers.cooldown = (timers.cooldown - delta).max(0.0);

        match *state {
            UnitState::Moving => {
                if let Some(found) = sightings.get(&entity).filter(|f| index.is_live(f.id)) {
                    debug!(unit = %id, target = %found.id, "engaging unit");
                    engagement.target = Some(found.id);
                    timers.engagement = 0.0;
                    *state = UnitState::EngagingUnit;
                    continue;
                }

                if let Some(view) = structure {
                    if pos.distance_to(&view.position) <= stats.attack_range {
                        debug!(unit = %id, structure = %view.id, "structure in range");
                        timers.engagement = 0.0;
                        *state = UnitState::EngagingStructure;
                        continue;
                    }
                }

                // Skip waypoints already reached so progress is strictly forward.
                let mut target = None;
                while let Some(wp) = path.next_waypoint() {
                    let Some(wp_pos) = registry.waypoint(wp) else {
                        error!(unit = %id, waypoint = %wp, "waypoint missing, unit disabled");
                        commands.entity(entity).insert(Inactive);
                        events.push(SimEvent::UnitDisabled {
                            unit: id,
                            reason: format!("waypoint {wp} is not registered"),
                        });
                        break;
                    };
                    if pos.axis_distance(&wp_pos, axis) < threshold {
                        path.index += 1;
                    } else {
                        target = Some(wp_pos);
                        break;
                    }
                }

                if let Some(wp_pos) = target {
                    let step = stats.move_speed * delta;
                    let remaining = advance_along(&mut pos, &wp_pos, axis, step);
                    if remaining < threshold {
                        path.index += 1;
                    }
                } else if !path.is_finished() {
                    // Disabled above.
                    continue;
                }

                if path.is_finished() {
                    if structure.is_some() {
                        info!(unit = %id, "reached end of path, engaging structure");
                        timers.engagement = 0.0;
                        *state = UnitState::EngagingStructure;
                    } else {
                        debug!(unit = %id, "reached end of path, no structure to engage");
                    }
                }
            }

            UnitState::EngagingUnit => {
                let target = engagement.target.and_then(|t| index.get(t).copied());
                let Some(target) = target else {
                    debug!(unit = %id, "target lost, resuming path");
                    engagement.target = None;
                    *state = UnitState::Moving;
                    continue;
                };

                let dist = policy.unit_range.metric().measure(&pos, &target.position, axis);
                if dist <= policy.unit_range.reach(stats.attack_range) {
                    if timers.cooldown <= 0.0 {
                        pending.push(Hit {
                            attacker: id,
                            target: target.id,
                            target_entity: target.entity,
                            amount: stats.damage,
                        });
                        timers.cooldown = stats.attack_interval();
                    }
                } else {
                    let step = stats.move_speed * policy.chase_speed_multiplier * delta;
                    let gap = advance_along(&mut pos, &target.position, axis, step);
                    if let Some(snap) = policy.unit_range.snap_distance() {
                        if gap <= snap {
                            pos.set_along(axis, target.position.along(axis));
                        }
                    }
                }
            }

            UnitState::EngagingStructure => {
                let Some(view) = structure else {
                    *state = UnitState::Moving;
                    continue;
                };

                timers.engagement += delta;
                if timers.engagement > policy.engagement_timeout {
                    match policy.timeout_action {
                        TimeoutAction::SelfDestruct => {
                            info!(unit = %id, "structure engagement timed out, unit removed");
                            mark_dead(
                                &mut state,
                                id,
                                faction,
                                DeathCause::EngagementTimeout,
                                &mut index,
                                &mut events,
                            );
                            continue;
                        }
                        TimeoutAction::ResetClock => {
                            debug!(unit = %id, "structure engagement clock reset");
                            timers.engagement = 0.0;
                        }
                    }
                }

                if kind.is_ranged() && policy.ranged_approach == RangedApproach::Standoff {
                    let standoff = standoff_point(&pos, &view.position, stats.attack_range, axis);
                    if pos.axis_distance(&standoff, axis) > threshold {
                        advance_along(&mut pos, &standoff, axis, stats.move_speed * delta);
                        continue;
                    }
                    pos.set_along(axis, standoff.along(axis));
                }

                if pos.distance_to(&view.position) <= stats.attack_range + RANGE_SLACK {
                    if timers.cooldown > 0.0 {
                        continue;
                    }
                    timers.cooldown = stats.attack_interval();
                    let Ok((_, _, _, _, mut vitality)) = structures.get_mut(view.entity) else {
                        continue;
                    };
                    let destroyed = strike_structure(
                        view.id,
                        view.owner,
                        &mut vitality,
                        stats.damage,
                        &mut ctx,
                        &mut events,
                    );
                    if destroyed {
                        mark_dead(
                            &mut state,
                            id,
                            faction,
                            DeathCause::SiegeComplete,
                            &mut index,
                            &mut events,
                        );
                    }
                } else if !kind.is_ranged() {
                    advance_along(&mut pos, &view.position, axis, stats.move_speed * delta);
                }
                // Ranged units out of range hold position.
            }

            UnitState::Dead => {}
        }
    }
}
