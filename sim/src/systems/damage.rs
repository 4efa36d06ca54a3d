//! Damage application and dead-unit cleanup.
//!
//! Unit-on-unit hits are gathered during the behavior pass into
//! `PendingDamage` and applied here in one sequential pass, so every unit
//! decides against the same start-of-tick view of its opponents.
//!
//! Structure hits are applied immediately through `strike_structure`; only
//! one structure can fall per match and the outcome must be known before the
//! striking unit is resolved.

use crate::components::*;
use crate::events::{DeathCause, SimEvent, SimEventBuffer};
use crate::spatial::LaneIndex;
use crate::systems::economy::{MatchContext, MatchOutcome};
use bevy_ecs::prelude::*;
use tracing::{debug, info, warn};

/// One queued hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    pub attacker: UnitId,
    pub target: UnitId,
    pub target_entity: Entity,
    pub amount: i32,
}

/// Hits gathered during the current tick.
#[derive(Resource, Debug, Default)]
pub struct PendingDamage {
    pub hits: Vec<Hit>,
}

impl PendingDamage {
    pub fn push(&mut self, hit: Hit) {
        self.hits.push(hit);
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// Apply a hit to a structure. Returns `true` if this hit destroyed it.
///
/// A destroyed structure resolves the match through `MatchContext`; later
/// hits land on zero health and change nothing.
pub fn strike_structure(
    structure: StructureId,
    owner: Faction,
    vitality: &mut Vitality,
    amount: i32,
    ctx: &mut MatchContext,
    events: &mut SimEventBuffer,
) -> bool {
    match vitality.take_damage(amount) {
        Ok(DamageOutcome::Applied { remaining }) => {
            events.push(SimEvent::StructureDamaged {
                structure,
                amount,
                remaining,
            });
            false
        }
        Ok(DamageOutcome::Killed) => {
            events.push(SimEvent::StructureDamaged {
                structure,
                amount,
                remaining: 0,
            });
            events.push(SimEvent::StructureDestroyed { structure, owner });
            info!(%structure, ?owner, "structure destroyed");
            let outcome = MatchOutcome::from_fallen_structure(owner);
            if ctx.game_over(outcome.is_victory()) {
                events.push(SimEvent::GameOver {
                    victory: outcome.is_victory(),
                });
            }
            true
        }
        Err(err) => {
            warn!(%structure, %err, "structure hit rejected");
            false
        }
    }
}

/// System that applies queued unit hits.
///
/// Hits on units that already died this tick are dropped. A killing hit
/// marks the unit Dead and removes it from the lane index.
pub fn damage_apply_system(
    mut pending: ResMut<PendingDamage>,
    mut index: ResMut<LaneIndex>,
    mut events: ResMut<SimEventBuffer>,
    mut query: Query<(&UnitId, &Faction, &mut Vitality, &mut UnitState), Without<Structure>>,
) {
    for hit in pending.hits.drain(..) {
        let Ok((id, faction, mut vitality, mut state)) = query.get_mut(hit.target_entity) else {
            continue;
        };
        if *state == UnitState::Dead {
            continue;
        }
        match vitality.take_damage(hit.amount) {
            Ok(DamageOutcome::Applied { remaining }) => {
                debug!(
                    attacker = %hit.attacker,
                    target = %id,
                    amount = hit.amount,
                    remaining,
                    "hit"
                );
                events.push(SimEvent::UnitDamaged {
                    unit: *id,
                    amount: hit.amount,
                    remaining,
                });
            }
            Ok(DamageOutcome::Killed) => {
                debug!(attacker = %hit.attacker, target = %id, "killed");
                events.push(SimEvent::UnitDamaged {
                    unit: *id,
                    amount: hit.amount,
                    remaining: 0,
                });
                events.push(SimEvent::UnitDied {
                    unit: *id,
                    faction: *faction,
                    cause: DeathCause::Killed,
                });
                *state = UnitState::Dead;
                index.remove(*id);
            }
            Err(err) => warn!(target = %id, %err, "hit rejected"),
        }
    }
}

/// System that despawns every unit in Dead state.
pub fn dead_unit_cleanup_system(
    mut commands: Commands,
    query: Query<(Entity, &UnitState), Without<Structure>>,
) {
    for (entity, state) in query.iter() {
        if *state == UnitState::Dead {
            commands.entity(entity).despawn();
        }
    }
}
