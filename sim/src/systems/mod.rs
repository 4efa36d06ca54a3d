//! ECS Systems for the Lane Siege simulation.
//!
//! Systems contain the game logic that operates on components.
//!
//! ## Tick Order
//!
//! One fixed tick runs these systems chained, in order:
//! - `lane_index_update_system` - rebuilds the per-lane live-unit snapshot
//! - `energy_regen_system` - regenerates match energy
//! - `spawn_scheduler_system` - spawns defender units when the interval elapses
//! - `unit_behavior_system` - runs every unit's state machine
//! - `damage_apply_system` - applies queued unit hits
//! - `dead_unit_cleanup_system` - despawns units that died this tick
//!
//! Spawns and despawns go through `Commands`, which are flushed between
//! chained systems, so a unit spawned this tick first acts next tick.

pub mod behavior;
pub mod damage;
pub mod economy;
pub mod movement;
pub mod spawner;

pub use behavior::*;
pub use damage::*;
pub use economy::*;
pub use movement::*;
pub use spawner::*;

use crate::config::{SimConfig, SimTick};
use crate::events::SimEventBuffer;
use crate::lanes::LaneRegistry;
use crate::spatial::{lane_index_update_system, LaneIndex};
use bevy_ecs::prelude::*;

/// Build the per-tick schedule.
pub fn build_tick_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.add_systems(
        (
            lane_index_update_system,
            energy_regen_system,
            spawn_scheduler_system,
            unit_behavior_system,
            damage_apply_system,
            dead_unit_cleanup_system,
        )
            .chain(),
    );
    schedule
}

/// Insert every resource the tick schedule reads.
pub fn insert_core_resources(world: &mut World, config: SimConfig) {
    world.insert_resource(DeltaTime(config.fixed_timestep));
    world.insert_resource(SimTick(0));
    world.insert_resource(LaneRegistry::new());
    world.insert_resource(LaneIndex::new());
    world.insert_resource(PendingDamage::default());
    world.insert_resource(SimEventBuffer::default());
    world.insert_resource(MatchContext::new(config.economy));
    world.insert_resource(SpawnScheduler::from_config(&config));
    world.insert_resource(GameRng::new(config.seed));
    world.insert_resource(IdAllocator::default());
    world.insert_resource(config);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::*;

    #[test]
    fn test_schedule_runs_on_empty_world() {
        let mut world = World::new();
        insert_core_resources(&mut world, SimConfig::default());
        let mut schedule = build_tick_schedule();
        for _ in 0..10 {
            schedule.run(&mut world);
        }
        assert_eq!(world.query::<&UnitId>().iter(&world).count(), 0);
    }

    #[test]
    fn test_spawner_runs_in_schedule() {
        let config = SimConfig {
            fixed_timestep: 0.1,
            seed: Some(11),
            spawn: crate::config::SpawnConfig {
                interval: 0.1,
                ..Default::default()
            },
            ..SimConfig::default()
        };
        let mut world = World::new();
        insert_core_resources(&mut world, config);
        world
            .resource_mut::<LaneRegistry>()
            .register_positions(&[Position::new(0.0, 0.0, 0.0), Position::new(0.0, 0.0, 30.0)]);
        world.spawn(StructureBundle::new(
            StructureId(0),
            Faction::Attacker,
            Position::new(0.0, 0.0, -2.0),
            500,
        ));

        let mut schedule = build_tick_schedule();
        schedule.run(&mut world);

        let mut query = world.query::<(&UnitId, &Faction)>();
        let defenders = query
            .iter(&world)
            .filter(|(_, faction)| **faction == Faction::Defender)
            .count();
        assert_eq!(defenders, 1);
    }
}
