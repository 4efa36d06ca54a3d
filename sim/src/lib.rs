//! Lane Siege - Simulation Core
//!
//! A deterministic, fixed-timestep ECS simulation of lane-based tower defense:
//! attackers and defenders walk waypoint lanes, fight opponents on their own
//! lane and besiege the enemy structure.
//! Uses `bevy_ecs` for the entity-component-system architecture.

pub mod api;
pub mod components;
pub mod config;
pub mod error;
pub mod events;
pub mod lanes;
pub mod policy;
pub mod spatial;
pub mod systems;
pub mod world;

pub use api::SimWorld;
pub use components::*;
pub use config::{EconomyConfig, PlacementCosts, SimConfig, SimTick, SpawnConfig};
pub use error::{SimError, SimResult};
pub use events::{DeathCause, SimEvent, SimEventBuffer, MAX_BUFFERED_EVENTS};
pub use lanes::{Lane, LaneId, LaneRegistry, WaypointId};
pub use policy::{
    DetectionRule, FactionPolicy, ProfileTable, RangeRule, RangedApproach, TimeoutAction,
};
pub use spatial::{LaneEntry, LaneIndex};
pub use systems::*;
pub use world::{Snapshot, StructureSnapshot, UnitSnapshot};
