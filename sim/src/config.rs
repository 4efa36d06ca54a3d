//! Simulation configuration and tick counter.

use crate::components::{Faction, LaneAxis, UnitKind, UnitStats};
use crate::error::{SimError, SimResult};
use crate::policy::{FactionPolicy, ProfileTable};
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Configuration for one match.
///
/// Every field has a default, so a JSON override only needs the fields it
/// changes.
#[derive(Resource, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Fixed timestep in seconds (e.g., 1/30 = 0.0333 for 30 Hz).
    pub fixed_timestep: f32,
    /// Axis all lanes run along.
    pub lane_axis: LaneAxis,
    /// Lane-axis distance at which a waypoint counts as reached.
    pub arrival_threshold: f32,
    pub attacker_policy: FactionPolicy,
    pub defender_policy: FactionPolicy,
    pub attacker_profiles: ProfileTable,
    pub defender_profiles: ProfileTable,
    pub spawn: SpawnConfig,
    pub economy: EconomyConfig,
    /// Fixed RNG seed for reproducible spawns. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            fixed_timestep: 1.0 / 30.0, // 30 Hz
            lane_axis: LaneAxis::Z,
            arrival_threshold: 0.2,
            attacker_policy: FactionPolicy::attacker(),
            defender_policy: FactionPolicy::defender(),
            attacker_profiles: ProfileTable::attacker_defaults(),
            defender_profiles: ProfileTable::defender_defaults(),
            spawn: SpawnConfig::default(),
            economy: EconomyConfig::default(),
            seed: None,
        }
    }
}

impl SimConfig {
    pub fn from_json(json: &str) -> SimResult<Self> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the tick loop cannot run with.
    pub fn validate(&self) -> SimResult<()> {
        if !(self.fixed_timestep.is_finite() && self.fixed_timestep > 0.0) {
            return Err(SimError::InvalidTimestep(self.fixed_timestep));
        }
        Ok(())
    }

    pub fn to_json(&self) -> SimResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn policy(&self, faction: Faction) -> &FactionPolicy {
        match faction {
            Faction::Attacker => &self.attacker_policy,
            Faction::Defender => &self.defender_policy,
        }
    }

    /// Sanitized stats for a faction's unit kind.
    pub fn profile(&self, faction: Faction, kind: UnitKind) -> SimResult<UnitStats> {
        match faction {
            Faction::Attacker => self.attacker_profiles.get(kind),
            Faction::Defender => self.defender_profiles.get(kind),
        }
    }
}

/// Defender spawn cadence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnConfig {
    /// Seconds between spawns.
    pub interval: f32,
    pub enabled: bool,
    /// Spawned defenders walk their lane's waypoints last-to-first.
    pub reverse_path: bool,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            interval: 5.0,
            enabled: true,
            reverse_path: true,
        }
    }
}

/// Energy economy parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    pub start_energy: f32,
    pub start_max_energy: f32,
    /// Energy regained per second.
    pub regen_rate: f32,
    pub upgrade_base_cost: i32,
    pub upgrade_cost_step: i32,
    /// Max capacity gained per upgrade.
    pub upgrade_capacity_step: f32,
    /// Energy granted on each upgrade, clamped to the new max.
    pub upgrade_refund: f32,
    pub placement_costs: PlacementCosts,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            start_energy: 100.0,
            start_max_energy: 200.0,
            regen_rate: 50.0,
            upgrade_base_cost: 50,
            upgrade_cost_step: 50,
            upgrade_capacity_step: 50.0,
            upgrade_refund: 50.0,
            placement_costs: PlacementCosts::default(),
        }
    }
}

/// Energy price of placing an attacker unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementCosts {
    pub tank: i32,
    pub warrior: i32,
    pub archer: i32,
    pub mage: i32,
}

impl Default for PlacementCosts {
    fn default() -> Self {
        Self {
            tank: 50,
            warrior: 30,
            archer: 20,
            mage: 40,
        }
    }
}

impl PlacementCosts {
    pub fn cost(&self, kind: UnitKind) -> i32 {
        match kind {
            UnitKind::Tank => self.tank,
            UnitKind::Warrior => self.warrior,
            UnitKind::Archer => self.archer,
            UnitKind::Mage => self.mage,
        }
    }
}

/// Global simulation tick counter.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct SimTick(pub u64);

impl SimTick {
    pub fn increment(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }
}
