//! Match context: shared energy pool and the one-shot match outcome.

use crate::components::Faction;
use crate::config::EconomyConfig;
use crate::error::{SimError, SimResult};
use crate::systems::movement::DeltaTime;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchOutcome {
    Victory,
    Defeat,
}

impl MatchOutcome {
    /// Outcome implied by a structure falling. Losing a defender structure
    /// is the player's win.
    pub fn from_fallen_structure(owner: Faction) -> Self {
        match owner {
            Faction::Defender => MatchOutcome::Victory,
            Faction::Attacker => MatchOutcome::Defeat,
        }
    }

    pub fn is_victory(self) -> bool {
        self == MatchOutcome::Victory
    }
}

/// Per-match coordinator. Created at match start, restored by `reset`.
#[derive(Resource, Debug, Clone)]
pub struct MatchContext {
    energy: f32,
    max_energy: f32,
    upgrades: u32,
    outcome: Option<MatchOutcome>,
    economy: EconomyConfig,
}

impl Default for MatchContext {
    fn default() -> Self {
        Self::new(EconomyConfig::default())
    }
}

impl MatchContext {
    pub fn new(economy: EconomyConfig) -> Self {
        Self {
            energy: economy.start_energy.min(economy.start_max_energy),
            max_energy: economy.start_max_energy,
            upgrades: 0,
            outcome: None,
            economy,
        }
    }

    pub fn energy(&self) -> f32 {
        self.energy
    }

    pub fn max_energy(&self) -> f32 {
        self.max_energy
    }

    pub fn upgrades(&self) -> u32 {
        self.upgrades
    }

    pub fn outcome(&self) -> Option<MatchOutcome> {
        self.outcome
    }

    pub fn is_over(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn economy(&self) -> &EconomyConfig {
        &self.economy
    }

    /// Deduct `amount` if the pool covers it. Never spends partially.
    ///
    /// Returns `Ok(false)` when energy is short; amounts `<= 0` are invalid.
    pub fn try_spend(&mut self, amount: i32) -> SimResult<bool> {
        if amount <= 0 {
            warn!(amount, "invalid spend amount rejected");
            return Err(SimError::InvalidSpendAmount(amount));
        }
        let cost = amount as f32;
        if self.energy < cost {
            return Ok(false);
        }
        self.energy -= cost;
        Ok(true)
    }

    pub fn upgrade_cost(&self) -> i32 {
        self.economy.upgrade_base_cost + self.economy.upgrade_cost_step * self.upgrades as i32
    }

    /// Buy one capacity upgrade. Cost escalates with every purchase.
    pub fn upgrade_capacity(&mut self) -> SimResult<bool> {
        let cost = self.upgrade_cost();
        if !self.try_spend(cost)? {
            return Ok(false);
        }
        self.upgrades += 1;
        self.max_energy += self.economy.upgrade_capacity_step;
        self.energy = (self.energy + self.economy.upgrade_refund).min(self.max_energy);
        info!(
            upgrades = self.upgrades,
            max_energy = self.max_energy,
            "energy capacity upgraded"
        );
        Ok(true)
    }

    /// Linear regeneration, clamped to max.
    pub fn regenerate(&mut self, dt: f32) {
        if self.is_over() {
            return;
        }
        self.energy = (self.energy + self.economy.regen_rate * dt).min(self.max_energy);
    }

    /// Record the match outcome. Only the first call has an effect; it
    /// returns `true` exactly then.
    pub fn game_over(&mut self, victory: bool) -> bool {
        if self.outcome.is_some() {
            return false;
        }
        let outcome = if victory {
            MatchOutcome::Victory
        } else {
            MatchOutcome::Defeat
        };
        info!(?outcome, "game over");
        self.outcome = Some(outcome);
        true
    }

    /// Back to start-of-match values.
    pub fn reset(&mut self) {
        *self = Self::new(self.economy);
    }
}

/// System that regenerates energy each tick.
pub fn energy_regen_system(dt: Res<DeltaTime>, mut ctx: ResMut<MatchContext>) {
    ctx.regenerate(dt.0);
}
