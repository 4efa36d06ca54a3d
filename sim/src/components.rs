//! ECS Components for the Lane Siege simulation.
//!
//! Components are pure data containers attached to entities.
//! All game logic lives in systems that query these components.

use crate::error::{SimError, SimResult};
use crate::lanes::{LaneId, WaypointId};
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

// ============================================================================
// SPATIAL COMPONENTS
// ============================================================================

/// The single axis units advance along. The other two coordinates are held fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LaneAxis {
    X,
    Y,
    #[default]
    Z,
}

/// 3D position in world units.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Full Euclidean distance.
    pub fn distance_to(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Coordinate on the given lane axis.
    #[inline]
    pub fn along(&self, axis: LaneAxis) -> f32 {
        match axis {
            LaneAxis::X => self.x,
            LaneAxis::Y => self.y,
            LaneAxis::Z => self.z,
        }
    }

    #[inline]
    pub fn set_along(&mut self, axis: LaneAxis, value: f32) {
        match axis {
            LaneAxis::X => self.x = value,
            LaneAxis::Y => self.y = value,
            LaneAxis::Z => self.z = value,
        }
    }

    /// Distance measured on the lane axis only.
    #[inline]
    pub fn axis_distance(&self, other: &Position, axis: LaneAxis) -> f32 {
        (self.along(axis) - other.along(axis)).abs()
    }
}

/// How two positions are compared at a given call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    Euclidean,
    LaneAxis,
}

impl DistanceMetric {
    #[inline]
    pub fn measure(self, a: &Position, b: &Position, axis: LaneAxis) -> f32 {
        match self {
            DistanceMetric::Euclidean => a.distance_to(b),
            DistanceMetric::LaneAxis => a.axis_distance(b, axis),
        }
    }
}

// ============================================================================
// IDENTITY COMPONENTS
// ============================================================================

/// Stable identifier for a unit. Used as a non-owning target handle.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub u32);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit#{}", self.0)
    }
}

/// Stable identifier for a structure (castle/tower).
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StructureId(pub u32);

impl fmt::Display for StructureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "structure#{}", self.0)
    }
}

/// Side of the match. The player fields `Attacker` units; the spawner fields `Defender` units.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Faction {
    Attacker,
    Defender,
}

impl Faction {
    pub fn opponent(self) -> Faction {
        match self {
            Faction::Attacker => Faction::Defender,
            Faction::Defender => Faction::Attacker,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Faction::Attacker => "Attacker",
            Faction::Defender => "Defender",
        }
    }
}

/// Unit type tag. Each faction has its own stat profile per kind.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UnitKind {
    Tank,
    Warrior,
    Archer,
    Mage,
}

impl UnitKind {
    pub const ALL: [UnitKind; 4] = [
        UnitKind::Tank,
        UnitKind::Warrior,
        UnitKind::Archer,
        UnitKind::Mage,
    ];

    /// Archers and mages fight from a distance and never close in on structures.
    pub fn is_ranged(self) -> bool {
        matches!(self, UnitKind::Archer | UnitKind::Mage)
    }

    /// Heavier kinds get a wider aggro range.
    pub fn is_heavy(self) -> bool {
        matches!(self, UnitKind::Tank | UnitKind::Warrior)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UnitKind::Tank => "tank",
            UnitKind::Warrior => "warrior",
            UnitKind::Archer => "archer",
            UnitKind::Mage => "mage",
        }
    }
}

impl FromStr for UnitKind {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tank" => Ok(UnitKind::Tank),
            "warrior" => Ok(UnitKind::Warrior),
            "archer" => Ok(UnitKind::Archer),
            "mage" => Ok(UnitKind::Mage),
            _ => Err(SimError::UnknownUnitKind(s.to_string())),
        }
    }
}

// ============================================================================
// COMBAT COMPONENTS
// ============================================================================

/// Result of a successful `Vitality::take_damage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageOutcome {
    /// Damage applied, entity still alive (or was already dead: no second notification).
    Applied { remaining: i32 },
    /// This hit brought health to zero. Reported exactly once per tracker.
    Killed,
}

/// Hit points of any damageable entity (units and structures).
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vitality {
    current: i32,
    max: i32,
}

impl Vitality {
    pub fn new(max: i32) -> Self {
        let max = if max <= 0 {
            warn!(max, "non-positive max health, using 100");
            100
        } else {
            max
        };
        Self { current: max, max }
    }

    pub fn current(&self) -> i32 {
        self.current
    }

    pub fn max(&self) -> i32 {
        self.max
    }

    pub fn fraction(&self) -> f32 {
        (self.current as f32 / self.max as f32).clamp(0.0, 1.0)
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0
    }

    /// Apply `amount` points of damage.
    ///
    /// Negative amounts are rejected without touching state. Health is floored
    /// at zero, and `Killed` is returned only on the hit that crosses zero.
    pub fn take_damage(&mut self, amount: i32) -> SimResult<DamageOutcome> {
        if amount < 0 {
            warn!(amount, "negative damage rejected");
            return Err(SimError::NegativeDamage(amount));
        }
        let was_alive = self.is_alive();
        self.current = self.current.saturating_sub(amount).max(0);
        if was_alive && !self.is_alive() {
            Ok(DamageOutcome::Killed)
        } else {
            Ok(DamageOutcome::Applied {
                remaining: self.current,
            })
        }
    }
}

impl Default for Vitality {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Base stats of a unit, taken from its faction's profile table.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitStats {
    pub max_health: i32,
    pub damage: i32,
    /// Attack range (world units).
    pub attack_range: f32,
    /// Attacks per second.
    pub attack_speed: f32,
    /// Movement speed (units per second).
    #[serde(default = "default_move_speed")]
    pub move_speed: f32,
}

fn default_move_speed() -> f32 {
    2.0
}

impl UnitStats {
    pub const fn new(max_health: i32, damage: i32, attack_range: f32, attack_speed: f32) -> Self {
        Self {
            max_health,
            damage,
            attack_range,
            attack_speed,
            move_speed: 2.0,
        }
    }

    /// Replace unusable values with playable defaults.
    pub fn sanitized(mut self) -> Self {
        if self.attack_range < 0.2 {
            self.attack_range = 2.0;
        }
        if self.attack_speed <= 0.0 {
            self.attack_speed = 1.0;
        }
        if self.move_speed <= 0.0 {
            self.move_speed = 1.0;
        }
        self
    }

    /// Seconds between two landed hits.
    pub fn attack_interval(&self) -> f32 {
        1.0 / self.attack_speed
    }
}

// ============================================================================
// BEHAVIOR COMPONENTS
// ============================================================================

/// Per-unit state machine.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UnitState {
    #[default]
    Moving,
    EngagingUnit,
    EngagingStructure,
    /// Terminal. The unit is despawned at the end of the tick.
    Dead,
}

impl UnitState {
    pub fn as_str(self) -> &'static str {
        match self {
            UnitState::Moving => "Moving",
            UnitState::EngagingUnit => "EngagingUnit",
            UnitState::EngagingStructure => "EngagingStructure",
            UnitState::Dead => "Dead",
        }
    }
}

/// Lane the unit belongs to. Only same-lane opponents are ever targeted.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OnLane(pub LaneId);

/// Ordered waypoint handles and the index of the next one to reach.
#[derive(Component, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathFollower {
    pub waypoints: Vec<WaypointId>,
    pub index: usize,
}

impl PathFollower {
    pub fn new(waypoints: Vec<WaypointId>, index: usize) -> Self {
        Self { waypoints, index }
    }

    pub fn next_waypoint(&self) -> Option<WaypointId> {
        self.waypoints.get(self.index).copied()
    }

    pub fn is_finished(&self) -> bool {
        self.index >= self.waypoints.len()
    }
}

/// Attack cooldown and engagement clock, both in simulated seconds.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CombatTimers {
    /// Seconds until the next hit may land.
    pub cooldown: f32,
    /// Seconds spent in the current engagement.
    pub engagement: f32,
}

/// Non-owning references to the current unit target and the enemy structure.
/// Both are re-validated against live tables every tick.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Engagement {
    pub target: Option<UnitId>,
    pub structure: Option<StructureId>,
}

/// Marker for units disabled by a configuration error. They keep their health
/// and can still be targeted, but never act again.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Inactive;

/// Marker for structure entities (castles).
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Structure;

// ============================================================================
// BUNDLE HELPERS
// ============================================================================

/// Bundle for spawning a complete unit entity.
#[derive(Bundle, Debug, Clone)]
pub struct UnitBundle {
    pub id: UnitId,
    pub faction: Faction,
    pub kind: UnitKind,
    pub stats: UnitStats,
    pub lane: OnLane,
    pub position: Position,
    pub vitality: Vitality,
    pub state: UnitState,
    pub path: PathFollower,
    pub timers: CombatTimers,
    pub engagement: Engagement,
}

/// Bundle for spawning a structure. `owner` is the faction that loses when it falls.
#[derive(Bundle, Debug, Clone)]
pub struct StructureBundle {
    pub id: StructureId,
    pub owner: Faction,
    pub position: Position,
    pub vitality: Vitality,
    pub marker: Structure,
}

impl StructureBundle {
    pub fn new(id: StructureId, owner: Faction, position: Position, max_health: i32) -> Self {
        Self {
            id,
            owner,
            position,
            vitality: Vitality::new(max_health),
            marker: Structure,
        }
    }
}
