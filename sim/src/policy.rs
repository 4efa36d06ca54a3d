//! Faction capability descriptors and unit profile tables.
//!
//! Attacker and defender units run the same state machine. Everything that
//! differs between the two sides lives in a `FactionPolicy`.

use crate::components::{DistanceMetric, UnitKind, UnitStats};
use crate::error::{SimError, SimResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What happens when a unit has been fighting a structure too long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeoutAction {
    /// The unit dies.
    SelfDestruct,
    /// The engagement clock restarts and the unit keeps fighting.
    ResetClock,
}

/// How a Moving unit notices opponents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DetectionRule {
    /// Euclidean distance within attack range.
    Contact,
    /// Lane-axis distance within `max(range * multiplier, floor)`.
    /// Heavy kinds use the heavy pair.
    Aggro {
        multiplier: f32,
        floor: f32,
        heavy_multiplier: f32,
        heavy_floor: f32,
    },
}

impl DetectionRule {
    pub fn radius(&self, kind: UnitKind, attack_range: f32) -> f32 {
        match *self {
            DetectionRule::Contact => attack_range,
            DetectionRule::Aggro {
                multiplier,
                floor,
                heavy_multiplier,
                heavy_floor,
            } => {
                if kind.is_heavy() {
                    (attack_range * heavy_multiplier).max(heavy_floor)
                } else {
                    (attack_range * multiplier).max(floor)
                }
            }
        }
    }

    pub fn metric(&self) -> DistanceMetric {
        match self {
            DetectionRule::Contact => DistanceMetric::Euclidean,
            DetectionRule::Aggro { .. } => DistanceMetric::LaneAxis,
        }
    }
}

/// Range check used while engaging a unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RangeRule {
    Euclidean,
    /// Lane-axis distance within `attack_range + tolerance`.
    LaneAxis { tolerance: f32 },
}

impl RangeRule {
    pub fn metric(&self) -> DistanceMetric {
        match self {
            RangeRule::Euclidean => DistanceMetric::Euclidean,
            RangeRule::LaneAxis { .. } => DistanceMetric::LaneAxis,
        }
    }

    pub fn reach(&self, attack_range: f32) -> f32 {
        match *self {
            RangeRule::Euclidean => attack_range,
            RangeRule::LaneAxis { tolerance } => attack_range + tolerance,
        }
    }

    /// Lane-axis gap under which a chasing unit snaps onto the target's coordinate.
    pub fn snap_distance(&self) -> Option<f32> {
        match *self {
            RangeRule::Euclidean => None,
            RangeRule::LaneAxis { tolerance } => Some(tolerance * 0.5),
        }
    }
}

/// How ranged kinds behave when a structure is out of reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RangedApproach {
    /// Stay put and face the structure.
    Hold,
    /// Walk to the point exactly `attack_range` short of the structure on the
    /// lane axis, then hold.
    Standoff,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactionPolicy {
    pub dies_without_structure: bool,
    /// Seconds a unit may spend engaging a structure.
    pub engagement_timeout: f32,
    pub timeout_action: TimeoutAction,
    pub detection: DetectionRule,
    pub unit_range: RangeRule,
    pub chase_speed_multiplier: f32,
    pub ranged_approach: RangedApproach,
}

impl FactionPolicy {
    pub fn attacker() -> Self {
        Self {
            dies_without_structure: true,
            engagement_timeout: 30.0,
            timeout_action: TimeoutAction::SelfDestruct,
            detection: DetectionRule::Contact,
            unit_range: RangeRule::Euclidean,
            chase_speed_multiplier: 1.6,
            ranged_approach: RangedApproach::Hold,
        }
    }

    pub fn defender() -> Self {
        Self {
            dies_without_structure: false,
            engagement_timeout: 300.0,
            timeout_action: TimeoutAction::ResetClock,
            detection: DetectionRule::Aggro {
                multiplier: 3.0,
                floor: 5.0,
                heavy_multiplier: 4.0,
                heavy_floor: 6.0,
            },
            unit_range: RangeRule::LaneAxis { tolerance: 1.5 },
            chase_speed_multiplier: 1.6,
            ranged_approach: RangedApproach::Standoff,
        }
    }
}

/// Stat profile per unit kind for one faction.
///
/// Serialized as a map from lowercase kind name to stats, e.g.
/// `{"tank": {"max_health": 200, ...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, UnitStats>", into = "BTreeMap<String, UnitStats>")]
pub struct ProfileTable {
    entries: BTreeMap<UnitKind, UnitStats>,
}

impl ProfileTable {
    pub fn attacker_defaults() -> Self {
        Self::from_entries([
            (UnitKind::Tank, UnitStats::new(200, 20, 3.0, 1.0)),
            (UnitKind::Warrior, UnitStats::new(100, 30, 2.0, 1.5)),
            (UnitKind::Archer, UnitStats::new(50, 40, 12.0, 1.2)),
            (UnitKind::Mage, UnitStats::new(40, 25, 10.0, 1.0)),
        ])
    }

    pub fn defender_defaults() -> Self {
        Self::from_entries([
            (UnitKind::Tank, UnitStats::new(150, 15, 2.0, 0.8)),
            (UnitKind::Warrior, UnitStats::new(80, 20, 1.5, 1.2)),
            (UnitKind::Archer, UnitStats::new(40, 25, 8.0, 1.0)),
            (UnitKind::Mage, UnitStats::new(35, 18, 6.0, 0.9)),
        ])
    }

    fn from_entries(entries: impl IntoIterator<Item = (UnitKind, UnitStats)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Sanitized stats for `kind`.
    pub fn get(&self, kind: UnitKind) -> SimResult<UnitStats> {
        self.entries
            .get(&kind)
            .map(|s| s.sanitized())
            .ok_or(SimError::MissingProfile(kind))
    }

    pub fn set(&mut self, kind: UnitKind, stats: UnitStats) {
        self.entries.insert(kind, stats);
    }
}

impl TryFrom<BTreeMap<String, UnitStats>> for ProfileTable {
    type Error = SimError;

    fn try_from(raw: BTreeMap<String, UnitStats>) -> Result<Self, Self::Error> {
        let mut entries = BTreeMap::new();
        for (name, stats) in raw {
            entries.insert(name.parse::<UnitKind>()?, stats);
        }
        Ok(Self { entries })
    }
}

impl From<ProfileTable> for BTreeMap<String, UnitStats> {
    fn from(table: ProfileTable) -> Self {
        table
            .entries
            .into_iter()
            .map(|(kind, stats)| (kind.as_str().to_string(), stats))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defender_aggro_radius() {
        let rule = FactionPolicy::defender().detection;
        // Archer: 8 * 3 = 24
        assert_eq!(rule.radius(UnitKind::Archer, 8.0), 24.0);
        // Warrior: max(1.5 * 4, 6) = 6
        assert_eq!(rule.radius(UnitKind::Warrior, 1.5), 6.0);
        // Mage with short range hits the floor
        assert_eq!(rule.radius(UnitKind::Mage, 1.0), 5.0);
        assert_eq!(rule.metric(), DistanceMetric::LaneAxis);
    }

    #[test]
    fn test_attacker_contact_detection() {
        let policy = FactionPolicy::attacker();
        assert_eq!(policy.detection.radius(UnitKind::Tank, 3.0), 3.0);
        assert_eq!(policy.detection.metric(), DistanceMetric::Euclidean);
        assert_eq!(policy.unit_range.reach(3.0), 3.0);
        assert!(policy.unit_range.snap_distance().is_none());
    }

    #[test]
    fn test_defender_range_tolerance() {
        let rule = FactionPolicy::defender().unit_range;
        assert_eq!(rule.reach(2.0), 3.5);
        assert_eq!(rule.snap_distance(), Some(0.75));
    }

    #[test]
    fn test_profile_defaults() {
        let table = ProfileTable::attacker_defaults();
        let tank = table.get(UnitKind::Tank).unwrap();
        assert_eq!(tank.max_health, 200);
        assert_eq!(tank.damage, 20);
        assert_eq!(tank.attack_range, 3.0);
        assert_eq!(tank.move_speed, 2.0);

        let mage = ProfileTable::defender_defaults().get(UnitKind::Mage).unwrap();
        assert_eq!(mage.attack_speed, 0.9);
    }

    #[test]
    fn test_profile_table_rejects_unknown_kind() {
        let json = r#"{"dragon": {"max_health": 1, "damage": 1, "attack_range": 1.0, "attack_speed": 1.0}}"#;
        assert!(serde_json::from_str::<ProfileTable>(json).is_err());
    }

    #[test]
    fn test_missing_profile_reported() {
        let json = r#"{"tank": {"max_health": 10, "damage": 1, "attack_range": 0.0, "attack_speed": 1.0}}"#;
        let table: ProfileTable = serde_json::from_str(json).unwrap();
        // Sanitized on read.
        assert_eq!(table.get(UnitKind::Tank).unwrap().attack_range, 2.0);
        assert!(matches!(
            table.get(UnitKind::Mage),
            Err(SimError::MissingProfile(UnitKind::Mage))
        ));
    }
}
