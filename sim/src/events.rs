//! Fire-and-forget notifications raised during a tick.
//!
//! Systems push into `SimEventBuffer`; the host drains it after stepping.
//! Nothing inside the simulation reads these back.

use crate::components::{Faction, StructureId, UnitId, UnitKind};
use crate::lanes::LaneId;
use bevy_ecs::prelude::*;
use serde::Serialize;
use std::collections::VecDeque;
use tracing::warn;

/// Events kept between two drains. Older ones are dropped past this.
pub const MAX_BUFFERED_EVENTS: usize = 16_384;

/// Why a unit died.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeathCause {
    /// Health reached zero.
    Killed,
    /// No enemy structure could be resolved.
    StructureMissing,
    EngagementTimeout,
    /// The unit brought the enemy structure down and is removed with it.
    SiegeComplete,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum SimEvent {
    UnitSpawned {
        unit: UnitId,
        faction: Faction,
        kind: UnitKind,
        lane: LaneId,
    },
    UnitDamaged {
        unit: UnitId,
        amount: i32,
        remaining: i32,
    },
    UnitDied {
        unit: UnitId,
        faction: Faction,
        cause: DeathCause,
    },
    /// The unit hit a configuration error and no longer acts.
    UnitDisabled {
        unit: UnitId,
        reason: String,
    },
    StructureDamaged {
        structure: StructureId,
        amount: i32,
        remaining: i32,
    },
    StructureDestroyed {
        structure: StructureId,
        owner: Faction,
    },
    GameOver {
        victory: bool,
    },
}

/// Events raised since the last drain, oldest first.
///
/// Bounded by `MAX_BUFFERED_EVENTS`: a host that never drains loses the
/// oldest events instead of growing the buffer.
#[derive(Resource, Debug, Default)]
pub struct SimEventBuffer {
    events: VecDeque<SimEvent>,
    dropped: usize,
}

impl SimEventBuffer {
    pub fn push(&mut self, event: SimEvent) {
        if self.events.len() >= MAX_BUFFERED_EVENTS {
            if self.dropped == 0 {
                warn!(
                    capacity = MAX_BUFFERED_EVENTS,
                    "event buffer full, dropping oldest events"
                );
            }
            self.events.pop_front();
            self.dropped += 1;
        }
        self.events.push_back(event);
    }

    /// Take every buffered event, oldest first.
    pub fn drain(&mut self) -> Vec<SimEvent> {
        self.dropped = 0;
        self.events.drain(..).collect()
    }

    /// Events lost to the capacity bound since the last drain.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SimEvent> {
        self.events.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_empties_buffer() {
        let mut buffer = SimEventBuffer::default();
        buffer.push(SimEvent::GameOver { victory: true });
        buffer.push(SimEvent::UnitDamaged {
            unit: UnitId(1),
            amount: 5,
            remaining: 10,
        });
        assert_eq!(buffer.len(), 2);

        let events = buffer.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], SimEvent::GameOver { victory: true });
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_buffer_is_bounded() {
        let mut buffer = SimEventBuffer::default();
        for i in 0..MAX_BUFFERED_EVENTS + 10 {
            buffer.push(SimEvent::UnitDamaged {
                unit: UnitId(i as u32),
                amount: 1,
                remaining: 0,
            });
        }
        assert_eq!(buffer.len(), MAX_BUFFERED_EVENTS);
        assert_eq!(buffer.dropped(), 10);

        let events = buffer.drain();
        // The ten oldest were dropped.
        assert!(matches!(events[0], SimEvent::UnitDamaged { unit: UnitId(10), .. }));
        assert_eq!(buffer.dropped(), 0);
    }

    #[test]
    fn test_events_serialize_with_tag() {
        let json = serde_json::to_string(&SimEvent::UnitDied {
            unit: UnitId(3),
            faction: Faction::Attacker,
            cause: DeathCause::EngagementTimeout,
        })
        .unwrap();
        assert!(json.contains(r#""type":"UnitDied""#));
        assert!(json.contains("EngagementTimeout"));
    }
}
