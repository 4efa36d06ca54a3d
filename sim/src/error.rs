//! Error type shared by the facade and the lane registry.
//!
//! Systems never return these across the tick boundary: they log the error
//! and disable or skip the offending entity instead.

use crate::components::{StructureId, UnitId, UnitKind};
use crate::lanes::{LaneId, WaypointId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("negative damage amount {0} rejected")]
    NegativeDamage(i32),

    #[error("invalid energy amount {0}, must be positive")]
    InvalidSpendAmount(i32),

    #[error("waypoint sequence is empty")]
    EmptyWaypoints,

    #[error("waypoint {0} is not registered")]
    UnknownWaypoint(WaypointId),

    #[error("lane {0} is not registered")]
    UnknownLane(LaneId),

    #[error("no live unit with id {0}")]
    UnknownUnit(UnitId),

    #[error("no structure with id {0}")]
    UnknownStructure(StructureId),

    #[error("unknown unit kind `{0}`")]
    UnknownUnitKind(String),

    #[error("profile table has no entry for {0:?}")]
    MissingProfile(UnitKind),

    #[error("waypoint index {index} out of range for a path of {len} waypoints")]
    WaypointIndexOutOfRange { index: usize, len: usize },

    #[error("fixed timestep must be a positive number of seconds, got {0}")]
    InvalidTimestep(f32),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

pub type SimResult<T> = Result<T, SimError>;
