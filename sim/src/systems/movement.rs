//! Movement helpers - kinematic single-axis advancement.
//!
//! Units only ever move along the lane axis. The other two coordinates are
//! held fixed, so a unit never drifts off its lane.

use crate::components::{LaneAxis, Position};
use bevy_ecs::prelude::*;

/// Resource containing the delta time for the current tick.
#[derive(Resource, Default)]
pub struct DeltaTime(pub f32);

/// Move `current` toward `target` by at most `max_step`, never overshooting.
#[inline]
pub fn step_toward(current: f32, target: f32, max_step: f32) -> f32 {
    let delta = target - current;
    if delta.abs() <= max_step {
        target
    } else {
        current + max_step * delta.signum()
    }
}

/// Advance `pos` toward `target` along `axis`. Returns the lane-axis gap left.
pub fn advance_along(pos: &mut Position, target: &Position, axis: LaneAxis, max_step: f32) -> f32 {
    let next = step_toward(pos.along(axis), target.along(axis), max_step);
    pos.set_along(axis, next);
    pos.axis_distance(target, axis)
}

/// Lane-axis facing from `from` toward `to`: `1.0`, `-1.0`, or `0.0` when level.
#[inline]
pub fn facing(from: &Position, to: &Position, axis: LaneAxis) -> f32 {
    let delta = to.along(axis) - from.along(axis);
    if delta == 0.0 {
        0.0
    } else {
        delta.signum()
    }
}
