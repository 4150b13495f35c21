use crate::app::{lerp, Aabb, Vec2};
use crate::config::GameTuning;

use super::grid::{Cell, Grid};

/// Driver intent for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DriveIntent {
    /// Steering axis in [-1, 1]; negative turns counter-clockwise on screen.
    pub steer: f32,
    pub accelerate: bool,
    pub reverse: bool,
    pub drift: bool,
}

/// The subset of [`GameTuning`] the motion model reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleTuning {
    pub max_forward_speed: f32,
    pub max_reverse_speed: f32,
    pub turn_rate: f32,
    pub drift_turn_rate: f32,
    pub accelerate_blend: f32,
    pub reverse_blend: f32,
    pub coast_blend: f32,
    pub normal_grip: f32,
    pub drift_grip: f32,
    pub drift_grip_speed_threshold: f32,
    pub drift_visible_speed_threshold: f32,
}

impl From<&GameTuning> for VehicleTuning {
    fn from(tuning: &GameTuning) -> Self {
        Self {
            max_forward_speed: tuning.max_forward_speed,
            max_reverse_speed: tuning.max_reverse_speed,
            turn_rate: tuning.turn_rate_deg_per_second,
            drift_turn_rate: tuning.drift_turn_rate_deg_per_second,
            accelerate_blend: tuning.accelerate_blend,
            reverse_blend: tuning.reverse_blend,
            coast_blend: tuning.coast_blend,
            normal_grip: tuning.normal_grip,
            drift_grip: tuning.drift_grip,
            drift_grip_speed_threshold: tuning.drift_grip_speed_threshold,
            drift_visible_speed_threshold: tuning.drift_visible_speed_threshold,
        }
    }
}

impl Default for VehicleTuning {
    fn default() -> Self {
        Self::from(&GameTuning::default())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VehicleMotion {
    /// Signed longitudinal speed; negative while reversing.
    pub speed: f32,
    pub velocity: Vec2,
    pub orientation_degrees: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionStep {
    pub motion: VehicleMotion,
    pub drift_visible: bool,
}

/// Advances the motion model by one update.
///
/// Speed blends toward its target by a fixed factor per call, so ramp-up and ramp-down feel
/// depends on update count while turning scales with `dt_seconds`.
pub fn step_motion(
    tuning: &VehicleTuning,
    current: VehicleMotion,
    intent: DriveIntent,
    dt_seconds: f32,
) -> MotionStep {
    let steer = if intent.steer.is_finite() {
        intent.steer.clamp(-1.0, 1.0)
    } else {
        0.0
    };
    let turn_rate = if intent.drift {
        tuning.drift_turn_rate
    } else {
        tuning.turn_rate
    };
    let mut orientation_degrees = current.orientation_degrees;
    if steer != 0.0 {
        orientation_degrees += steer * turn_rate * dt_seconds;
    }

    let (target_speed, blend) = if intent.accelerate {
        (tuning.max_forward_speed, tuning.accelerate_blend)
    } else if intent.reverse {
        (-tuning.max_reverse_speed, tuning.reverse_blend)
    } else {
        (0.0, tuning.coast_blend)
    };
    let speed = lerp(current.speed, target_speed, blend);

    let nominal = Vec2::from_angle_degrees(orientation_degrees) * speed;
    let grip = if intent.drift && speed.abs() > tuning.drift_grip_speed_threshold {
        tuning.drift_grip
    } else {
        tuning.normal_grip
    };
    let velocity = current.velocity.lerp(nominal, grip);

    MotionStep {
        motion: VehicleMotion {
            speed,
            velocity,
            orientation_degrees,
        },
        drift_visible: intent.drift && speed.abs() > tuning.drift_visible_speed_threshold,
    }
}

/// Moves a box by `velocity * dt`, one axis at a time, undoing any axis whose move would
/// overlap a cell that blocks the vehicle. Returns the new position and the velocity with
/// blocked components zeroed.
pub fn integrate_with_walls(
    grid: &Grid,
    position: Vec2,
    velocity: Vec2,
    half_extents: (f32, f32),
    wall_inset: f32,
    dt_seconds: f32,
) -> (Vec2, Vec2) {
    let mut position = position;
    let mut velocity = velocity;

    let moved_x = Vec2::new(position.x + velocity.x * dt_seconds, position.y);
    if overlaps_blocking_cell(grid, moved_x, half_extents, wall_inset) {
        velocity.x = 0.0;
    } else {
        position = moved_x;
    }

    let moved_y = Vec2::new(position.x, position.y + velocity.y * dt_seconds);
    if overlaps_blocking_cell(grid, moved_y, half_extents, wall_inset) {
        velocity.y = 0.0;
    } else {
        position = moved_y;
    }

    (position, velocity)
}

/// Portal wraparound: leaving the play area by more than `margin` re-enters on the far side.
pub fn wrap_position(position: Vec2, (width, height): (f32, f32), margin: f32) -> Vec2 {
    let wrap_axis = |value: f32, extent: f32| {
        if value < -margin {
            extent + margin
        } else if value > extent + margin {
            -margin
        } else {
            value
        }
    };
    Vec2::new(wrap_axis(position.x, width), wrap_axis(position.y, height))
}

fn overlaps_blocking_cell(
    grid: &Grid,
    center: Vec2,
    (half_width, half_height): (f32, f32),
    wall_inset: f32,
) -> bool {
    let tile = grid.tile_size();
    let body = Aabb::new(center, half_width, half_height);
    let wall_half = tile * wall_inset * 0.5;

    let first_col = ((center.x - half_width) / tile).floor().max(0.0) as u32;
    let last_col = ((center.x + half_width) / tile).floor();
    let first_row = ((center.y - half_height) / tile).floor().max(0.0) as u32;
    let last_row = ((center.y + half_height) / tile).floor();
    if last_col < 0.0 || last_row < 0.0 {
        return false;
    }

    for row in first_row..=last_row as u32 {
        for col in first_col..=last_col as u32 {
            let cell = Cell::new(row, col);
            if !grid.blocks_vehicle(cell) {
                continue;
            }
            let wall = Aabb::new(grid.cell_center_world(cell), wall_half, wall_half);
            if body.overlaps(&wall) {
                return true;
            }
        }
    }
    false
}
