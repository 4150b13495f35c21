use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Multiplier applied to the original pixel-art sizes and speeds.
pub const SCALE_FACTOR: f32 = 1.75;

/// Gameplay constants shared by the simulation.
///
/// `Default` carries the shipped tuning; a JSON file with the same field names can replace
/// any subset of it (missing fields keep their defaults).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GameTuning {
    pub tile_size: f32,
    pub editor_tile_size: f32,

    pub max_forward_speed: f32,
    pub max_reverse_speed: f32,
    pub turn_rate_deg_per_second: f32,
    pub drift_turn_rate_deg_per_second: f32,
    pub accelerate_blend: f32,
    pub reverse_blend: f32,
    pub coast_blend: f32,
    pub normal_grip: f32,
    pub drift_grip: f32,
    pub drift_grip_speed_threshold: f32,
    pub drift_visible_speed_threshold: f32,

    pub enemy_base_speed: f32,
    pub enemy_level_speed_growth: f32,
    pub enemy_power_speed_multiplier: f32,
    pub enemy_decision_interval_ms: u64,
    pub enemy_chase_radius_cells: f32,
    pub enemy_scatter_attempts: u32,
    pub max_pen_enemies: usize,

    pub starting_lives: u32,
    pub dot_score: u32,
    pub kill_score: u32,
    pub power_duration_ms: u64,
    pub ready_banner_ms: u64,
    pub enemy_respawn_ms: u64,
    pub death_reset_ms: u64,
    pub countdown_step_ms: u64,
    pub countdown_go_ms: u64,
    pub game_over_ms: u64,

    pub player_body: BodySize,
    pub enemy_body: BodySize,
    pub dot_body: BodySize,
    pub power_body: BodySize,
    pub wall_inset: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodySize {
    pub width: f32,
    pub height: f32,
}

impl BodySize {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn half_extents(self) -> (f32, f32) {
        (self.width * 0.5, self.height * 0.5)
    }
}

impl Default for GameTuning {
    fn default() -> Self {
        Self {
            tile_size: 48.0,
            editor_tile_size: 24.0,

            max_forward_speed: 210.0 * SCALE_FACTOR,
            max_reverse_speed: 100.0 * SCALE_FACTOR,
            turn_rate_deg_per_second: 240.0,
            drift_turn_rate_deg_per_second: 320.0,
            accelerate_blend: 0.15,
            reverse_blend: 0.12,
            coast_blend: 0.08,
            normal_grip: 1.0,
            drift_grip: 0.027,
            drift_grip_speed_threshold: 50.0,
            drift_visible_speed_threshold: 80.0,

            enemy_base_speed: 128.0 * SCALE_FACTOR,
            enemy_level_speed_growth: 1.08,
            enemy_power_speed_multiplier: 0.6,
            enemy_decision_interval_ms: 350,
            enemy_chase_radius_cells: 8.0,
            enemy_scatter_attempts: 10,
            max_pen_enemies: 4,

            starting_lives: 3,
            dot_score: 10,
            kill_score: 200,
            power_duration_ms: 6_000,
            ready_banner_ms: 1_400,
            enemy_respawn_ms: 900,
            death_reset_ms: 1_300,
            countdown_step_ms: 1_000,
            countdown_go_ms: 3_500,
            game_over_ms: 1_500,

            player_body: BodySize::new(28.0 * SCALE_FACTOR, 20.0 * SCALE_FACTOR),
            enemy_body: BodySize::new(20.0 * SCALE_FACTOR, 16.0 * SCALE_FACTOR),
            dot_body: BodySize::new(8.0 * SCALE_FACTOR, 8.0 * SCALE_FACTOR),
            power_body: BodySize::new(20.0 * SCALE_FACTOR, 20.0 * SCALE_FACTOR),
            wall_inset: 0.9,
        }
    }
}

impl GameTuning {
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn enemy_decision_interval(&self) -> Duration {
        Duration::from_millis(self.enemy_decision_interval_ms)
    }

    pub fn power_duration(&self) -> Duration {
        Duration::from_millis(self.power_duration_ms)
    }

    /// World units per editor unit for spawn and collectible coordinates. `editor_tile_size`
    /// is the level's own override or `self.editor_tile_size`, already checked positive.
    pub fn editor_scale(&self, editor_tile_size: f32) -> f32 {
        self.tile_size / editor_tile_size
    }

    /// Enemy cruise speed for a 1-based level, before any power-mode slowdown.
    pub fn enemy_speed_for_level(&self, level: u32) -> f32 {
        let exponent = level.saturating_sub(1) as i32;
        self.enemy_base_speed * self.enemy_level_speed_growth.powi(exponent)
    }
}
