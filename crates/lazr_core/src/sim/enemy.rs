use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app::Vec2;
use crate::config::GameTuning;

use super::grid::{Cell, Grid};
use super::nav::{find_path, nearest_reachable};

const SCATTER_FALLBACK: Cell = Cell::new(1, 1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnemyMode {
    /// Heading out of the pen toward the nearest gate.
    Leaving,
    Patrolling,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnemyTuning {
    pub decision_interval: Duration,
    pub chase_radius_cells: f32,
    pub scatter_attempts: u32,
}

impl From<&GameTuning> for EnemyTuning {
    fn from(tuning: &GameTuning) -> Self {
        Self {
            decision_interval: tuning.enemy_decision_interval(),
            chase_radius_cells: tuning.enemy_chase_radius_cells,
            scatter_attempts: tuning.enemy_scatter_attempts,
        }
    }
}

impl Default for EnemyTuning {
    fn default() -> Self {
        Self::from(&GameTuning::default())
    }
}

/// Per-tick view of the world an enemy decides against.
#[derive(Debug, Clone, Copy)]
pub struct EnemySenses<'a> {
    pub grid: &'a Grid,
    pub player_cell: Option<Cell>,
    pub now: Duration,
    /// Cruise speed for this tick, level scaling and power slowdown already applied.
    pub speed: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Enemy {
    pub position: Vec2,
    pub velocity: Vec2,
    pub orientation_degrees: f32,
    pub mode: EnemyMode,
    pub eatable: bool,
    pub enabled: bool,
    spawn_position: Vec2,
    spawn_rotation: f32,
    next_decision: Option<Duration>,
    waypoint: Option<Vec2>,
}

impl Enemy {
    pub fn spawn_at(position: Vec2, rotation_degrees: f32) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            orientation_degrees: rotation_degrees,
            mode: EnemyMode::Leaving,
            eatable: true,
            enabled: true,
            spawn_position: position,
            spawn_rotation: rotation_degrees,
            next_decision: None,
            waypoint: None,
        }
    }

    pub fn spawn_position(&self) -> Vec2 {
        self.spawn_position
    }

    pub fn waypoint(&self) -> Option<Vec2> {
        self.waypoint
    }

    pub fn current_cell(&self, grid: &Grid) -> Option<Cell> {
        grid.cell_at_world(self.position)
    }

    /// Back to the spawn point in Leaving mode. Eatability is left to the caller.
    pub fn reset_to_spawn(&mut self) {
        self.position = self.spawn_position;
        self.orientation_degrees = self.spawn_rotation;
        self.mode = EnemyMode::Leaving;
        self.enabled = true;
        self.next_decision = None;
        self.halt();
    }

    /// Captured: out of play until respawned.
    pub fn disable(&mut self) {
        self.enabled = false;
        self.halt();
    }

    pub fn halt(&mut self) {
        self.velocity = Vec2::ZERO;
        self.waypoint = None;
    }

    /// Decides if due, then moves toward the committed waypoint.
    pub fn update(
        &mut self,
        tuning: &EnemyTuning,
        senses: &EnemySenses<'_>,
        rng: &mut impl Rng,
        dt_seconds: f32,
    ) {
        if !self.enabled {
            return;
        }
        let due = self
            .next_decision
            .map_or(true, |deadline| senses.now > deadline);
        if due {
            self.next_decision = Some(senses.now + tuning.decision_interval);
            self.decide(tuning, senses, rng);
        }
        self.advance(dt_seconds);
    }

    fn decide(&mut self, tuning: &EnemyTuning, senses: &EnemySenses<'_>, rng: &mut impl Rng) {
        self.halt();
        let Some(current) = self.current_cell(senses.grid) else {
            return;
        };

        let target = match self.mode {
            EnemyMode::Leaving => {
                let gate = nearest_reachable(senses.grid, current, senses.grid.gate_cells());
                if gate == Some(current) {
                    self.mode = EnemyMode::Patrolling;
                    debug!(row = current.row, col = current.col, "enemy_left_pen");
                }
                gate
            }
            EnemyMode::Patrolling => Some(patrol_target(
                tuning,
                senses.grid,
                current,
                senses.player_cell,
                rng,
            )),
        };

        let Some(target) = target else {
            return;
        };
        let Some(path) = find_path(senses.grid, current, target) else {
            return;
        };
        if let Some(&next) = path.get(1) {
            self.steer_toward(senses.grid.cell_center_world(next), senses.speed);
        }
    }

    fn steer_toward(&mut self, waypoint: Vec2, speed: f32) {
        let offset = waypoint - self.position;
        let distance = offset.length();
        if distance <= f32::EPSILON {
            return;
        }
        self.velocity = offset * (speed / distance);
        self.orientation_degrees = self.velocity.angle_degrees();
        self.waypoint = Some(waypoint);
    }

    fn advance(&mut self, dt_seconds: f32) {
        let Some(waypoint) = self.waypoint else {
            return;
        };
        let step = self.velocity * dt_seconds;
        if step.length() >= self.position.distance(waypoint) {
            self.position = waypoint;
            self.halt();
        } else {
            self.position = self.position + step;
        }
    }
}

/// Chase the player when close, otherwise wander to a random open cell.
fn patrol_target(
    tuning: &EnemyTuning,
    grid: &Grid,
    current: Cell,
    player_cell: Option<Cell>,
    rng: &mut impl Rng,
) -> Cell {
    if let Some(player) = player_cell {
        if current.euclidean_distance(player) < tuning.chase_radius_cells {
            return player;
        }
    }
    random_open_cell(grid, tuning.scatter_attempts, rng)
}

/// Rejection-samples an interior cell that is not blocked; falls back to (1, 1).
pub fn random_open_cell(grid: &Grid, attempts: u32, rng: &mut impl Rng) -> Cell {
    let (rows, cols) = grid.dimensions();
    if rows < 3 || cols < 3 {
        return SCATTER_FALLBACK;
    }
    for _ in 0..attempts {
        let cell = Cell::new(rng.gen_range(1..=rows - 2), rng.gen_range(1..=cols - 2));
        if !grid.is_blocked(cell) {
            return cell;
        }
    }
    SCATTER_FALLBACK
}
