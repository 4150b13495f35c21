//! Round flow for one player: countdowns, power mode, pickups, contact and level progression.

mod collision;

use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::app::{InputSnapshot, Scene, SceneCommand, Vec2};
use crate::config::GameTuning;
use crate::content::{
    insert_ranked, qualifies, Collectible, CollectibleKind, Level, RankedResult,
    RankedResultsStore,
};
use crate::sim::enemy::{Enemy, EnemyMode, EnemySenses, EnemyTuning};
use crate::sim::timers::{CountdownStage, DeferredEffect, TimerWheel};
use crate::sim::vehicle::{
    integrate_with_walls, step_motion, wrap_position, VehicleMotion, VehicleTuning,
};

use collision::{body_box, touched_collectibles, touching_enemies};

pub const READY_BANNER: &str = "READY!";
pub const GAME_OVER_BANNER: &str = "GAME OVER";
pub const DEFAULT_INITIALS: &str = "AAA";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    ReadyCountdown,
    Running,
    Paused,
    Dying,
    GameOver,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionEvent {
    LevelStarted { level: u32 },
    RoundLive,
    PelletEaten { score: u32 },
    PowerStarted,
    PowerEnded,
    EnemyCaptured { slot: usize },
    EnemyRespawned { slot: usize },
    PlayerHit { lives_left: u32 },
    LevelCleared { level: u32 },
    GameOver { score: u32 },
    RunFinished { score: u32, rank: Option<usize> },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("level catalog is empty")]
    EmptyCatalog,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub tuning: GameTuning,
    pub seed: u64,
    pub initials: String,
    pub start_level: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tuning: GameTuning::default(),
            seed: 0,
            initials: DEFAULT_INITIALS.to_string(),
            start_level: 1,
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub score: u32,
    pub level: u32,
    /// 1-based position in the ranked table, when the score made it in.
    pub rank: Option<usize>,
    pub quit: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlayerSnapshot {
    pub position: Vec2,
    pub orientation_degrees: f32,
    pub speed: f32,
    pub drift_visible: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EnemySnapshot {
    pub position: Vec2,
    pub orientation_degrees: f32,
    pub mode: EnemyMode,
    pub visible: bool,
    pub eatable: bool,
    /// Touching this enemy right now would cost a life.
    pub danger: bool,
}

/// Read-only view handed to presentation each tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub banner: Option<String>,
    pub score: u32,
    pub high_score: u32,
    pub lives: u32,
    pub level: u32,
    pub level_name: String,
    pub powered: bool,
    pub player: PlayerSnapshot,
    pub enemies: Vec<EnemySnapshot>,
    pub collectibles: Vec<Collectible>,
    pub ended: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct PlayerCar {
    position: Vec2,
    motion: VehicleMotion,
    drift_visible: bool,
}

impl PlayerCar {
    fn stop(&mut self) {
        self.motion.speed = 0.0;
        self.motion.velocity = Vec2::ZERO;
        self.drift_visible = false;
    }
}

/// All mutable game state for one play session.
pub struct Session {
    tuning: GameTuning,
    vehicle_tuning: VehicleTuning,
    enemy_tuning: EnemyTuning,
    catalog: Vec<Level>,
    level: Level,
    level_number: u32,
    start_level: u32,
    phase: SessionPhase,
    banner: Option<&'static str>,
    score: u32,
    high_score: u32,
    lives: u32,
    power_expires_at: Option<Duration>,
    clock: Duration,
    player: PlayerCar,
    enemies: Vec<Enemy>,
    timers: TimerWheel,
    rng: StdRng,
    results: Box<dyn RankedResultsStore>,
    initials: String,
    events: Vec<SessionEvent>,
    ended: Option<RunSummary>,
}

impl Session {
    /// Builds the session and starts a new game at the configured level.
    pub fn new(
        config: SessionConfig,
        catalog: Vec<Level>,
        results: Box<dyn RankedResultsStore>,
    ) -> Result<Self, SessionError> {
        let first = catalog.first().cloned().ok_or(SessionError::EmptyCatalog)?;
        let high_score = match results.load_ranked_results() {
            Ok(entries) => entries.first().map_or(0, |entry| entry.score),
            Err(error) => {
                warn!(error = %error, "ranked_results_load_failed");
                0
            }
        };

        let mut session = Self {
            vehicle_tuning: VehicleTuning::from(&config.tuning),
            enemy_tuning: EnemyTuning::from(&config.tuning),
            lives: config.tuning.starting_lives,
            tuning: config.tuning,
            catalog,
            level: first,
            level_number: 1,
            start_level: config.start_level.max(1),
            phase: SessionPhase::ReadyCountdown,
            banner: None,
            score: 0,
            high_score,
            power_expires_at: None,
            clock: Duration::ZERO,
            player: PlayerCar::default(),
            enemies: Vec::new(),
            timers: TimerWheel::default(),
            rng: StdRng::seed_from_u64(config.seed),
            results,
            initials: config.initials,
            events: Vec::new(),
            ended: None,
        };
        session.new_game_at_level(session.start_level);
        Ok(session)
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn high_score(&self) -> u32 {
        self.high_score
    }

    pub fn lives(&self) -> u32 {
        self.lives
    }

    pub fn level_number(&self) -> u32 {
        self.level_number
    }

    pub fn level(&self) -> &Level {
        &self.level
    }

    pub fn is_powered(&self) -> bool {
        self.power_expires_at.is_some()
    }

    pub fn clock(&self) -> Duration {
        self.clock
    }

    pub fn enemies(&self) -> &[Enemy] {
        &self.enemies
    }

    pub fn player_position(&self) -> Vec2 {
        self.player.position
    }

    pub fn ended(&self) -> Option<RunSummary> {
        self.ended
    }

    pub fn new_game(&mut self) {
        self.new_game_at_level(self.start_level);
    }

    /// Fresh score and lives, starting from `level` (1-based, wrapped onto the catalog).
    pub fn new_game_at_level(&mut self, level: u32) {
        self.score = 0;
        self.lives = self.tuning.starting_lives;
        self.level_number = self.wrap_level_number(level);
        self.enemies.clear();
        self.ended = None;
        info!(level = self.level_number, lives = self.lives, "new_game");
        self.start_level();
    }

    /// Reloads the current level, keeping score, lives and level number.
    pub fn restart_level(&mut self) {
        if self.ended.is_some() {
            return;
        }
        info!(level = self.level_number, "level_restarted");
        self.start_level();
    }

    /// Abandons the run. Later ticks do nothing until a new game starts.
    pub fn quit(&mut self) {
        if self.ended.is_some() {
            return;
        }
        self.timers.bump_epoch();
        self.halt_everything();
        let summary = RunSummary {
            score: self.score,
            level: self.level_number,
            rank: None,
            quit: true,
        };
        info!(score = self.score, level = self.level_number, "session_quit");
        self.score = 0;
        self.lives = self.tuning.starting_lives;
        self.power_expires_at = None;
        self.banner = None;
        self.ended = Some(summary);
    }

    /// Advances the world by `dt` and returns what happened.
    pub fn tick(&mut self, dt: Duration, input: &InputSnapshot) -> Vec<SessionEvent> {
        if self.ended.is_some() {
            return Vec::new();
        }
        self.clock += dt;

        for effect in self.timers.drain_due(self.clock) {
            self.apply_deferred(effect);
            if self.ended.is_some() {
                return std::mem::take(&mut self.events);
            }
        }

        if input.pause_pressed() {
            self.toggle_pause();
        }
        if self.phase != SessionPhase::Running {
            return std::mem::take(&mut self.events);
        }

        if self
            .power_expires_at
            .is_some_and(|expires_at| self.clock >= expires_at)
        {
            self.power_expires_at = None;
            self.events.push(SessionEvent::PowerEnded);
            debug!("power_ended");
        }

        let dt_seconds = dt.as_secs_f32();
        self.drive_player(input, dt_seconds);
        self.move_enemies(dt_seconds);
        self.resolve_overlaps();

        std::mem::take(&mut self.events)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let powered = self.is_powered();
        SessionSnapshot {
            phase: self.phase,
            banner: self.banner.map(str::to_string),
            score: self.score,
            high_score: self.high_score,
            lives: self.lives,
            level: self.level_number,
            level_name: self.level.name.clone(),
            powered,
            player: PlayerSnapshot {
                position: self.player.position,
                orientation_degrees: self.player.motion.orientation_degrees,
                speed: self.player.motion.speed,
                drift_visible: self.player.drift_visible,
            },
            enemies: self
                .enemies
                .iter()
                .map(|enemy| EnemySnapshot {
                    position: enemy.position,
                    orientation_degrees: enemy.orientation_degrees,
                    mode: enemy.mode,
                    visible: enemy.enabled,
                    eatable: enemy.eatable,
                    danger: !(powered && enemy.eatable),
                })
                .collect(),
            collectibles: self.level.collectibles.clone(),
            ended: self.ended.is_some(),
        }
    }

    /// Maps any 1-based level onto `1..=catalog.len()`.
    fn wrap_level_number(&self, level: u32) -> u32 {
        let count = self.catalog.len() as u32;
        level.max(1).saturating_sub(1) % count + 1
    }

    fn catalog_level(&self, level_number: u32) -> Level {
        let index = (level_number.saturating_sub(1) as usize) % self.catalog.len();
        self.catalog[index].clone()
    }

    fn start_level(&mut self) {
        self.timers.bump_epoch();
        self.level = self.catalog_level(self.level_number);
        self.power_expires_at = None;

        let spawn = self.level.player_spawn;
        self.player = PlayerCar {
            position: spawn.position,
            motion: VehicleMotion {
                orientation_degrees: spawn.rotation_degrees,
                ..VehicleMotion::default()
            },
            drift_visible: false,
        };
        self.spawn_enemies();

        self.phase = SessionPhase::ReadyCountdown;
        self.banner = Some(READY_BANNER);
        self.timers.schedule(
            self.clock + Duration::from_millis(self.tuning.ready_banner_ms),
            DeferredEffect::ReadyBannerDone,
        );
        self.events.push(SessionEvent::LevelStarted {
            level: self.level_number,
        });
        info!(
            level = self.level_number,
            name = %self.level.name,
            dots = self.level.score_pellet_count(),
            enemies = self.enemies.len(),
            "level_started"
        );
    }

    /// Explicit spawn points when the level lists them, otherwise shuffled pen cells.
    /// Eatability carries over per slot from the previous level.
    fn spawn_enemies(&mut self) {
        let spawns: Vec<(Vec2, f32)> = if self.level.enemy_spawns.is_empty() {
            let mut pens = self.level.grid.pen_cells().to_vec();
            pens.shuffle(&mut self.rng);
            pens.truncate(self.tuning.max_pen_enemies);
            pens.into_iter()
                .map(|cell| (self.level.grid.cell_center_world(cell), 0.0))
                .collect()
        } else {
            self.level
                .enemy_spawns
                .iter()
                .map(|spawn| (spawn.position, spawn.rotation_degrees))
                .collect()
        };

        let previous = std::mem::take(&mut self.enemies);
        self.enemies = spawns
            .into_iter()
            .enumerate()
            .map(|(slot, (position, rotation))| {
                let mut enemy = Enemy::spawn_at(position, rotation);
                if let Some(carried) = previous.get(slot) {
                    enemy.eatable = carried.eatable;
                }
                enemy
            })
            .collect();
    }

    fn apply_deferred(&mut self, effect: DeferredEffect) {
        match effect {
            DeferredEffect::ReadyBannerDone | DeferredEffect::CountdownFinished => {
                self.phase = SessionPhase::Running;
                self.banner = None;
                self.events.push(SessionEvent::RoundLive);
            }
            DeferredEffect::RespawnEnemy(slot) => {
                if let Some(enemy) = self.enemies.get_mut(slot) {
                    enemy.reset_to_spawn();
                    enemy.eatable = false;
                    self.events.push(SessionEvent::EnemyRespawned { slot });
                }
            }
            DeferredEffect::DeathReset => self.reset_after_death(),
            DeferredEffect::CountdownStage(stage) => {
                self.banner = Some(stage.banner());
            }
            DeferredEffect::GameOverFinalize => self.finish_run(),
        }
    }

    fn toggle_pause(&mut self) {
        match self.phase {
            SessionPhase::Running => {
                self.phase = SessionPhase::Paused;
                self.halt_everything();
                info!(level = self.level_number, "paused");
            }
            SessionPhase::Paused => {
                self.phase = SessionPhase::Running;
                info!(level = self.level_number, "resumed");
            }
            _ => {}
        }
    }

    fn halt_everything(&mut self) {
        self.player.stop();
        for enemy in &mut self.enemies {
            enemy.halt();
        }
    }

    fn drive_player(&mut self, input: &InputSnapshot, dt_seconds: f32) {
        let step = step_motion(
            &self.vehicle_tuning,
            self.player.motion,
            input.drive_intent(),
            dt_seconds,
        );
        let (position, velocity) = integrate_with_walls(
            &self.level.grid,
            self.player.position,
            step.motion.velocity,
            self.tuning.player_body.half_extents(),
            self.tuning.wall_inset,
            dt_seconds,
        );
        self.player.motion = VehicleMotion {
            velocity,
            ..step.motion
        };
        self.player.drift_visible = step.drift_visible;
        self.player.position = wrap_position(
            position,
            self.level.grid.world_size(),
            self.tuning.tile_size,
        );
    }

    fn move_enemies(&mut self, dt_seconds: f32) {
        let mut speed = self.tuning.enemy_speed_for_level(self.level_number);
        if self.is_powered() {
            speed *= self.tuning.enemy_power_speed_multiplier;
        }
        let grid = &self.level.grid;
        let senses = EnemySenses {
            grid,
            player_cell: grid.cell_at_world(self.player.position),
            now: self.clock,
            speed,
        };
        let world_size = grid.world_size();
        for enemy in &mut self.enemies {
            enemy.update(&self.enemy_tuning, &senses, &mut self.rng, dt_seconds);
            enemy.position = wrap_position(enemy.position, world_size, self.tuning.tile_size);
        }
    }

    fn resolve_overlaps(&mut self) {
        let player_box = body_box(self.player.position, self.tuning.player_body);

        let touched = touched_collectibles(&player_box, &self.level.collectibles, &self.tuning);
        let mut picked = touched
            .into_iter()
            .rev()
            .map(|index| self.level.collectibles.remove(index))
            .collect::<Vec<_>>();
        picked.reverse();

        let mut ate_pellet = false;
        for collectible in picked {
            match collectible.kind {
                CollectibleKind::ScorePellet => {
                    ate_pellet = true;
                    self.add_score(self.tuning.dot_score);
                    self.events.push(SessionEvent::PelletEaten { score: self.score });
                }
                CollectibleKind::PowerPellet => self.start_power(),
            }
        }
        if ate_pellet && self.level.score_pellet_count() == 0 {
            self.advance_level();
            return;
        }

        for slot in touching_enemies(&player_box, &self.enemies, &self.tuning) {
            let powered = self.is_powered();
            let enemy = &mut self.enemies[slot];
            if powered && enemy.eatable {
                enemy.disable();
                self.add_score(self.tuning.kill_score);
                self.timers.schedule(
                    self.clock + Duration::from_millis(self.tuning.enemy_respawn_ms),
                    DeferredEffect::RespawnEnemy(slot),
                );
                self.events.push(SessionEvent::EnemyCaptured { slot });
                debug!(slot, score = self.score, "enemy_captured");
            } else {
                self.player_hit();
                return;
            }
        }
    }

    fn add_score(&mut self, amount: u32) {
        self.score = self.score.saturating_add(amount);
        self.high_score = self.high_score.max(self.score);
    }

    fn start_power(&mut self) {
        self.power_expires_at = Some(self.clock + self.tuning.power_duration());
        for enemy in &mut self.enemies {
            enemy.eatable = true;
        }
        self.events.push(SessionEvent::PowerStarted);
        debug!(level = self.level_number, "power_started");
    }

    fn advance_level(&mut self) {
        self.events.push(SessionEvent::LevelCleared {
            level: self.level_number,
        });
        info!(level = self.level_number, score = self.score, "level_cleared");
        // Past the last level the run starts over at level 1, enemy speed included.
        self.level_number = self.level_number % self.catalog.len() as u32 + 1;
        self.start_level();
    }

    fn player_hit(&mut self) {
        self.lives = self.lives.saturating_sub(1);
        self.halt_everything();
        self.events.push(SessionEvent::PlayerHit {
            lives_left: self.lives,
        });
        info!(lives = self.lives, score = self.score, "player_hit");

        if self.lives > 0 {
            self.phase = SessionPhase::Dying;
            self.timers.schedule(
                self.clock + Duration::from_millis(self.tuning.death_reset_ms),
                DeferredEffect::DeathReset,
            );
        } else {
            self.phase = SessionPhase::GameOver;
            self.banner = Some(GAME_OVER_BANNER);
            self.timers.schedule(
                self.clock + Duration::from_millis(self.tuning.game_over_ms),
                DeferredEffect::GameOverFinalize,
            );
            self.events.push(SessionEvent::GameOver { score: self.score });
            info!(score = self.score, level = self.level_number, "game_over");
        }
    }

    fn reset_after_death(&mut self) {
        let spawn = self.level.player_spawn;
        self.player.position = spawn.position;
        self.player.motion = VehicleMotion {
            orientation_degrees: spawn.rotation_degrees,
            ..VehicleMotion::default()
        };
        self.player.drift_visible = false;
        for enemy in &mut self.enemies {
            enemy.reset_to_spawn();
        }

        self.phase = SessionPhase::ReadyCountdown;
        let step = self.tuning.countdown_step_ms;
        for (offset, stage) in CountdownStage::ALL.into_iter().enumerate() {
            self.timers.schedule(
                self.clock + Duration::from_millis(step * offset as u64),
                DeferredEffect::CountdownStage(stage),
            );
        }
        self.banner = Some(CountdownStage::Three.banner());
        self.timers.schedule(
            self.clock + Duration::from_millis(self.tuning.countdown_go_ms),
            DeferredEffect::CountdownFinished,
        );
    }

    fn finish_run(&mut self) {
        let rank = self.record_result();
        self.timers.bump_epoch();
        self.banner = None;
        self.ended = Some(RunSummary {
            score: self.score,
            level: self.level_number,
            rank,
            quit: false,
        });
        self.events.push(SessionEvent::RunFinished {
            score: self.score,
            rank,
        });
        info!(score = self.score, rank = ?rank, "run_finished");
    }

    /// Persistence failures are logged and treated as an empty table.
    fn record_result(&mut self) -> Option<usize> {
        let mut table = match self.results.load_ranked_results() {
            Ok(table) => table,
            Err(error) => {
                warn!(error = %error, "ranked_results_load_failed");
                Vec::new()
            }
        };
        if !qualifies(&table, self.score) {
            return None;
        }
        let rank = insert_ranked(&mut table, RankedResult::new(self.initials.clone(), self.score));
        if let Err(error) = self.results.save_ranked_results(&table) {
            warn!(error = %error, "ranked_results_save_failed");
        }
        if let Some(top) = table.first() {
            self.high_score = self.high_score.max(top.score);
        }
        rank
    }
}

/// Scene adapter that drives a [`Session`] from the loop runner.
pub struct GameSession {
    session: Session,
    last_events: Vec<SessionEvent>,
    ticks: u64,
}

impl GameSession {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            last_events: Vec::new(),
            ticks: 0,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    pub fn last_events(&self) -> &[SessionEvent] {
        &self.last_events
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

impl Scene for GameSession {
    fn load(&mut self) {
        let snapshot = self.session.snapshot();
        info!(
            level = snapshot.level,
            name = %snapshot.level_name,
            high_score = snapshot.high_score,
            "scene_loaded"
        );
    }

    fn update(&mut self, frame_dt: Duration, input: &InputSnapshot) -> SceneCommand {
        if input.quit_requested() {
            self.session.quit();
            return SceneCommand::Quit;
        }
        self.ticks = self.ticks.saturating_add(1);
        self.last_events = self.session.tick(frame_dt, input);
        for event in &self.last_events {
            debug!(tick = self.ticks, event = ?event, "session_event");
        }
        if self.session.ended().is_some() {
            return SceneCommand::Quit;
        }
        SceneCommand::None
    }

    fn shutdown(&mut self) {
        let summary = self.session.ended();
        info!(
            ticks = self.ticks,
            score = self.session.score(),
            high_score = self.session.high_score(),
            finished = summary.is_some(),
            "scene_shutdown"
        );
    }

    fn debug_title(&self) -> Option<String> {
        Some(format!(
            "LAZR DRIFT | level {} | score {} | lives {} | {:?}",
            self.session.level_number(),
            self.session.score(),
            self.session.lives(),
            self.session.phase()
        ))
    }
}
