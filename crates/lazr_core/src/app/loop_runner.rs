use std::env;
use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};

use crate::content::LevelLoadError;
use crate::sim::SessionError;
use crate::StartupError;

use super::input::{ActionStates, InputSampler};
use super::metrics::MetricsAccumulator;
use super::{LoopMetricsSnapshot, MetricsHandle, Scene, SceneCommand};

pub const FRAME_MS_ENV_VAR: &str = "LAZR_FRAME_MS";
pub const MAX_FRAMES_ENV_VAR: &str = "LAZR_MAX_FRAMES";

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub frame_delta: Duration,
    pub max_frame_delta: Duration,
    /// Hard stop for runs whose scene never asks to quit.
    pub max_frames: Option<u64>,
    pub metrics_log_interval: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            frame_delta: Duration::from_micros(16_667),
            max_frame_delta: Duration::from_millis(250),
            max_frames: Some(60 * 60 * 10),
            metrics_log_interval: Duration::from_secs(10),
        }
    }
}

impl LoopConfig {
    /// Defaults with `LAZR_FRAME_MS` and `LAZR_MAX_FRAMES` applied. `LAZR_MAX_FRAMES=0` removes
    /// the frame cap.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(ms) = read_u64_env(FRAME_MS_ENV_VAR) {
            config.frame_delta = Duration::from_millis(ms);
        }
        if let Some(frames) = read_u64_env(MAX_FRAMES_ENV_VAR) {
            config.max_frames = (frames > 0).then_some(frames);
        }
        config
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("failed to load levels: {0}")]
    Levels(#[from] LevelLoadError),
    #[error("failed to read tuning file {path}: {source}")]
    TuningRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse tuning file {path}: {source}")]
    TuningParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to start session: {0}")]
    Session(#[from] SessionError),
    #[error("frame delta must be greater than zero")]
    ZeroFrameDelta,
}

/// Raw per-frame input levels. Edge detection happens in the runner.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameInput {
    pub actions: ActionStates,
    pub analog_steer: f32,
}

/// Where a headless run gets its controls. The source may look at the scene to decide.
pub trait InputSource<S: ?Sized> {
    fn next_frame(&mut self, scene: &S) -> FrameInput;
}

/// Plays back a fixed list of frames, then idles.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    frames: Vec<FrameInput>,
    cursor: usize,
}

impl ScriptedInput {
    pub fn new(frames: Vec<FrameInput>) -> Self {
        Self { frames, cursor: 0 }
    }
}

impl<S: ?Sized> InputSource<S> for ScriptedInput {
    fn next_frame(&mut self, _scene: &S) -> FrameInput {
        let frame = self.frames.get(self.cursor).copied().unwrap_or_default();
        self.cursor = self.cursor.saturating_add(1);
        frame
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopReport {
    pub frames: u64,
    pub simulated: Duration,
    /// False when the frame cap stopped the run.
    pub quit_by_scene: bool,
    pub metrics: LoopMetricsSnapshot,
}

pub fn run_headless<S, I>(
    config: &LoopConfig,
    scene: &mut S,
    input: &mut I,
) -> Result<LoopReport, AppError>
where
    S: Scene + ?Sized,
    I: InputSource<S> + ?Sized,
{
    let metrics_handle = MetricsHandle::default();
    run_headless_with_metrics(config, scene, input, &metrics_handle)
}

pub fn run_headless_with_metrics<S, I>(
    config: &LoopConfig,
    scene: &mut S,
    input: &mut I,
    metrics_handle: &MetricsHandle,
) -> Result<LoopReport, AppError>
where
    S: Scene + ?Sized,
    I: InputSource<S> + ?Sized,
{
    if config.frame_delta.is_zero() {
        return Err(AppError::ZeroFrameDelta);
    }
    let max_frame_delta =
        normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(250));
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let frame_dt = clamp_frame_delta(config.frame_delta, max_frame_delta);
    if frame_dt < config.frame_delta {
        warn!(
            requested_ms = config.frame_delta.as_millis() as u64,
            clamped_ms = frame_dt.as_millis() as u64,
            "frame_delta_clamped"
        );
    }

    info!(
        frame_delta_ms = frame_dt.as_secs_f32() * 1000.0,
        max_frames = ?config.max_frames,
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        "loop_config"
    );

    scene.load();
    let mut sampler = InputSampler::default();
    let mut metrics = MetricsAccumulator::new(metrics_log_interval, Instant::now());
    let mut simulated = Duration::ZERO;
    let mut frames = 0u64;
    let mut quit_by_scene = false;

    while config.max_frames.map_or(true, |cap| frames < cap) {
        let raw = input.next_frame(scene);
        let snapshot = sampler.sample(raw.actions, raw.analog_steer);
        let command = scene.update(frame_dt, &snapshot);
        frames = frames.saturating_add(1);
        simulated = simulated.saturating_add(frame_dt);
        metrics.record_tick(frame_dt);

        if let Some(snapshot) = metrics.maybe_snapshot(simulated, Instant::now()) {
            metrics_handle.publish(snapshot);
            let title = scene.debug_title().unwrap_or_default();
            info!(
                tps = snapshot.tps,
                sim_speed = snapshot.sim_speed,
                frame_time_ms = snapshot.frame_time_ms,
                frames,
                title = title.as_str(),
                "loop_metrics"
            );
        }

        if command == SceneCommand::Quit {
            quit_by_scene = true;
            info!(reason = "scene_quit", frames, "shutdown_requested");
            break;
        }
    }

    if !quit_by_scene {
        info!(reason = "frame_cap", frames, "shutdown_requested");
    }
    let final_metrics = metrics.take_snapshot(simulated, Instant::now());
    metrics_handle.publish(final_metrics);
    scene.shutdown();
    info!(
        frames,
        simulated_ms = simulated.as_millis() as u64,
        "shutdown"
    );

    Ok(LoopReport {
        frames,
        simulated,
        quit_by_scene,
        metrics: final_metrics,
    })
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn read_u64_env(var: &'static str) -> Option<u64> {
    match env::var(var) {
        Ok(value) => match value.trim().parse::<u64>() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                warn!(
                    env_var = var,
                    value = value.as_str(),
                    "invalid env var value; falling back to default"
                );
                None
            }
        },
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            warn!(
                env_var = var,
                error = %err,
                "unable to read env var; falling back to default"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{InputAction, InputSnapshot};

    #[derive(Default)]
    struct CountingScene {
        loaded: bool,
        shut_down: bool,
        updates: u32,
        quit_after: Option<u32>,
        pauses_seen: u32,
        total_dt: Duration,
    }

    impl Scene for CountingScene {
        fn load(&mut self) {
            self.loaded = true;
        }

        fn update(&mut self, frame_dt: Duration, input: &InputSnapshot) -> SceneCommand {
            self.updates += 1;
            self.total_dt += frame_dt;
            if input.pause_pressed() {
                self.pauses_seen += 1;
            }
            if self.quit_after == Some(self.updates) {
                SceneCommand::Quit
            } else {
                SceneCommand::None
            }
        }

        fn shutdown(&mut self) {
            self.shut_down = true;
        }
    }

    fn config(max_frames: Option<u64>) -> LoopConfig {
        LoopConfig {
            frame_delta: Duration::from_millis(10),
            max_frames,
            ..LoopConfig::default()
        }
    }

    #[test]
    fn clamp_frame_delta_caps_large_frame() {
        let max_frame_delta = Duration::from_millis(250);
        let raw_frame_dt = Duration::from_millis(600);

        assert_eq!(
            clamp_frame_delta(raw_frame_dt, max_frame_delta),
            max_frame_delta
        );
    }

    #[test]
    fn runner_stops_when_the_scene_quits() {
        let mut scene = CountingScene {
            quit_after: Some(5),
            ..CountingScene::default()
        };
        let report =
            run_headless(&config(Some(100)), &mut scene, &mut ScriptedInput::default())
                .expect("run");

        assert!(report.quit_by_scene);
        assert_eq!(report.frames, 5);
        assert_eq!(report.simulated, Duration::from_millis(50));
        assert!(scene.loaded && scene.shut_down);
    }

    #[test]
    fn frame_cap_ends_an_endless_scene() {
        let mut scene = CountingScene::default();
        let metrics = MetricsHandle::default();
        let report = run_headless_with_metrics(
            &config(Some(30)),
            &mut scene,
            &mut ScriptedInput::default(),
            &metrics,
        )
        .expect("run");

        assert!(!report.quit_by_scene);
        assert_eq!(scene.updates, 30);
        assert_eq!(metrics.snapshot().total_ticks, 30);
    }

    #[test]
    fn oversized_frames_are_clamped_before_reaching_the_scene() {
        let mut scene = CountingScene::default();
        let config = LoopConfig {
            frame_delta: Duration::from_secs(2),
            max_frames: Some(3),
            ..LoopConfig::default()
        };
        run_headless(&config, &mut scene, &mut ScriptedInput::default()).expect("run");
        assert_eq!(scene.total_dt, Duration::from_millis(750));
    }

    #[test]
    fn zero_frame_delta_is_rejected() {
        let mut scene = CountingScene::default();
        let config = LoopConfig {
            frame_delta: Duration::ZERO,
            ..LoopConfig::default()
        };
        let result = run_headless(&config, &mut scene, &mut ScriptedInput::default());
        assert!(matches!(result, Err(AppError::ZeroFrameDelta)));
        assert!(!scene.loaded);
    }

    #[test]
    fn held_pause_key_reaches_the_scene_as_one_edge() {
        let held = FrameInput {
            actions: ActionStates::default().with(InputAction::Pause, true),
            analog_steer: 0.0,
        };
        let mut input = ScriptedInput::new(vec![held; 6]);
        let mut scene = CountingScene::default();
        run_headless(&config(Some(10)), &mut scene, &mut input).expect("run");
        assert_eq!(scene.pauses_seen, 1);
    }
}
