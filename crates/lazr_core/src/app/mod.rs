mod input;
mod loop_runner;
mod metrics;
mod scene;

pub use input::{
    ActionStates, EdgeTrigger, InputAction, InputSampler, InputSnapshot, ANALOG_DEADZONE,
};
pub use loop_runner::{
    run_headless, run_headless_with_metrics, AppError, FrameInput, InputSource, LoopConfig,
    LoopReport, ScriptedInput, FRAME_MS_ENV_VAR, MAX_FRAMES_ENV_VAR,
};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use scene::{lerp, Aabb, Scene, SceneCommand, Vec2};
