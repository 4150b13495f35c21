pub mod enemy;
pub mod grid;
pub mod nav;
pub mod session;
pub mod timers;
pub mod vehicle;

pub use enemy::{random_open_cell, Enemy, EnemyMode, EnemySenses, EnemyTuning};
pub use grid::{parse_grid_csv, Cell, CellKind, Grid, GridError};
pub use nav::{find_path, nearest_reachable};
pub use session::{
    EnemySnapshot, GameSession, PlayerSnapshot, RunSummary, Session, SessionConfig, SessionError,
    SessionEvent, SessionPhase, SessionSnapshot, DEFAULT_INITIALS, GAME_OVER_BANNER,
    READY_BANNER,
};
pub use timers::{CountdownStage, DeferredEffect, TimerWheel};
pub use vehicle::{
    integrate_with_walls, step_motion, wrap_position, DriveIntent, MotionStep, VehicleMotion,
    VehicleTuning,
};
