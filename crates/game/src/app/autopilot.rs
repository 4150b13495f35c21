use lazr_core::content::CollectibleKind;
use lazr_core::sim::{find_path, nearest_reachable, Cell, Grid};
use lazr_core::{
    ActionStates, FrameInput, GameSession, InputAction, InputSource, SessionPhase, Vec2,
};

/// Heading error (degrees) that maps to full steering lock.
const FULL_LOCK_DEGREES: f32 = 30.0;
/// Beyond this heading error the car coasts while it turns.
const THROTTLE_CUTOFF_DEGREES: f32 = 70.0;

/// Drives toward the nearest remaining dot along a BFS route. Never pauses or quits.
#[derive(Debug, Default)]
pub(crate) struct Autopilot {
    goal: Option<Cell>,
}

impl InputSource<GameSession> for Autopilot {
    fn next_frame(&mut self, scene: &GameSession) -> FrameInput {
        let session = scene.session();
        if session.phase() != SessionPhase::Running {
            self.goal = None;
            return FrameInput::default();
        }

        let snapshot = session.snapshot();
        let grid = &session.level().grid;
        let position = snapshot.player.position;
        let Some(here) = grid.cell_at_world(position) else {
            // Out in a wrap tunnel: keep going.
            return throttle(0.0);
        };

        let dots = snapshot
            .collectibles
            .iter()
            .filter(|collectible| collectible.kind == CollectibleKind::ScorePellet)
            .filter_map(|collectible| grid.cell_at_world(collectible.position))
            .collect::<Vec<_>>();
        if self.goal.map_or(true, |goal| !dots.contains(&goal)) {
            self.goal = nearest_reachable(grid, here, &dots);
        }
        let Some(goal) = self.goal else {
            return FrameInput::default();
        };

        let waypoint = next_waypoint(grid, here, goal);
        let desired = (waypoint - position).angle_degrees();
        let heading_error = wrap_degrees(desired - snapshot.player.orientation_degrees);
        let steer = (heading_error / FULL_LOCK_DEGREES).clamp(-1.0, 1.0);
        if heading_error.abs() > THROTTLE_CUTOFF_DEGREES {
            FrameInput {
                actions: ActionStates::default(),
                analog_steer: steer,
            }
        } else {
            throttle(steer)
        }
    }
}

fn throttle(steer: f32) -> FrameInput {
    FrameInput {
        actions: ActionStates::default().with(InputAction::Accelerate, true),
        analog_steer: steer,
    }
}

/// Center of the next cell on the route, or of the goal itself when already there.
fn next_waypoint(grid: &Grid, here: Cell, goal: Cell) -> Vec2 {
    let next = find_path(grid, here, goal)
        .and_then(|path| path.get(1).copied())
        .unwrap_or(goal);
    grid.cell_center_world(next)
}

/// Normalizes an angle to (-180, 180].
fn wrap_degrees(degrees: f32) -> f32 {
    let wrapped = degrees.rem_euclid(360.0);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}
