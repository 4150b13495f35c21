use crate::sim::vehicle::DriveIntent;

pub const ANALOG_DEADZONE: f32 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    SteerLeft,
    SteerRight,
    Accelerate,
    Reverse,
    Drift,
    Pause,
    Quit,
}

const ACTION_COUNT: usize = 7;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionStates {
    down: [bool; ACTION_COUNT],
}

impl ActionStates {
    pub fn set(&mut self, action: InputAction, is_down: bool) {
        self.down[action.index()] = is_down;
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.down[action.index()]
    }

    pub fn with(mut self, action: InputAction, is_down: bool) -> Self {
        self.set(action, is_down);
        self
    }
}

impl InputAction {
    const fn index(self) -> usize {
        match self {
            InputAction::SteerLeft => 0,
            InputAction::SteerRight => 1,
            InputAction::Accelerate => 2,
            InputAction::Reverse => 3,
            InputAction::Drift => 4,
            InputAction::Pause => 5,
            InputAction::Quit => 6,
        }
    }
}

/// Released-to-pressed detection for one input source.
#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeTrigger {
    was_down: bool,
}

impl EdgeTrigger {
    /// Feeds this tick's level and returns true only on the tick it went down.
    pub fn pressed_this_tick(&mut self, is_down: bool) -> bool {
        let pressed = is_down && !self.was_down;
        self.was_down = is_down;
        pressed
    }
}

/// Everything the simulation reads from the input layer for one tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputSnapshot {
    actions: ActionStates,
    analog_steer: f32,
    pause_pressed: bool,
    quit_requested: bool,
}

impl InputSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_action_down(mut self, action: InputAction, is_down: bool) -> Self {
        self.actions.set(action, is_down);
        self
    }

    pub fn with_analog_steer(mut self, axis: f32) -> Self {
        self.analog_steer = axis;
        self
    }

    pub fn with_pause_pressed(mut self, pause_pressed: bool) -> Self {
        self.pause_pressed = pause_pressed;
        self
    }

    pub fn with_quit_requested(mut self, quit_requested: bool) -> Self {
        self.quit_requested = quit_requested;
        self
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.actions.is_down(action)
    }

    pub fn pause_pressed(&self) -> bool {
        self.pause_pressed
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    /// Steering in [-1, 1]; an analog stick outside the deadzone overrides the digital keys.
    pub fn steer_axis(&self) -> f32 {
        if self.analog_steer.is_finite() && self.analog_steer.abs() > ANALOG_DEADZONE {
            return self.analog_steer.clamp(-1.0, 1.0);
        }
        if self.is_down(InputAction::SteerLeft) {
            -1.0
        } else if self.is_down(InputAction::SteerRight) {
            1.0
        } else {
            0.0
        }
    }

    pub fn drive_intent(&self) -> DriveIntent {
        DriveIntent {
            steer: self.steer_axis(),
            accelerate: self.is_down(InputAction::Accelerate),
            reverse: self.is_down(InputAction::Reverse),
            drift: self.is_down(InputAction::Drift),
        }
    }
}

/// Turns raw per-tick action levels into an [`InputSnapshot`], computing the pause edge
/// exactly once per tick.
#[derive(Debug, Default)]
pub struct InputSampler {
    pause_edge: EdgeTrigger,
}

impl InputSampler {
    pub fn sample(&mut self, actions: ActionStates, analog_steer: f32) -> InputSnapshot {
        let pause_pressed = self
            .pause_edge
            .pressed_this_tick(actions.is_down(InputAction::Pause));
        InputSnapshot {
            actions,
            analog_steer,
            pause_pressed,
            quit_requested: actions.is_down(InputAction::Quit),
        }
    }
}
