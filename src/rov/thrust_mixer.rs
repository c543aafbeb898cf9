/**
 * Thrust Mixer
 *
 * Turns the latest controller state into six thruster setpoints.
 * One motion axis drives per tick:
 *   Surge  right stick Y  -> fwd1, fwd2   (stick forward = negative Y = ahead)
 *   Sway   right stick X  -> left, right
 *   Heave  left stick Y   -> dive1, dive2
 */

use crate::input::{ControllerSnapshot, ControllerState, SamplerHealth};
use crate::uart::protocol::{ThrusterCommand, NEUTRAL_PWM, THRUSTER_COUNT};

pub const DEFAULT_DEAD_ZONE: f32 = 0.1; // Raw 20 at joystick scale 200
pub const DEFAULT_GAIN: f32 = 1.0;      // Offset = stick value, at most ±1 µs

const FWD1: usize = 0;
const FWD2: usize = 1;
const LEFT: usize = 2;
const RIGHT: usize = 3;
const DIVE1: usize = 4;
const DIVE2: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    Neutral,
    Surge,
    Sway,
    Heave,
}

/// How a scaled offset becomes whole microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rounding {
    /// Half away from zero.
    #[default]
    Nearest,
    /// Drops the fraction, as the legacy vehicle firmware expects.
    TowardZero,
}

#[derive(Debug, Clone)]
pub struct MixerConfig {
    /// Normalized stick magnitude an axis must exceed to count.
    pub dead_zone: f32,
    /// PWM microseconds per unit of normalized stick.
    pub gain: f32,
    pub rounding: Rounding,
}

impl Default for MixerConfig {
    fn default() -> Self {
        MixerConfig {
            dead_zone: DEFAULT_DEAD_ZONE,
            gain: DEFAULT_GAIN,
            rounding: Rounding::Nearest,
        }
    }
}

impl MixerConfig {
    pub fn with_gain(mut self, gain: f32) -> Self {
        self.gain = gain;
        self
    }

    pub fn with_rounding(mut self, rounding: Rounding) -> Self {
        self.rounding = rounding;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ThrustMixer {
    pub config: MixerConfig,
}

impl ThrustMixer {
    pub fn new(config: MixerConfig) -> Self {
        ThrustMixer { config }
    }

    /// Picks the axis with the largest magnitude above the dead zone.
    /// Ties go Surge, then Sway, then Heave.
    pub fn select_mode(&self, state: &ControllerState) -> ControlMode {
        let candidates = [
            (ControlMode::Surge, state.right_joystick_y),
            (ControlMode::Sway, state.right_joystick_x),
            (ControlMode::Heave, state.left_joystick_y),
        ];

        let mut best = (ControlMode::Neutral, self.config.dead_zone);
        for (mode, value) in candidates {
            if value.abs() > best.1 {
                best = (mode, value.abs());
            }
        }
        best.0
    }

    pub fn mix(&self, state: &ControllerState) -> (ControlMode, ThrusterCommand) {
        let mode = self.select_mode(state);
        let mut pwm = [NEUTRAL_PWM; THRUSTER_COUNT];

        match mode {
            ControlMode::Neutral => {}
            ControlMode::Surge => {
                let v = NEUTRAL_PWM - self.offset(state.right_joystick_y);
                pwm[FWD1] = v;
                pwm[FWD2] = v;
            }
            ControlMode::Sway => {
                let v = NEUTRAL_PWM + self.offset(state.right_joystick_x);
                pwm[LEFT] = v;
                pwm[RIGHT] = v;
            }
            ControlMode::Heave => {
                let v = NEUTRAL_PWM + self.offset(state.left_joystick_y);
                pwm[DIVE1] = v;
                pwm[DIVE2] = v;
            }
        }

        (mode, ThrusterCommand::new(pwm))
    }

    /// Like `mix`, but a lost input device forces every thruster to neutral.
    pub fn mix_snapshot(&self, snapshot: &ControllerSnapshot) -> (ControlMode, ThrusterCommand) {
        if snapshot.health == SamplerHealth::DeviceLost {
            return (ControlMode::Neutral, ThrusterCommand::neutral());
        }
        self.mix(&snapshot.state)
    }

    fn offset(&self, value: f32) -> i32 {
        let scaled = value * self.config.gain;
        match self.config.rounding {
            Rounding::Nearest => scaled.round() as i32,
            Rounding::TowardZero => scaled.trunc() as i32,
        }
    }
}
