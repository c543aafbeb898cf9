/**
 * ROV Control Module
 *
 * Ties the control loop together:
 * - Thrust mixing from controller state
 * - Periodic console tick (command out, telemetry in)
 */

pub mod console;
pub mod thrust_mixer;

pub use console::{ControlConsole, LogDisplay, SensorDisplay, TickReport};
pub use thrust_mixer::{ControlMode, MixerConfig, Rounding, ThrustMixer};
