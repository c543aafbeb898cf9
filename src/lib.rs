pub mod error;
pub mod config;
pub mod input;
pub mod rov;
pub mod telemetry;
pub mod uart;
pub mod ffi;

#[cfg(feature = "python")]
pub mod python;

pub use error::{ConsoleError, Result};
pub use config::ConsoleConfig;
pub use input::{
    ControllerSnapshot, ControllerState, EventSource, InputSampler, RawEvent,
    SamplerHandle, SamplerHealth, ScriptedSource, SharedControllerState,
};
pub use rov::{ControlConsole, ControlMode, MixerConfig, Rounding, SensorDisplay, ThrustMixer};
pub use telemetry::{SensorBoard, SensorReading, TelemetryParseError};
pub use uart::{open_serial, SerialLink, TelemetryReader};
pub use uart::protocol::{FrameFormat, ThrusterCommand, NEUTRAL_PWM};
