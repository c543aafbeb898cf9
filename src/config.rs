use std::time::Duration;

use crate::input::SamplerConfig;
use crate::rov::console::{DEFAULT_TELEMETRY_TIMEOUT, DEFAULT_TICK};
use crate::rov::thrust_mixer::MixerConfig;
use crate::uart::protocol::FrameFormat;
use crate::uart::DEFAULT_BAUD;

pub const DEFAULT_PORT: &str = "/dev/ttyACM0";

/// Everything needed to bring the console up.
#[derive(Debug, Clone)]
pub struct ConsoleConfig{
    pub port: String,
    pub baud_rate: u32,
    pub frame_format: FrameFormat,
    pub tick_period: Duration,
    /// Silence on the telemetry line longer than this marks the vehicle down.
    pub telemetry_timeout: Duration,
    /// Substring of the gamepad's device name; `None` picks the best match.
    pub gamepad: Option<String>,
    pub mixer: MixerConfig,
    pub sampler: SamplerConfig,
}

impl Default for ConsoleConfig{
    fn default() -> Self{
        ConsoleConfig{
            port: DEFAULT_PORT.to_string(),
            baud_rate: DEFAULT_BAUD,
            frame_format: FrameFormat::Checked,
            tick_period: DEFAULT_TICK,
            telemetry_timeout: DEFAULT_TELEMETRY_TIMEOUT,
            gamepad: None,
            mixer: MixerConfig::default(),
            sampler: SamplerConfig::default(),
        }
    }
}

impl ConsoleConfig{
    pub fn with_port(mut self, port: &str) -> Self{
        self.port = port.to_string();
        self
    }

    pub fn with_baud(mut self, baud: u32) -> Self{
        self.baud_rate = baud;
        self
    }

    pub fn with_frame_format(mut self, format: FrameFormat) -> Self{
        self.frame_format = format;
        self
    }

    pub fn with_tick_period(mut self, period: Duration) -> Self{
        self.tick_period = period;
        self
    }

    pub fn with_telemetry_timeout(mut self, timeout: Duration) -> Self{
        self.telemetry_timeout = timeout;
        self
    }

    pub fn with_gamepad(mut self, name: Option<String>) -> Self{
        self.gamepad = name;
        self
    }

    pub fn with_mixer(mut self, mixer: MixerConfig) -> Self{
        self.mixer = mixer;
        self
    }
}
