use std::io;
use thiserror::Error;

use crate::telemetry::TelemetryParseError;
use crate::uart::protocol::FrameError;

#[derive(Debug, Error)]
pub enum ConsoleError{
    #[error("input device read failed: {0}")]
    DeviceRead(#[source] io::Error),

    #[error("input device unavailable: {0}")]
    DeviceOpen(String),

    #[error("serial write failed: {0}")]
    SerialWrite(#[source] io::Error),

    #[error("failed to open serial port {port}: {source}")]
    SerialOpen{
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error(transparent)]
    TelemetryParse(#[from] TelemetryParseError),

    #[error(transparent)]
    Frame(#[from] FrameError),
}

pub type Result<T> = std::result::Result<T, ConsoleError>;
