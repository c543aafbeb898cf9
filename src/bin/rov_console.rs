/**
 * ROV Console Binary
 *
 * Runs the control core:
 * 1. Samples the gamepad on a background thread
 * 2. Sends thruster command frames over serial every tick
 * 3. Logs sensor telemetry from the vehicle
 *
 * Usage: rov_console [--port /dev/ttyACM0] [--baud 9600] [--gain 400] [-v]
 */

use std::io::{self, BufRead};
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use clap::Parser;
use log::{error, info, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use rov_console::config::{ConsoleConfig, DEFAULT_PORT};
use rov_console::input::{InputSampler, SamplerHandle, SharedControllerState};
use rov_console::rov::{ControlConsole, MixerConfig, Rounding, ThrustMixer};
use rov_console::uart::{self, DEFAULT_BAUD};
use rov_console::{ConsoleError, FrameFormat, Result};

#[derive(Parser, Debug)]
#[command(name = "rov_console", about = "Gamepad-to-thruster control core for the ROV")]
struct Args {
    /// Serial port connected to the vehicle
    #[arg(short, long, default_value = DEFAULT_PORT)]
    port: String,

    #[arg(short, long, default_value_t = DEFAULT_BAUD)]
    baud: u32,

    /// Control tick period in milliseconds
    #[arg(long, default_value_t = 33)]
    tick_ms: u64,

    /// Normalized stick magnitude below which input is ignored
    #[arg(long, default_value_t = 0.1)]
    dead_zone: f32,

    /// PWM microseconds per unit of stick deflection (400 spans the full 1100-1900 range)
    #[arg(long, default_value_t = 1.0)]
    gain: f32,

    /// Send unchecked frames for firmware that predates checksums.
    /// Offsets are then truncated toward zero the way that firmware expects.
    #[arg(long)]
    legacy_frames: bool,

    /// Milliseconds without a telemetry line before the vehicle counts as down
    #[arg(long, default_value_t = 1000)]
    telemetry_timeout_ms: u64,

    /// Pick the gamepad whose name contains this text
    #[arg(long)]
    gamepad: Option<String>,

    /// Print available serial ports and exit
    #[arg(long)]
    list_ports: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn to_config(&self) -> ConsoleConfig {
        let (format, rounding) = if self.legacy_frames {
            (FrameFormat::Legacy, Rounding::TowardZero)
        } else {
            (FrameFormat::Checked, Rounding::Nearest)
        };
        let mixer = MixerConfig {
            dead_zone: self.dead_zone,
            gain: self.gain,
            rounding,
        };
        ConsoleConfig::default()
            .with_port(&self.port)
            .with_baud(self.baud)
            .with_tick_period(Duration::from_millis(self.tick_ms))
            .with_frame_format(format)
            .with_telemetry_timeout(Duration::from_millis(self.telemetry_timeout_ms))
            .with_gamepad(self.gamepad.clone())
            .with_mixer(mixer)
    }

    fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

#[cfg(all(feature = "gamepad", target_os = "linux"))]
fn start_sampler(config: &ConsoleConfig, state: SharedControllerState) -> Result<SamplerHandle> {
    use rov_console::input::evdev_source::EvdevSource;

    let source = EvdevSource::open(config.gamepad.as_deref())
        .map_err(|e| ConsoleError::DeviceOpen(e.to_string()))?;
    Ok(InputSampler::new(source, state)
        .with_config(config.sampler.clone())
        .start())
}

#[cfg(not(all(feature = "gamepad", target_os = "linux")))]
fn start_sampler(_config: &ConsoleConfig, _state: SharedControllerState) -> Result<SamplerHandle> {
    Err(ConsoleError::DeviceOpen("built without gamepad support".to_string()))
}

fn run(config: ConsoleConfig) -> Result<()> {
    let (link, reader) = uart::open_serial(&config.port, config.baud_rate)?;
    let link = link.with_format(config.frame_format);

    // Gamepad sampling runs on its own thread
    let state = SharedControllerState::new();
    let sampler = start_sampler(&config, state.clone())?;

    let mut console = ControlConsole::new(state, link)
        .with_mixer(ThrustMixer::new(config.mixer.clone()))
        .with_telemetry(reader)
        .with_tick_period(config.tick_period)
        .with_telemetry_timeout(config.telemetry_timeout);

    // Start console in background
    let running = console.running_flag();
    let control = thread::spawn(move || {
        console.run();
    });

    // Simple stdin command loop
    info!("type 'x' to stop the thrusters and exit");
    for line in io::stdin().lock().lines() {
        let Ok(line) = line else {
            break;
        };
        match line.trim() {
            "x" | "exit" | "quit" => break,
            "" => {}
            other => info!("unknown command: {}", other),
        }
    }

    running.store(false, std::sync::atomic::Ordering::SeqCst);
    if control.join().is_err() {
        error!("control thread panicked");
    }
    sampler.join()
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = TermLogger::init(args.log_level(), Config::default(), TerminalMode::Mixed, ColorChoice::Auto) {
        eprintln!("logger init failed: {}", e);
    }

    if args.list_ports {
        for port in uart::available_ports() {
            println!("{}", port);
        }
        return ExitCode::SUCCESS;
    }

    let config = args.to_config();
    info!("port {} @ {} baud, tick {:?}, {:?} frames", config.port, config.baud_rate, config.tick_period, config.frame_format);

    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args() {
        let config = Args::parse_from(["rov_console"]).to_config();
        assert_eq!(config.mixer.gain, 1.0);
        assert_eq!(config.mixer.rounding, Rounding::Nearest);
        assert_eq!(config.frame_format, FrameFormat::Checked);
        assert_eq!(config.telemetry_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_legacy_frames_truncate_offsets() {
        let config = Args::parse_from(["rov_console", "--legacy-frames", "--gain", "400"]).to_config();
        assert_eq!(config.frame_format, FrameFormat::Legacy);
        assert_eq!(config.mixer.rounding, Rounding::TowardZero);
        assert_eq!(config.mixer.gain, 400.0);
    }
}
