/**
 * ROV Control Console
 *
 * Periodic control tick:
 * 1. Snapshots the controller state written by the input sampler
 * 2. Mixes it into a thruster command and writes it to the serial link
 * 3. Drains inbound telemetry lines into the sensor board and display
 */

use std::io::{Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::input::{SamplerHealth, SharedControllerState};
use crate::telemetry::{SensorBoard, SensorReading};
use crate::uart::{SerialLink, TelemetryReader};
use crate::uart::protocol::ThrusterCommand;
use super::thrust_mixer::{ControlMode, ThrustMixer};

pub const DEFAULT_TICK: Duration = Duration::from_millis(33);
pub const DEFAULT_TELEMETRY_TIMEOUT: Duration = Duration::from_secs(1);

/// Where decoded sensor readings go for display.
pub trait SensorDisplay: Send {
    fn show(&mut self, reading: &SensorReading);
}

/// Display sink that writes readings to the log.
#[derive(Debug, Default)]
pub struct LogDisplay;

impl SensorDisplay for LogDisplay {
    fn show(&mut self, reading: &SensorReading) {
        info!(
            "[SENSORS] pH={:.2} temp={:.2}C pressure={:.2}kPa level={}",
            reading.ph, reading.temperature, reading.pressure, reading.level
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub mode: ControlMode,
    pub command: ThrusterCommand,
    pub sent: bool,
    pub telemetry_updates: usize,
}

pub struct ControlConsole<W: Write + Send, R: Read> {
    state: SharedControllerState,
    mixer: ThrustMixer,
    link: SerialLink<W>,
    telemetry: Option<TelemetryReader<R>>,
    board: SensorBoard,
    display: Box<dyn SensorDisplay>,
    running: Arc<AtomicBool>,
    tick_period: Duration,
    telemetry_timeout: Duration,
    last_mode: ControlMode,
    ticks: u64,
}

impl<W: Write + Send, R: Read> ControlConsole<W, R> {
    pub fn new(state: SharedControllerState, link: SerialLink<W>) -> Self {
        ControlConsole {
            state,
            mixer: ThrustMixer::default(),
            link,
            telemetry: None,
            board: SensorBoard::new(),
            display: Box::new(LogDisplay),
            running: Arc::new(AtomicBool::new(true)),
            tick_period: DEFAULT_TICK,
            telemetry_timeout: DEFAULT_TELEMETRY_TIMEOUT,
            last_mode: ControlMode::Neutral,
            ticks: 0,
        }
    }

    pub fn with_mixer(mut self, mixer: ThrustMixer) -> Self {
        self.mixer = mixer;
        self
    }

    pub fn with_telemetry(mut self, reader: TelemetryReader<R>) -> Self {
        self.telemetry = Some(reader);
        self
    }

    pub fn with_display(mut self, display: Box<dyn SensorDisplay>) -> Self {
        self.display = display;
        self
    }

    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    /// How long the vehicle may stay silent before the link counts as down.
    pub fn with_telemetry_timeout(mut self, timeout: Duration) -> Self {
        self.telemetry_timeout = timeout;
        self
    }

    pub fn board(&self) -> &SensorBoard {
        &self.board
    }

    pub fn link(&self) -> &SerialLink<W> {
        &self.link
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Flag shared with whoever needs to stop `run` from another thread.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Serial link up, controller input live, and (with a telemetry reader
    /// attached) a reading accepted within the telemetry timeout.
    pub fn systems_ready(&self) -> bool {
        let telemetry_fresh = self.telemetry.is_none() || !self.board.is_stale(self.telemetry_timeout);
        self.link.is_open() && self.state.health() == SamplerHealth::Running && telemetry_fresh
    }

    pub fn tick(&mut self) -> TickReport {
        self.ticks += 1;

        let snapshot = self.state.snapshot();
        let (mode, command) = self.mixer.mix_snapshot(&snapshot);
        if mode != self.last_mode {
            info!("[CONSOLE] mode {:?} -> {:?}", self.last_mode, mode);
            self.last_mode = mode;
        }

        let sent = match self.link.send_command(&command) {
            Ok(()) => true,
            Err(e) => {
                warn!("[CONSOLE] command dropped: {}", e);
                false
            }
        };
        debug!("[CONSOLE] tick {} {:?} {:?} sent={}", self.ticks, mode, command.pwm, sent);

        let telemetry_updates = self.drain_telemetry();

        TickReport { mode, command, sent, telemetry_updates }
    }

    fn drain_telemetry(&mut self) -> usize {
        let Some(reader) = self.telemetry.as_mut() else {
            return 0;
        };

        let lines = match reader.poll_lines() {
            Ok(lines) => lines,
            Err(e) => {
                warn!("[CONSOLE] telemetry read failed: {}", e);
                return 0;
            }
        };

        let mut updates = 0;
        for line in lines {
            match self.board.update(&line) {
                Ok(reading) => {
                    self.display.show(&reading);
                    updates += 1;
                }
                Err(e) => warn!("[CONSOLE] telemetry line discarded: {}", e),
            }
        }
        updates
    }

    /// Ticks at the configured period until shut down, then parks every
    /// thruster at neutral.
    pub fn run(&mut self) {
        info!("[CONSOLE] control loop running every {:?}", self.tick_period);

        while self.running.load(Ordering::SeqCst) {
            let started = Instant::now();
            self.tick();
            let elapsed = started.elapsed();
            if elapsed < self.tick_period {
                thread::sleep(self.tick_period - elapsed);
            }
        }

        info!("[CONSOLE] stopping thrusters...");
        if let Err(e) = self.link.send_command(&ThrusterCommand::neutral()) {
            warn!("[CONSOLE] could not send neutral command: {}", e);
        }
        info!("[CONSOLE] shutdown complete");
    }
}
