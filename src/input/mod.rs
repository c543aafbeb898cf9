/**
 * Input Sampler
 *
 * Polls a gamepad on its own thread and keeps the latest normalized value of
 * every axis and button in a shared, lock-protected ControllerState.
 * The control tick reads it through snapshot(), one consistent copy per tick.
 */

#[cfg(all(feature = "gamepad", target_os = "linux"))]
pub mod evdev_source;

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, trace};

use crate::error::{ConsoleError, Result};

pub const JOYSTICK_SCALE: f32 = 200.0;
pub const TRIGGER_SCALE: f32 = 400.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind{
    Absolute,
    Key,
}

/// One hardware event as read from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent{
    pub kind: EventKind,
    pub code: u16,
    pub value: i32,
}

impl RawEvent{
    pub fn new(kind: EventKind, code: u16, value: i32) -> Self{
        RawEvent{ kind, code, value }
    }

    /// Builds an event from its Linux input name, e.g. `"ABS_RY"`.
    pub fn named(name: &str, value: i32) -> Option<Self>{
        CODE_TABLE.iter()
            .find(|entry| entry.name == name)
            .map(|entry| RawEvent::new(entry.kind, entry.code, value))
    }

    pub fn field(&self) -> Option<ControllerField>{
        lookup(self.kind, self.code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerField{
    LeftJoystickX,
    LeftJoystickY,
    RightJoystickX,
    RightJoystickY,
    LeftTrigger,
    RightTrigger,
    LeftBumper,
    RightBumper,
    A,
    B,
    X,
    Y,
    LeftThumb,
    RightThumb,
    Back,
    Start,
    LeftDPad,
    RightDPad,
    UpDPad,
    DownDPad,
}

struct CodeEntry{
    kind: EventKind,
    code: u16,
    name: &'static str,
    field: ControllerField,
}

const fn abs(code: u16, name: &'static str, field: ControllerField) -> CodeEntry{
    CodeEntry{ kind: EventKind::Absolute, code, name, field }
}

const fn key(code: u16, name: &'static str, field: ControllerField) -> CodeEntry{
    CodeEntry{ kind: EventKind::Key, code, name, field }
}

//codes from linux/input-event-codes.h
const CODE_TABLE: &[CodeEntry] = &[
    abs(0x01, "ABS_Y", ControllerField::LeftJoystickY),
    abs(0x00, "ABS_X", ControllerField::LeftJoystickX),
    abs(0x04, "ABS_RY", ControllerField::RightJoystickY),
    abs(0x03, "ABS_RX", ControllerField::RightJoystickX),
    abs(0x02, "ABS_Z", ControllerField::LeftTrigger),
    abs(0x05, "ABS_RZ", ControllerField::RightTrigger),
    key(0x136, "BTN_TL", ControllerField::LeftBumper),
    key(0x137, "BTN_TR", ControllerField::RightBumper),
    key(0x130, "BTN_SOUTH", ControllerField::A),
    key(0x133, "BTN_NORTH", ControllerField::Y),
    key(0x134, "BTN_WEST", ControllerField::X),
    key(0x131, "BTN_EAST", ControllerField::B),
    key(0x13d, "BTN_THUMBL", ControllerField::LeftThumb),
    key(0x13e, "BTN_THUMBR", ControllerField::RightThumb),
    key(0x13a, "BTN_SELECT", ControllerField::Back),
    key(0x13b, "BTN_START", ControllerField::Start),
    key(0x2c0, "BTN_TRIGGER_HAPPY1", ControllerField::LeftDPad),
    key(0x2c1, "BTN_TRIGGER_HAPPY2", ControllerField::RightDPad),
    key(0x2c2, "BTN_TRIGGER_HAPPY3", ControllerField::UpDPad),
    key(0x2c3, "BTN_TRIGGER_HAPPY4", ControllerField::DownDPad),
];

pub fn lookup(kind: EventKind, code: u16) -> Option<ControllerField>{
    CODE_TABLE.iter()
        .find(|entry| entry.kind == kind && entry.code == code)
        .map(|entry| entry.field)
}

pub fn normalize(raw: i32, scale: f32) -> f32{
    raw as f32 / scale
}

/// Latest normalized controller values. Joysticks in [-1, 1], triggers in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControllerState{
    pub left_joystick_x: f32,
    pub left_joystick_y: f32,
    pub right_joystick_x: f32,
    pub right_joystick_y: f32,
    pub left_trigger: f32,
    pub right_trigger: f32,
    pub left_bumper: bool,
    pub right_bumper: bool,
    pub a: bool,
    pub b: bool,
    pub x: bool,
    pub y: bool,
    pub left_thumb: bool,
    pub right_thumb: bool,
    pub back: bool,
    pub start: bool,
    pub left_dpad: bool,
    pub right_dpad: bool,
    pub up_dpad: bool,
    pub down_dpad: bool,
}

impl ControllerState{
    /// Applies one event. Returns false for codes outside the table.
    pub fn apply(&mut self, event: &RawEvent, config: &SamplerConfig) -> bool{
        let Some(field) = event.field() else{
            return false;
        };

        let stick = || normalize(event.value, config.joystick_scale).clamp(-1.0, 1.0);
        let trigger = || normalize(event.value, config.trigger_scale).clamp(0.0, 1.0);
        let pressed = event.value != 0;

        match field{
            ControllerField::LeftJoystickX => self.left_joystick_x = stick(),
            ControllerField::LeftJoystickY => self.left_joystick_y = stick(),
            ControllerField::RightJoystickX => self.right_joystick_x = stick(),
            ControllerField::RightJoystickY => self.right_joystick_y = stick(),
            ControllerField::LeftTrigger => self.left_trigger = trigger(),
            ControllerField::RightTrigger => self.right_trigger = trigger(),
            ControllerField::LeftBumper => self.left_bumper = pressed,
            ControllerField::RightBumper => self.right_bumper = pressed,
            ControllerField::A => self.a = pressed,
            ControllerField::B => self.b = pressed,
            ControllerField::X => self.x = pressed,
            ControllerField::Y => self.y = pressed,
            ControllerField::LeftThumb => self.left_thumb = pressed,
            ControllerField::RightThumb => self.right_thumb = pressed,
            ControllerField::Back => self.back = pressed,
            ControllerField::Start => self.start = pressed,
            ControllerField::LeftDPad => self.left_dpad = pressed,
            ControllerField::RightDPad => self.right_dpad = pressed,
            ControllerField::UpDPad => self.up_dpad = pressed,
            ControllerField::DownDPad => self.down_dpad = pressed,
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerHealth{
    Idle,
    Running,
    Stopped,
    DeviceLost,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerSnapshot{
    pub state: ControllerState,
    pub seq: u64, //number of batches applied so far
    pub health: SamplerHealth,
}

#[derive(Debug, Clone)]
pub struct SamplerConfig{
    pub joystick_scale: f32,
    pub trigger_scale: f32,
}

impl Default for SamplerConfig{
    fn default() -> Self{
        SamplerConfig{
            joystick_scale: JOYSTICK_SCALE,
            trigger_scale: TRIGGER_SCALE,
        }
    }
}

struct SharedInner{
    state: ControllerState,
    seq: u64,
    health: SamplerHealth,
}

/// ControllerState shared between the sampler (sole writer) and the mixer.
#[derive(Clone)]
pub struct SharedControllerState{
    inner: Arc<RwLock<SharedInner>>,
}

impl Default for SharedControllerState{
    fn default() -> Self{
        Self::new()
    }
}

impl SharedControllerState{
    pub fn new() -> Self{
        SharedControllerState{
            inner: Arc::new(RwLock::new(SharedInner{
                state: ControllerState::default(),
                seq: 0,
                health: SamplerHealth::Idle,
            })),
        }
    }

    pub fn snapshot(&self) -> ControllerSnapshot{
        let inner = self.read();
        ControllerSnapshot{
            state: inner.state,
            seq: inner.seq,
            health: inner.health,
        }
    }

    pub fn health(&self) -> SamplerHealth{
        self.read().health
    }

    /// Applies a whole batch under one write lock. Returns how many events
    /// matched the code table.
    pub fn apply_batch(&self, events: &[RawEvent], config: &SamplerConfig) -> usize{
        let mut inner = self.write();
        let applied = events.iter()
            .filter(|event| inner.state.apply(event, config))
            .count();
        inner.seq += 1;
        applied
    }

    pub(crate) fn set_health(&self, health: SamplerHealth){
        self.write().health = health;
    }

    /// Device gone: back to neutral so nothing keeps driving on old input.
    pub(crate) fn mark_lost(&self){
        let mut inner = self.write();
        inner.state = ControllerState::default();
        inner.health = SamplerHealth::DeviceLost;
    }

    fn read(&self) -> RwLockReadGuard<'_, SharedInner>{
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SharedInner>{
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Anything that yields batches of raw input events.
///
/// `poll` may block, but must return (possibly with an empty batch) often
/// enough for the sampler to notice a stop request.
pub trait EventSource: Send{
    fn poll(&mut self) -> io::Result<Vec<RawEvent>>;
}

/// Replays fixed batches, then reports idle. Used by tests and demos.
pub struct ScriptedSource{
    batches: VecDeque<io::Result<Vec<RawEvent>>>,
    idle: Duration,
}

impl ScriptedSource{
    pub fn new(batches: Vec<Vec<RawEvent>>) -> Self{
        ScriptedSource{
            batches: batches.into_iter().map(Ok).collect(),
            idle: Duration::from_millis(1),
        }
    }

    /// Appends a device failure after the scripted batches.
    pub fn then_fail(mut self, kind: io::ErrorKind) -> Self{
        self.batches.push_back(Err(io::Error::new(kind, "scripted device failure")));
        self
    }
}

impl EventSource for ScriptedSource{
    fn poll(&mut self) -> io::Result<Vec<RawEvent>>{
        match self.batches.pop_front(){
            Some(batch) => batch,
            None =>{
                thread::sleep(self.idle);
                Ok(Vec::new())
            }
        }
    }
}

pub struct InputSampler<S: EventSource>{
    source: S,
    config: SamplerConfig,
    state: SharedControllerState,
}

impl<S: EventSource + 'static> InputSampler<S>{
    pub fn new(source: S, state: SharedControllerState) -> Self{
        InputSampler{
            source,
            config: SamplerConfig::default(),
            state,
        }
    }

    pub fn with_config(mut self, config: SamplerConfig) -> Self{
        self.config = config;
        self
    }

    pub fn start(self) -> SamplerHandle{
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let state = self.state.clone();

        state.set_health(SamplerHealth::Running);
        let handle = thread::spawn(move ||{
            self.run_loop(&flag)
        });

        SamplerHandle{ handle: Some(handle), running, state }
    }

    fn run_loop(mut self, running: &AtomicBool) -> Result<()>{
        info!("[INPUT] sampler started");

        while running.load(Ordering::SeqCst){
            match self.source.poll(){
                Ok(events) if events.is_empty() => {}
                Ok(events) =>{
                    let applied = self.state.apply_batch(&events, &self.config);
                    trace!("[INPUT] batch of {} events, {} mapped", events.len(), applied);
                }
                Err(e) =>{
                    error!("[INPUT] device read failed, thrusters go neutral: {}", e);
                    self.state.mark_lost();
                    return Err(ConsoleError::DeviceRead(e));
                }
            }
        }

        self.state.set_health(SamplerHealth::Stopped);
        info!("[INPUT] sampler stopped");
        Ok(())
    }
}

/// Owner's side of a running sampler thread.
pub struct SamplerHandle{
    handle: Option<JoinHandle<Result<()>>>,
    running: Arc<AtomicBool>,
    state: SharedControllerState,
}

impl SamplerHandle{
    pub fn state(&self) -> &SharedControllerState{
        &self.state
    }

    pub fn is_finished(&self) -> bool{
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Asks the loop to exit after its current poll.
    pub fn stop(&self){
        self.running.store(false, Ordering::SeqCst);
    }

    /// Stops the loop and waits for it. Returns the device error if the
    /// sampler died on one.
    pub fn join(mut self) -> Result<()>{
        self.stop();
        self.join_inner()
    }

    fn join_inner(&mut self) -> Result<()>{
        match self.handle.take(){
            Some(handle) => match handle.join(){
                Ok(result) => result,
                Err(_) =>{
                    error!("[INPUT] sampler thread panicked");
                    self.state.mark_lost();
                    Err(ConsoleError::DeviceRead(io::Error::other("sampler thread panicked")))
                }
            },
            None => Ok(()),
        }
    }
}

impl Drop for SamplerHandle{
    fn drop(&mut self){
        self.stop();
        if let Err(e) = self.join_inner(){
            debug!("[INPUT] sampler ended with error: {}", e);
        }
    }
}

#[cfg(test)]
mod tests{
    use super::*;
    use std::sync::Barrier;
    use std::time::Instant;

    fn ev(name: &str, value: i32) -> RawEvent{
        RawEvent::named(name, value).unwrap()
    }

    fn wait_until(mut cond: impl FnMut() -> bool){
        let deadline = Instant::now() + Duration::from_secs(2);
        while !cond(){
            assert!(Instant::now() < deadline, "timed out waiting for sampler");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_code_table_names_and_numbers_agree(){
        assert_eq!(lookup(EventKind::Absolute, 0x04), Some(ControllerField::RightJoystickY));
        assert_eq!(ev("ABS_RY", 0).code, 0x04);
        assert_eq!(ev("BTN_TRIGGER_HAPPY3", 1).field(), Some(ControllerField::UpDPad));
        assert!(RawEvent::named("ABS_HAT0X", 1).is_none());
        assert_eq!(lookup(EventKind::Key, 0x04), None);
    }

    #[test]
    fn test_normalize_is_linear_and_sign_preserving(){
        for raw in [0, 1, 37, 100, 200]{
            assert_eq!(normalize(raw, JOYSTICK_SCALE), raw as f32 / 200.0);
            assert_eq!(normalize(-raw, JOYSTICK_SCALE), -normalize(raw, JOYSTICK_SCALE));
        }
        assert_eq!(normalize(200, TRIGGER_SCALE), 0.5);
    }

    #[test]
    fn test_apply_scales_and_clamps(){
        let config = SamplerConfig::default();
        let mut state = ControllerState::default();

        assert!(state.apply(&ev("ABS_RY", 100), &config));
        assert_eq!(state.right_joystick_y, 0.5);

        state.apply(&ev("ABS_X", -900), &config);
        assert_eq!(state.left_joystick_x, -1.0);

        state.apply(&ev("ABS_RZ", 200), &config);
        assert_eq!(state.right_trigger, 0.5);
        state.apply(&ev("ABS_Z", -50), &config);
        assert_eq!(state.left_trigger, 0.0);

        state.apply(&ev("BTN_SOUTH", 1), &config);
        state.apply(&ev("BTN_NORTH", 1), &config);
        assert!(state.a && state.y && !state.x);
        state.apply(&ev("BTN_SOUTH", 0), &config);
        assert!(!state.a);
    }

    #[test]
    fn test_unknown_codes_are_ignored(){
        let config = SamplerConfig::default();
        let mut state = ControllerState::default();
        assert!(!state.apply(&RawEvent::new(EventKind::Absolute, 0x10, 55), &config));
        assert!(!state.apply(&RawEvent::new(EventKind::Key, 0x1ff, 1), &config));
        assert_eq!(state, ControllerState::default());
    }

    #[test]
    fn test_sampler_applies_batches_and_stops(){
        let shared = SharedControllerState::new();
        assert_eq!(shared.health(), SamplerHealth::Idle);

        let source = ScriptedSource::new(vec![
            vec![ev("ABS_RX", 40), ev("ABS_Y", -20)],
            vec![ev("BTN_START", 1)],
        ]);
        let sampler = InputSampler::new(source, shared.clone()).start();

        wait_until(|| shared.snapshot().seq == 2);
        let snap = shared.snapshot();
        assert_eq!(snap.health, SamplerHealth::Running);
        assert_eq!(snap.state.right_joystick_x, 0.2);
        assert_eq!(snap.state.left_joystick_y, -0.1);
        assert!(snap.state.start);

        assert!(sampler.join().is_ok());
        assert_eq!(shared.health(), SamplerHealth::Stopped);
    }

    #[test]
    fn test_device_failure_goes_neutral(){
        let shared = SharedControllerState::new();
        let source = ScriptedSource::new(vec![vec![ev("ABS_RY", 150)]])
            .then_fail(io::ErrorKind::NotFound);
        let sampler = InputSampler::new(source, shared.clone()).start();

        wait_until(|| sampler.is_finished());
        let snap = shared.snapshot();
        assert_eq!(snap.health, SamplerHealth::DeviceLost);
        assert_eq!(snap.state, ControllerState::default());
        assert!(matches!(sampler.join(), Err(ConsoleError::DeviceRead(_))));
    }

    #[test]
    fn test_snapshots_are_never_torn(){
        //every batch moves all six axes to the same value
        let batches: Vec<Vec<RawEvent>> = (1..=100).map(|i|{
            let stick = i * 2;
            let trig = i * 4;
            vec![
                ev("ABS_X", stick), ev("ABS_Y", stick),
                ev("ABS_RX", stick), ev("ABS_RY", stick),
                ev("ABS_Z", trig), ev("ABS_RZ", trig),
            ]
        }).collect();

        let shared = SharedControllerState::new();
        let barrier = Arc::new(Barrier::new(2));

        //writer may run at most one batch ahead of the reader
        let writer_state = shared.clone();
        let writer_barrier = Arc::clone(&barrier);
        let writer = thread::spawn(move ||{
            let config = SamplerConfig::default();
            for batch in &batches{
                writer_state.apply_batch(batch, &config);
                writer_barrier.wait();
            }
        });

        let mut seqs = Vec::with_capacity(100);
        for _ in 0..100{
            barrier.wait();
            let snap = shared.snapshot();
            let s = snap.state;
            let axes = [
                s.left_joystick_x, s.left_joystick_y,
                s.right_joystick_x, s.right_joystick_y,
                s.left_trigger, s.right_trigger,
            ];
            assert!(axes.iter().all(|&a| a == axes[0]), "torn snapshot at seq {}: {:?}", snap.seq, axes);
            assert_eq!(axes[0], snap.seq as f32 / 100.0, "state does not match seq {}", snap.seq);
            seqs.push(snap.seq);
        }
        writer.join().unwrap();

        assert!(seqs.iter().any(|&seq| seq > 0 && seq < 100), "no read overlapped the writes: {:?}", seqs);
        assert!(seqs.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(shared.snapshot().seq, 100);
        assert_eq!(shared.snapshot().state.right_joystick_y, 1.0);
    }
}
