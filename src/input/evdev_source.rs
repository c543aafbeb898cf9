use std::io::{self, Error, ErrorKind};
use std::os::fd::AsRawFd;
use std::path::PathBuf;
use std::time::Duration;

use evdev::{Device, EventType, KeyCode};
use log::{debug, info};

use super::{EventKind, EventSource, RawEvent};

const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(50);

/// Gamepad read through the Linux evdev interface.
pub struct EvdevSource{
    device: Device,
    path: PathBuf,
    poll_timeout: Duration,
}

impl EvdevSource{
    /// Opens the best gamepad-like device. With `preferred_name`, a device
    /// whose name contains it (case insensitive) wins.
    pub fn open(preferred_name: Option<&str>) -> io::Result<Self>{
        let (path, device) = discover_device(preferred_name)?;
        info!(
            "[INPUT] opened gamepad '{}' at {:?}",
            device.name().unwrap_or("unknown device"),
            path
        );
        Ok(EvdevSource{ device, path, poll_timeout: DEFAULT_POLL_TIMEOUT })
    }

    pub fn open_path(path: PathBuf) -> io::Result<Self>{
        let device = Device::open(&path)?;
        Ok(EvdevSource{ device, path, poll_timeout: DEFAULT_POLL_TIMEOUT })
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self{
        self.poll_timeout = timeout;
        self
    }

    pub fn path(&self) -> &PathBuf{
        &self.path
    }

    //fetch_events blocks indefinitely; wait on the fd first so the sampler
    //gets control back to check its stop flag
    fn wait_readable(&self) -> io::Result<bool>{
        let mut fds = libc::pollfd{
            fd: self.device.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let timeout_ms = self.poll_timeout.as_millis().min(i32::MAX as u128) as libc::c_int;

        let rc = unsafe{ libc::poll(&mut fds, 1, timeout_ms) };
        if rc < 0{
            let err = Error::last_os_error();
            if err.kind() == ErrorKind::Interrupted{
                return Ok(false);
            }
            return Err(err);
        }
        Ok(rc > 0)
    }
}

impl EventSource for EvdevSource{
    fn poll(&mut self) -> io::Result<Vec<RawEvent>>{
        if !self.wait_readable()?{
            return Ok(Vec::new());
        }

        let events = self.device.fetch_events()?
            .filter_map(|ev|{
                let kind = match ev.event_type(){
                    EventType::ABSOLUTE => EventKind::Absolute,
                    EventType::KEY => EventKind::Key,
                    _ => return None,
                };
                Some(RawEvent::new(kind, ev.code(), ev.value()))
            })
            .collect();
        Ok(events)
    }
}

fn discover_device(preferred_name: Option<&str>) -> io::Result<(PathBuf, Device)>{
    let mut best: Option<(i32, PathBuf, Device)> = None;
    for (path, device) in evdev::enumerate(){
        let score = score_device(&device, preferred_name);
        debug!("[INPUT] candidate {:?} '{}' score {}", path, device.name().unwrap_or("?"), score);
        if score <= 0{
            continue;
        }
        match &mut best{
            Some((best_score, _, _)) if score <= *best_score => {}
            _ => best = Some((score, path, device)),
        }
    }

    best.map(|(_, path, device)| (path, device))
        .ok_or_else(|| Error::new(ErrorKind::NotFound, "no gamepad device found"))
}

fn score_device(device: &Device, preferred_name: Option<&str>) -> i32{
    if !device.supported_events().contains(EventType::ABSOLUTE){
        return 0;
    }

    let mut score = 10;
    if let Some(keys) = device.supported_keys(){
        if keys.contains(KeyCode::BTN_SOUTH){
            score += 20;
        }
        if keys.contains(KeyCode::BTN_TRIGGER_HAPPY1){
            score += 5;
        }
    }

    if let Some(name) = device.name(){
        let lower = name.to_lowercase();
        if lower.contains("pad") || lower.contains("controller") || lower.contains("xbox"){
            score += 10;
        }
        if let Some(pref) = preferred_name{
            if lower.contains(&pref.to_lowercase()){
                score += 100;
            }
        }
    }
    score
}
