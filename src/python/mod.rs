use pyo3::prelude::*;
use pyo3::exceptions::PyValueError;

use crate::input::ControllerState;
use crate::rov::thrust_mixer::{ControlMode, MixerConfig, ThrustMixer};
use crate::telemetry;
use crate::uart::protocol::{FrameFormat, ThrusterCommand, THRUSTER_COUNT};

#[pyclass(name = "CommandMixer")]
pub struct PyCommandMixer{
    inner: ThrustMixer,
}

#[pymethods]
impl PyCommandMixer{
    #[new]
    #[pyo3(signature = (dead_zone = 0.1, gain = 1.0))]
    fn new(dead_zone: f32, gain: f32) -> Self{
        PyCommandMixer{
            inner: ThrustMixer::new(MixerConfig{ dead_zone, gain, ..Default::default() }),
        }
    }

    /// Returns (mode name, [fwd1, fwd2, left, right, dive1, dive2]).
    fn mix(&self, right_x: f32, right_y: f32, left_y: f32) -> (String, Vec<i32>){
        let state = ControllerState{
            right_joystick_x: right_x,
            right_joystick_y: right_y,
            left_joystick_y: left_y,
            ..Default::default()
        };
        let (mode, cmd) = self.inner.mix(&state);
        let name = match mode{
            ControlMode::Neutral => "neutral",
            ControlMode::Surge => "surge",
            ControlMode::Sway => "sway",
            ControlMode::Heave => "heave",
        };
        (name.to_string(), cmd.pwm.to_vec())
    }

    fn dead_zone(&self) -> f32{
        self.inner.config.dead_zone
    }

    fn gain(&self) -> f32{
        self.inner.config.gain
    }
}

/// Parses a telemetry line into (ph, temperature, pressure, level).
#[pyfunction]
fn parse_telemetry(line: &[u8]) -> PyResult<(f32, f32, f32, u32)>{
    match telemetry::parse(line){
        Ok(r) => Ok((r.ph, r.temperature, r.pressure, r.level)),
        Err(e) => Err(PyValueError::new_err(e.to_string())),
    }
}

#[pyfunction]
#[pyo3(signature = (pwm, checked = true))]
fn encode_command(pwm: Vec<i32>, checked: bool) -> PyResult<Vec<u8>>{
    let values: [i32; THRUSTER_COUNT] = pwm.try_into().map_err(|v: Vec<i32>|{
        PyValueError::new_err(format!("Expected {} setpoints, got {}", THRUSTER_COUNT, v.len()))
    })?;
    let format = if checked { FrameFormat::Checked } else { FrameFormat::Legacy };
    Ok(ThrusterCommand::new(values).encode(format))
}

#[pymodule]
fn rov_console(_py: Python, m: &PyModule) -> PyResult<()>{
    m.add_class::<PyCommandMixer>()?;
    m.add_function(wrap_pyfunction!(parse_telemetry, m)?)?;
    m.add_function(wrap_pyfunction!(encode_command, m)?)?;
    Ok(())
}
