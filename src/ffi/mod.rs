use libc::{c_float, c_int, size_t};
use std::ptr;

use crate::input::ControllerState;
use crate::rov::thrust_mixer::{ControlMode, MixerConfig, ThrustMixer};
use crate::telemetry::{self, SensorReading};
use crate::uart::protocol::{FrameFormat, ThrusterCommand};

pub const ROV_OK: c_int = 1;
pub const ROV_ERR_NULL: c_int = -1;
pub const ROV_ERR_BUFFER: c_int = -2;
pub const ROV_ERR_PARSE: c_int = -3;

/// Stick values handed in by the GUI, already normalized.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct RovAxes{
    pub right_x: c_float,
    pub right_y: c_float,
    pub left_y: c_float,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct RovThrusterCommand{
    pub pwm: [c_int; 6], //fwd1, fwd2, left, right, dive1, dive2
    pub mode: c_int,     //0 neutral, 1 surge, 2 sway, 3 heave
}

fn mode_code(mode: ControlMode) -> c_int{
    match mode{
        ControlMode::Neutral => 0,
        ControlMode::Surge => 1,
        ControlMode::Sway => 2,
        ControlMode::Heave => 3,
    }
}

/// Parses one telemetry line. On error `out` is left untouched.
#[no_mangle]
pub unsafe extern "C" fn rov_parse_telemetry(
    line: *const u8,
    len: size_t,
    out: *mut SensorReading,
) -> c_int{
    if line.is_null() || out.is_null(){
        return ROV_ERR_NULL;
    }

    unsafe{
        let bytes = std::slice::from_raw_parts(line, len);
        match telemetry::parse(bytes){
            Ok(reading) =>{
                *out = reading;
                ROV_OK
            }
            Err(_) => ROV_ERR_PARSE,
        }
    }
}

/// Mixes stick values with the given dead zone and gain (1.0 is the
/// console default). Offsets round half away from zero.
#[no_mangle]
pub unsafe extern "C" fn rov_mix_axes(
    axes: *const RovAxes,
    dead_zone: c_float,
    gain: c_float,
    out: *mut RovThrusterCommand,
) -> c_int{
    if axes.is_null() || out.is_null(){
        return ROV_ERR_NULL;
    }

    unsafe{
        let a = &*axes;
        let state = ControllerState{
            right_joystick_x: a.right_x,
            right_joystick_y: a.right_y,
            left_joystick_y: a.left_y,
            ..Default::default()
        };
        let mixer = ThrustMixer::new(MixerConfig{ dead_zone, gain, ..Default::default() });
        let (mode, cmd) = mixer.mix(&state);
        *out = RovThrusterCommand{ pwm: cmd.pwm, mode: mode_code(mode) };
    }
    ROV_OK
}

/// Encodes a command frame. `checked` nonzero selects the checksummed format.
#[no_mangle]
pub unsafe extern "C" fn rov_encode_command(
    cmd: *const RovThrusterCommand,
    checked: c_int,
    out_data: *mut u8,
    out_len: *mut size_t,
    max_len: size_t,
) -> c_int{
    if cmd.is_null() || out_data.is_null() || out_len.is_null(){
        return ROV_ERR_NULL;
    }

    unsafe{
        let format = if checked != 0 { FrameFormat::Checked } else { FrameFormat::Legacy };
        let frame = ThrusterCommand::new((*cmd).pwm).encode(format);
        if frame.len() > max_len{
            return ROV_ERR_BUFFER;
        }
        ptr::copy_nonoverlapping(frame.as_ptr(), out_data, frame.len());
        *out_len = frame.len();
    }
    ROV_OK
}

#[no_mangle]
pub unsafe extern "C" fn rov_decode_command(
    data: *const u8,
    len: size_t,
    out: *mut RovThrusterCommand,
) -> c_int{
    if data.is_null() || out.is_null(){
        return ROV_ERR_NULL;
    }

    unsafe{
        let bytes = std::slice::from_raw_parts(data, len);
        match ThrusterCommand::decode(bytes){
            Ok(cmd) =>{
                (*out).pwm = cmd.pwm;
                ROV_OK
            }
            Err(_) => ROV_ERR_PARSE,
        }
    }
}

#[cfg(test)]
mod tests{
    use super::*;

    #[test]
    fn test_ffi_parse_telemetry(){
        let line = b"7.20/25.50/101.30/80/\n";
        let mut out = SensorReading::default();
        let rc = unsafe{ rov_parse_telemetry(line.as_ptr(), line.len(), &mut out) };
        assert_eq!(rc, ROV_OK);
        assert_eq!(out.level, 80);
        assert_eq!(out.ph, 7.20);
    }

    #[test]
    fn test_ffi_parse_failure_keeps_output(){
        let mut out = SensorReading{ ph: 6.5, temperature: 1.0, pressure: 2.0, level: 3 };
        let before = out;
        let line = b"6.9/20/";
        let rc = unsafe{ rov_parse_telemetry(line.as_ptr(), line.len(), &mut out) };
        assert_eq!(rc, ROV_ERR_PARSE);
        assert_eq!(out, before);

        let rc = unsafe{ rov_parse_telemetry(ptr::null(), 0, &mut out) };
        assert_eq!(rc, ROV_ERR_NULL);
    }

    #[test]
    fn test_ffi_mix_encode_decode(){
        let axes = RovAxes{ right_x: 0.0, right_y: 0.5, left_y: 0.05 };
        let mut cmd = RovThrusterCommand::default();

        unsafe{
            assert_eq!(rov_mix_axes(&axes, 0.1, 1.0, &mut cmd), ROV_OK);
            assert_eq!(cmd.mode, 1);
            assert_eq!(cmd.pwm, [1499, 1499, 1500, 1500, 1500, 1500]);

            assert_eq!(rov_mix_axes(&axes, 0.1, 400.0, &mut cmd), ROV_OK);
            assert_eq!(cmd.mode, 1);
            assert_eq!(cmd.pwm, [1300, 1300, 1500, 1500, 1500, 1500]);

            let mut buf = [0u8; 64];
            let mut len: size_t = 0;
            assert_eq!(rov_encode_command(&cmd, 1, buf.as_mut_ptr(), &mut len, buf.len()), ROV_OK);
            assert_eq!(len, 27);

            let mut decoded = RovThrusterCommand::default();
            assert_eq!(rov_decode_command(buf.as_ptr(), len, &mut decoded), ROV_OK);
            assert_eq!(decoded.pwm, cmd.pwm);

            let mut tiny = [0u8; 8];
            assert_eq!(
                rov_encode_command(&cmd, 0, tiny.as_mut_ptr(), &mut len, tiny.len()),
                ROV_ERR_BUFFER
            );
        }
    }
}
