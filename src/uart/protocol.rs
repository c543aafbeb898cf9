/**
 * Thruster command line protocol
 *
 * Six setpoints, each written as exactly four ASCII digits, then an
 * optional two-digit hex checksum, then the '/' terminator. No newline.
 *
 *   Checked: [F1][F2][L][R][D1][D2][CK]/   27 bytes
 *   Legacy:  [F1][F2][L][R][D1][D2]/       25 bytes
 */

use thiserror::Error;

pub const NEUTRAL_PWM: i32 = 1500;
pub const PWM_MIN: i32 = 1100;
pub const PWM_MAX: i32 = 1900;

pub const THRUSTER_COUNT: usize = 6;
pub const FIELD_WIDTH: usize = 4;
pub const FRAME_TERMINATOR: u8 = b'/';

pub const PAYLOAD_SIZE: usize = THRUSTER_COUNT * FIELD_WIDTH; //24 digits
pub const CHECKED_FRAME_SIZE: usize = PAYLOAD_SIZE + 2 + 1;
pub const LEGACY_FRAME_SIZE: usize = PAYLOAD_SIZE + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameFormat{
    #[default]
    Checked,
    Legacy,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError{
    #[error("frame length {0} matches no known format")]
    BadLength(usize),
    #[error("frame is not terminated by '/'")]
    MissingTerminator,
    #[error("non-digit byte 0x{byte:02X} at offset {offset}")]
    BadDigit{ offset: usize, byte: u8 },
    #[error("checksum mismatch: frame says {expected:02X}, payload sums to {actual:02X}")]
    Checksum{ expected: u8, actual: u8 },
}

/// Setpoints for the six thrusters, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrusterCommand{
    pub pwm: [i32; THRUSTER_COUNT], //fwd1, fwd2, left, right, dive1, dive2 (µs)
}

impl Default for ThrusterCommand{
    fn default() -> Self{
        Self::neutral()
    }
}

impl ThrusterCommand{
    pub const fn neutral() -> Self{
        ThrusterCommand{ pwm: [NEUTRAL_PWM; THRUSTER_COUNT] }
    }

    /// Builds a command, clamping every setpoint into the PWM window so
    /// each field fits the four-digit wire width.
    pub fn new(pwm_values: [i32; THRUSTER_COUNT]) -> Self{
        ThrusterCommand{ pwm: pwm_values.map(|v| v.clamp(PWM_MIN, PWM_MAX)) }
    }

    pub fn fwd1(&self) -> i32{ self.pwm[0] }
    pub fn fwd2(&self) -> i32{ self.pwm[1] }
    pub fn left(&self) -> i32{ self.pwm[2] }
    pub fn right(&self) -> i32{ self.pwm[3] }
    pub fn dive1(&self) -> i32{ self.pwm[4] }
    pub fn dive2(&self) -> i32{ self.pwm[5] }

    pub fn is_neutral(&self) -> bool{
        self.pwm.iter().all(|&v| v == NEUTRAL_PWM)
    }

    pub fn encode(&self, format: FrameFormat) -> Vec<u8>{
        let mut frame = Vec::with_capacity(CHECKED_FRAME_SIZE);
        for value in self.pwm{
            //new() keeps values in range, but a hand-built struct may not
            let value = value.clamp(PWM_MIN, PWM_MAX);
            frame.extend_from_slice(format!("{:04}", value).as_bytes());
        }

        if format == FrameFormat::Checked{
            let checksum = calculate_checksum(&frame);
            frame.extend_from_slice(format!("{:02X}", checksum).as_bytes());
        }

        frame.push(FRAME_TERMINATOR);
        frame
    }

    /// Decodes either frame format, picking it by length.
    pub fn decode(frame: &[u8]) -> Result<Self, FrameError>{
        let format = match frame.len(){
            CHECKED_FRAME_SIZE => FrameFormat::Checked,
            LEGACY_FRAME_SIZE => FrameFormat::Legacy,
            n => return Err(FrameError::BadLength(n)),
        };

        if frame[frame.len() - 1] != FRAME_TERMINATOR{
            return Err(FrameError::MissingTerminator);
        }

        let payload = &frame[..PAYLOAD_SIZE];
        let mut pwm = [0i32; THRUSTER_COUNT];
        for (i, field) in payload.chunks_exact(FIELD_WIDTH).enumerate(){
            pwm[i] = parse_field(field, i * FIELD_WIDTH)?;
        }

        if format == FrameFormat::Checked{
            let expected = parse_hex_byte(&frame[PAYLOAD_SIZE..PAYLOAD_SIZE + 2], PAYLOAD_SIZE)?;
            let actual = calculate_checksum(payload);
            if expected != actual{
                return Err(FrameError::Checksum{ expected, actual });
            }
        }

        Ok(ThrusterCommand{ pwm })
    }
}

pub fn calculate_checksum(data: &[u8]) -> u8{
    data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

fn parse_field(field: &[u8], offset: usize) -> Result<i32, FrameError>{
    let mut value = 0i32;
    for (i, &byte) in field.iter().enumerate(){
        if !byte.is_ascii_digit(){
            return Err(FrameError::BadDigit{ offset: offset + i, byte });
        }
        value = value * 10 + i32::from(byte - b'0');
    }
    Ok(value)
}

fn parse_hex_byte(digits: &[u8], offset: usize) -> Result<u8, FrameError>{
    let mut value = 0u8;
    for (i, &byte) in digits.iter().enumerate(){
        let nibble = match byte{
            b'0'..=b'9' => byte - b'0',
            b'A'..=b'F' => byte - b'A' + 10,
            _ => return Err(FrameError::BadDigit{ offset: offset + i, byte }),
        };
        value = (value << 4) | nibble;
    }
    Ok(value)
}

#[cfg(test)]
mod tests{
    use super::*;

    #[test]
    fn test_neutral_legacy_frame_matches_old_concatenation(){
        let frame = ThrusterCommand::neutral().encode(FrameFormat::Legacy);
        assert_eq!(frame, b"150015001500150015001500/".to_vec());
    }

    #[test]
    fn test_checked_frame_layout(){
        let frame = ThrusterCommand::new([1300, 1300, 1500, 1500, 1500, 1500]).encode(FrameFormat::Checked);
        assert_eq!(frame.len(), CHECKED_FRAME_SIZE);
        assert_eq!(&frame[..PAYLOAD_SIZE], b"130013001500150015001500");
        let sum = calculate_checksum(b"130013001500150015001500");
        assert_eq!(&frame[PAYLOAD_SIZE..PAYLOAD_SIZE + 2], format!("{:02X}", sum).as_bytes());
        assert_eq!(frame[CHECKED_FRAME_SIZE - 1], b'/');
    }

    #[test]
    fn test_encoded_command_decodes_back(){
        let cmd = ThrusterCommand::new([1100, 1900, 1234, 1500, 1655, 1499]);
        assert_eq!(ThrusterCommand::decode(&cmd.encode(FrameFormat::Checked)), Ok(cmd));
        assert_eq!(ThrusterCommand::decode(&cmd.encode(FrameFormat::Legacy)), Ok(cmd));
    }

    #[test]
    fn test_out_of_range_values_keep_field_width(){
        let cmd = ThrusterCommand::new([-20, 99999, 1500, 1500, 0, 1500]);
        assert_eq!(cmd.pwm, [PWM_MIN, PWM_MAX, 1500, 1500, PWM_MIN, 1500]);

        let raw = ThrusterCommand{ pwm: [-5, 1500, 1500, 1500, 1500, 12000] };
        let frame = raw.encode(FrameFormat::Legacy);
        assert_eq!(frame.len(), LEGACY_FRAME_SIZE);
    }

    #[test]
    fn test_decode_rejects_corruption(){
        let mut frame = ThrusterCommand::new([1400, 1400, 1500, 1500, 1500, 1500]).encode(FrameFormat::Checked);
        frame[3] = b'1';
        assert!(matches!(ThrusterCommand::decode(&frame), Err(FrameError::Checksum{ .. })));

        frame[3] = b'x';
        assert_eq!(
            ThrusterCommand::decode(&frame),
            Err(FrameError::BadDigit{ offset: 3, byte: b'x' })
        );

        assert_eq!(ThrusterCommand::decode(b"1500/"), Err(FrameError::BadLength(5)));

        let mut unterminated = ThrusterCommand::neutral().encode(FrameFormat::Legacy);
        unterminated[LEGACY_FRAME_SIZE - 1] = b'\n';
        assert_eq!(ThrusterCommand::decode(&unterminated), Err(FrameError::MissingTerminator));
    }
}
