/**
 * Sensor telemetry
 *
 * The vehicle reports one line per sample:  pH/temperature/pressure/level/\n
 * e.g. "7.20/25.50/101.30/80/"
 */

use std::time::{Duration, Instant};

use log::{debug, warn};
use thiserror::Error;

pub const TELEMETRY_DELIMITER: u8 = b'/';
pub const FIELD_COUNT: usize = 4;
pub const MAX_LINE_LEN: usize = 256;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorReading{
    pub ph: f32,
    pub temperature: f32, //°C
    pub pressure: f32,    //kPa
    pub level: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorField{
    Ph,
    Temperature,
    Pressure,
    Level,
}

impl SensorField{
    pub fn name(&self) -> &'static str{
        match self{
            SensorField::Ph => "pH",
            SensorField::Temperature => "temperature",
            SensorField::Pressure => "pressure",
            SensorField::Level => "level",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TelemetryParseError{
    #[error("telemetry line is not valid UTF-8")]
    NotUtf8,
    #[error("expected 4 '/' delimiters, found {found}")]
    MissingDelimiters{ found: usize },
    #[error("{} field {value:?} is not a number", .field.name())]
    InvalidField{ field: SensorField, value: String },
}

/// Decodes one telemetry line into a reading.
///
/// Trailing whitespace (CR, LF, spaces) is dropped before scanning. Anything
/// after the fourth delimiter is ignored.
pub fn parse(line: &[u8]) -> Result<SensorReading, TelemetryParseError>{
    let text = std::str::from_utf8(line).map_err(|_| TelemetryParseError::NotUtf8)?;
    let text = text.trim_end();

    let found = text.bytes().filter(|&b| b == TELEMETRY_DELIMITER).count();
    if found < FIELD_COUNT{
        return Err(TelemetryParseError::MissingDelimiters{ found });
    }

    let mut fields = text.split(TELEMETRY_DELIMITER as char);
    let mut raw = [""; FIELD_COUNT];
    for slot in raw.iter_mut(){
        //at least FIELD_COUNT delimiters means at least FIELD_COUNT + 1 pieces
        *slot = fields.next().unwrap_or_default().trim();
    }

    Ok(SensorReading{
        ph: parse_float(raw[0], SensorField::Ph)?,
        temperature: parse_float(raw[1], SensorField::Temperature)?,
        pressure: parse_float(raw[2], SensorField::Pressure)?,
        level: raw[3].parse().map_err(|_| invalid(raw[3], SensorField::Level))?,
    })
}

fn parse_float(value: &str, field: SensorField) -> Result<f32, TelemetryParseError>{
    match value.parse::<f32>(){
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(invalid(value, field)),
    }
}

fn invalid(value: &str, field: SensorField) -> TelemetryParseError{
    TelemetryParseError::InvalidField{ field, value: value.to_string() }
}

/// Collects serial bytes into complete '\n'-terminated lines.
#[derive(Debug, Default)]
pub struct LineAssembler{
    buffer: Vec<u8>,
    dropped: u64,
    //set after an overflow: the rest of that line is skipped up to its '\n'
    discarding: bool,
}

impl LineAssembler{
    pub fn new() -> Self{
        LineAssembler{
            buffer: Vec::with_capacity(MAX_LINE_LEN),
            dropped: 0,
            discarding: false,
        }
    }

    pub fn extend(&mut self, bytes: &[u8]){
        self.buffer.extend_from_slice(bytes);
    }

    /// Next complete line, without its '\n'.
    pub fn next_line(&mut self) -> Option<Vec<u8>>{
        loop{
            match self.buffer.iter().position(|&b| b == b'\n'){
                Some(pos) if self.discarding =>{
                    self.buffer.drain(..=pos);
                    self.discarding = false;
                }
                Some(pos) if pos > MAX_LINE_LEN =>{
                    self.buffer.drain(..=pos);
                    self.note_dropped();
                }
                Some(pos) =>{
                    let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
                    line.pop();
                    return Some(line);
                }
                None =>{
                    if self.discarding{
                        self.buffer.clear();
                    }else if self.buffer.len() > MAX_LINE_LEN{
                        //no newline in sight: a runaway partial line is noise
                        self.buffer.clear();
                        self.discarding = true;
                        self.note_dropped();
                    }
                    return None;
                }
            }
        }
    }

    pub fn pending(&self) -> usize{
        self.buffer.len()
    }

    pub fn dropped(&self) -> u64{
        self.dropped
    }

    fn note_dropped(&mut self){
        self.dropped += 1;
        warn!("[TELEMETRY] discarded line longer than {} bytes", MAX_LINE_LEN);
    }
}

/// Latest accepted reading, as shown on the console's numeric displays.
#[derive(Debug, Default)]
pub struct SensorBoard{
    latest: Option<SensorReading>,
    last_update: Option<Instant>,
    accepted: u64,
    rejected: u64,
}

impl SensorBoard{
    pub fn new() -> Self{
        Self::default()
    }

    /// Parses `line` and replaces the displayed reading. On error the
    /// previous reading stays.
    pub fn update(&mut self, line: &[u8]) -> Result<SensorReading, TelemetryParseError>{
        match parse(line){
            Ok(reading) =>{
                debug!("[TELEMETRY] {:?}", reading);
                self.latest = Some(reading);
                self.last_update = Some(Instant::now());
                self.accepted += 1;
                Ok(reading)
            }
            Err(e) =>{
                self.rejected += 1;
                Err(e)
            }
        }
    }

    pub fn latest(&self) -> Option<SensorReading>{
        self.latest
    }

    /// Time since the last accepted line.
    pub fn age(&self) -> Option<Duration>{
        self.last_update.map(|t| t.elapsed())
    }

    /// No accepted line yet, or none within `max_age`.
    pub fn is_stale(&self, max_age: Duration) -> bool{
        match self.age(){
            Some(age) => age > max_age,
            None => true,
        }
    }

    pub fn accepted(&self) -> u64{
        self.accepted
    }

    pub fn rejected(&self) -> u64{
        self.rejected
    }
}
