//! Binary Frame Format
//!
//! ```text
//! ┌──────┬───────┬─────┬─────────┬─────────┬──────┐
//! │ 0xAA │ FLAGS │ FAN │ TEMP_HI │ TEMP_LO │ 0x55 │
//! └──────┴───────┴─────┴─────────┴─────────┴──────┘
//! ```
//!
//! FLAGS bit 0 is the flame sensor, bits 1-7 carry the error code.
//! Temperature is big-endian °C.

use crate::error::ParseError;
use crate::reading::{SensorReading, FAN_MAX, TEMP_MAX};
use crate::Decoded;
use tracing::debug;

/// Start sentinel
pub const START_BYTE: u8 = 0xAA;
/// End sentinel
pub const END_BYTE: u8 = 0x55;
/// Fixed frame length
pub const FRAME_SIZE: usize = 6;

/// Raw field view of a binary frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryFrame {
    pub flags: u8,
    pub fan_speed: u8,
    pub temperature: u16,
}

impl BinaryFrame {
    /// Build a frame from reading values (used by simulators and tests)
    pub fn new(flame: bool, error_code: u8, fan_speed: u8, temperature: u16) -> Self {
        Self {
            flags: (error_code << 1) | u8::from(flame),
            fan_speed,
            temperature,
        }
    }

    /// Wire representation
    pub fn to_bytes(&self) -> [u8; FRAME_SIZE] {
        let [hi, lo] = self.temperature.to_be_bytes();
        [START_BYTE, self.flags, self.fan_speed, hi, lo, END_BYTE]
    }

    /// Validate fields and promote to a reading
    pub fn to_reading(&self) -> Result<SensorReading, ParseError> {
        if self.fan_speed > FAN_MAX {
            return Err(ParseError::OutOfRange {
                field: "fan_speed",
                value: i32::from(self.fan_speed),
                min: 0,
                max: i32::from(FAN_MAX),
            });
        }
        if self.temperature > TEMP_MAX as u16 {
            return Err(ParseError::OutOfRange {
                field: "temperature",
                value: i32::from(self.temperature),
                min: 0,
                max: i32::from(TEMP_MAX),
            });
        }

        Ok(SensorReading {
            flame_detected: self.flags & 0x01 != 0,
            fan_speed: self.fan_speed,
            temperature: self.temperature as i16,
            error_code: (self.flags >> 1) & 0x7F,
            valid: true,
        })
    }
}

/// Find the first acceptable binary frame in `buffer`.
///
/// Every start offset is examined so leading garbage or a corrupted frame
/// does not hide a good one further along.
pub(crate) fn scan(buffer: &[u8]) -> Result<Decoded, ParseError> {
    if buffer.len() < FRAME_SIZE {
        return Err(ParseError::TooShort {
            len: buffer.len(),
            min: FRAME_SIZE,
        });
    }

    let mut last_err = ParseError::NoFrame;

    for start in 0..=buffer.len() - FRAME_SIZE {
        let Some(frame) = candidate(buffer, start) else {
            continue;
        };

        match frame.to_reading() {
            Ok(reading) => {
                return Ok(Decoded {
                    reading,
                    consumed: start + FRAME_SIZE,
                })
            }
            Err(e) => {
                debug!(offset = start, error = %e, "rejecting binary frame candidate");
                last_err = e;
            }
        }
    }

    Err(last_err)
}

/// Sentinel-delimited frame at `start`, if the sentinels match
fn candidate(buffer: &[u8], start: usize) -> Option<BinaryFrame> {
    let bytes = buffer.get(start..start + FRAME_SIZE)?;
    if bytes[0] != START_BYTE || bytes[FRAME_SIZE - 1] != END_BYTE {
        return None;
    }
    Some(BinaryFrame {
        flags: bytes[1],
        fan_speed: bytes[2],
        temperature: u16::from_be_bytes([bytes[3], bytes[4]]),
    })
}

/// Number of well-delimited frames in `buffer` that fail validation
pub(crate) fn count_rejected(buffer: &[u8]) -> usize {
    (0..buffer.len().saturating_sub(FRAME_SIZE - 1))
        .filter_map(|start| candidate(buffer, start))
        .filter(|frame| frame.to_reading().is_err())
        .count()
}

/// Parse only the binary format
pub fn parse_binary(buffer: &[u8]) -> Result<SensorReading, ParseError> {
    scan(buffer).map(|d| d.reading)
}
