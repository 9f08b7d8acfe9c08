//! Viking Bio Serial Protocol
//!
//! Decodes the burner's status stream into [`SensorReading`] records.
//! Two wire formats are supported: a 6-byte sentinel-delimited binary frame
//! and a newline-terminated ASCII line. Parsing is stateless; the
//! [`FrameAccumulator`] adds the streaming window on top.

mod accumulator;
mod binary;
mod error;
mod reading;
mod text;

pub use accumulator::{FrameAccumulator, WINDOW_SIZE};
pub use binary::{parse_binary, BinaryFrame};
pub use error::ParseError;
pub use reading::SensorReading;
pub use text::{parse_text, MAX_TEXT_LEN};

use tracing::trace;

/// Serial line settings of the burner (8N1)
pub mod serial {
    /// Baud rate
    pub const BAUD_RATE: u32 = 9600;
    /// Data bits per character
    pub const DATA_BITS: u8 = 8;
    /// Stop bits
    pub const STOP_BITS: u8 = 1;
    /// Parity checking is disabled
    pub const PARITY: bool = false;
}

/// A reading together with the number of window bytes it used up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    /// The decoded reading (always `valid`)
    pub reading: SensorReading,
    /// Bytes from the start of the window through the end of the frame
    pub consumed: usize,
}

/// Decode the first reading found in `buffer`.
///
/// Binary frames are searched first; when none is accepted the buffer is
/// tried as a text line.
pub fn decode_window(buffer: &[u8]) -> Result<Decoded, ParseError> {
    if buffer.len() < binary::FRAME_SIZE {
        return Err(ParseError::TooShort {
            len: buffer.len(),
            min: binary::FRAME_SIZE,
        });
    }

    let binary_err = match binary::scan(buffer) {
        Ok(decoded) => return Ok(decoded),
        Err(e) => e,
    };

    match text::scan(buffer) {
        Ok(decoded) => Ok(decoded),
        Err(ParseError::NotText) => Err(binary_err),
        Err(e) => {
            trace!(error = %e, "text fallback rejected");
            Err(e)
        }
    }
}

/// Parse a single reading from `buffer`.
pub fn parse(buffer: &[u8]) -> Result<SensorReading, ParseError> {
    decode_window(buffer).map(|d| d.reading)
}

/// Contract form of [`parse`]: on failure the returned record is
/// [`SensorReading::invalid`], never a partially filled one.
pub fn decode(buffer: &[u8]) -> (SensorReading, bool) {
    match parse(buffer) {
        Ok(reading) => (reading, true),
        Err(_) => (SensorReading::invalid(), false),
    }
}
