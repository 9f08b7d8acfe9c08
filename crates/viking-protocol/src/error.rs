//! Frame Parser Error Types

use thiserror::Error;

/// Errors that can occur while decoding a burner frame
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Window shorter than the smallest frame
    #[error("Buffer too short: {len} bytes, need at least {min}")]
    TooShort { len: usize, min: usize },

    /// No start/end sentinel pair and no text line found
    #[error("No valid frame found in buffer")]
    NoFrame,

    /// A field decoded outside its allowed range
    #[error("{field} value {value} is out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: i32,
        min: i32,
        max: i32,
    },

    /// Text input at or above the line length bound
    #[error("Text line too long: {0} bytes")]
    LineTooLong(usize),

    /// Text line present but not in `F:<0|1>,S:<int>,T:<int>` form
    #[error("Malformed text line: {0}")]
    MalformedLine(&'static str),

    /// Buffer does not look like a text line at all
    #[error("Input is not a text line")]
    NotText,
}
