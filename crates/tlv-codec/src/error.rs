use thiserror::Error;

/// Encode and decode failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TlvError {
    #[error("buffer overflow: need {needed} bytes, {remaining} remaining")]
    Overflow { needed: usize, remaining: usize },

    #[error("string of {0} bytes exceeds the 255-byte limit")]
    StringTooLong(usize),

    #[error("container nesting deeper than {max}")]
    NestingTooDeep { max: usize },

    #[error("no open container to close")]
    NoOpenContainer,

    #[error("{0} container(s) still open")]
    UnclosedContainer(usize),

    #[error("array element carries tag {0}, expected 0")]
    ArrayElementTag(u8),

    #[error("element truncated at offset {offset}")]
    Truncated { offset: usize },

    #[error("declared length {declared} exceeds remaining {remaining} bytes")]
    LengthExceedsBuffer { declared: usize, remaining: usize },

    #[error("unknown element type in control octet 0x{0:02X}")]
    UnknownElementType(u8),

    #[error("unsupported tag control in control octet 0x{0:02X}")]
    UnsupportedTagControl(u8),

    #[error("invalid width in control octet 0x{0:02X}")]
    InvalidWidth(u8),

    #[error("string at offset {offset} is not valid UTF-8")]
    InvalidUtf8 { offset: usize },

    #[error("end of container at offset {offset} with none open")]
    UnbalancedContainer { offset: usize },
}
