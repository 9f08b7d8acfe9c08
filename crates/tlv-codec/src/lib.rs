//! TLV Codec
//!
//! Compact tag-length-value encoding used for attribute reports.
//!
//! Every element starts with a control octet:
//!
//! ```text
//!  7   5 4   3 2     0
//! ┌─────┬─────┬───────┐
//! │type │ tag │ width │
//! └─────┴─────┴───────┘
//! ```
//!
//! followed by a one-octet context tag and the value. Integers are
//! little-endian in the narrowest width that holds them. Booleans carry
//! their value in the width bits. Containers are closed by a bare `0xA0`.

mod control;
mod error;
mod reader;
mod writer;

pub use control::{ElementType, IntWidth, TagControl};
pub use error::TlvError;
pub use reader::{Element, TlvReader, TlvValue};
pub use writer::TlvWriter;

/// Deepest container nesting either side accepts
pub const MAX_DEPTH: usize = 8;

/// Longest UTF-8 string, in bytes
pub const MAX_STRING_LEN: usize = u8::MAX as usize;
