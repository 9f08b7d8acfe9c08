//! Attribute Store Error Types

use thiserror::Error;
use tlv_codec::TlvError;

/// Errors applying readings or decoding reports
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttributeError {
    /// Reading failed parsing and must not reach the attributes
    #[error("reading is marked invalid")]
    InvalidReading,

    /// Report payload did not have the expected shape
    #[error("malformed attribute report: {0}")]
    MalformedReport(&'static str),

    #[error(transparent)]
    Tlv(#[from] TlvError),
}

/// Errors registering report targets
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("report target registry is full ({max} targets)")]
    Full { max: usize },

    #[error("invalid IPv4 address: {0:?}")]
    InvalidAddress(String),

    #[error("report target port must be non-zero")]
    InvalidPort,
}
