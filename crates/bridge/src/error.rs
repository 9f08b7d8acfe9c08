//! Bridge Error Types

use attribute_store::RegistryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("report target rejected: {0}")]
    Registry(#[from] RegistryError),

    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error("{0} task failed")]
    TaskFailed(&'static str),
}
