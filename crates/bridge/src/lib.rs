//! Viking Bio Bridge
//!
//! Hosted build of the burner bridge. The firmware's two cores map onto an
//! I/O side (tokio tasks reading the serial link and parsing frames) and a
//! protocol side (one OS thread owning the attribute store and sending
//! reports). They share only the ingress buffer and the cross-core
//! channel.

pub mod cli;
pub mod config;
pub mod error;
pub mod io_core;
pub mod pipeline;
pub mod protocol_core;
pub mod serial;
pub mod transport;

pub use config::BridgeConfig;
pub use error::BridgeError;
pub use pipeline::{run_pipeline, PipelineSummary};
pub use transport::{MemorySink, ReportSink, SentReport, UdpReportSink};

use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Install the global fmt subscriber at `level`
pub fn init_logging(level: &str) -> Result<(), BridgeError> {
    let level = Level::from_str(level)
        .map_err(|_| BridgeError::InvalidConfig(format!("unknown log level {level:?}")))?;

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| BridgeError::Logging(e.to_string()))
}
