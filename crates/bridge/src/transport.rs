//! Report delivery

use crate::error::BridgeError;
use std::net::{SocketAddrV4, UdpSocket};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Destination for encoded attribute reports.
///
/// Called from the protocol core thread; implementations must not block
/// for long.
pub trait ReportSink: Send {
    fn send_report(&mut self, target: SocketAddrV4, payload: &[u8]) -> Result<(), BridgeError>;
}

/// Sends each report as one UDP datagram
pub struct UdpReportSink {
    socket: UdpSocket,
}

impl UdpReportSink {
    pub fn bind(addr: &str) -> Result<Self, BridgeError> {
        let socket = UdpSocket::bind(addr)?;
        info!(local = %socket.local_addr()?, "report socket bound");
        Ok(Self { socket })
    }
}

impl ReportSink for UdpReportSink {
    fn send_report(&mut self, target: SocketAddrV4, payload: &[u8]) -> Result<(), BridgeError> {
        let sent = self.socket.send_to(payload, target)?;
        debug!(%target, bytes = sent, "report sent");
        Ok(())
    }
}

/// A report captured by [`MemorySink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentReport {
    pub target: SocketAddrV4,
    pub payload: Vec<u8>,
}

/// Keeps reports in memory; clones share the same log
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    reports: Arc<Mutex<Vec<SentReport>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything sent so far
    pub fn reports(&self) -> Vec<SentReport> {
        self.reports
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl ReportSink for MemorySink {
    fn send_report(&mut self, target: SocketAddrV4, payload: &[u8]) -> Result<(), BridgeError> {
        self.reports
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(SentReport {
                target,
                payload: payload.to_vec(),
            });
        Ok(())
    }
}
