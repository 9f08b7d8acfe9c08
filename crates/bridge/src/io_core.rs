//! I/O core
//!
//! Two tasks stand in for the firmware's first core. The serial reader
//! pushes bytes one at a time into the ingress buffer, as the UART
//! interrupt does. The parse task drains the buffer, decodes readings and
//! forwards them across to the protocol core.

use crate::error::BridgeError;
use cross_core::{ReadingSender, SendError};
use metrics::counter;
use ring_buffer::IngressBuffer;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{watch, Notify};
use tracing::{debug, info, trace, warn};
use viking_protocol::FrameAccumulator;

const READ_CHUNK: usize = 64;

/// Copy serial bytes into `ingress` until the source closes.
///
/// Returns the number of bytes read.
pub async fn read_serial<R>(
    mut source: R,
    ingress: Arc<IngressBuffer>,
    data_ready: Arc<Notify>,
) -> Result<u64, BridgeError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; READ_CHUNK];
    let mut total = 0u64;

    loop {
        let n = source.read(&mut buf).await?;
        if n == 0 {
            debug!(bytes = total, "serial source closed");
            return Ok(total);
        }

        let dropped_before = ingress.dropped();
        for &byte in &buf[..n] {
            ingress.push(byte);
        }
        let lost = ingress.dropped() - dropped_before;
        if lost > 0 {
            warn!(lost, "ingress buffer overrun");
            counter!("bridge_ingress_bytes_dropped").increment(u64::from(lost));
        }

        total += n as u64;
        data_ready.notify_one();
    }
}

/// Parse side of the I/O core
pub struct IoCore {
    ingress: Arc<IngressBuffer>,
    sender: ReadingSender,
    accumulator: FrameAccumulator,
}

impl IoCore {
    pub fn new(ingress: Arc<IngressBuffer>, sender: ReadingSender) -> Self {
        Self {
            ingress,
            sender,
            accumulator: FrameAccumulator::new(),
        }
    }

    /// Move everything buffered through the parser and into the channel.
    ///
    /// Returns the number of readings forwarded.
    pub fn drain(&mut self) -> usize {
        if !self.ingress.available() {
            return 0;
        }

        let mut chunk = [0u8; READ_CHUNK];
        let mut forwarded = 0usize;
        let mut dropped = 0usize;
        let parsed_before = self.accumulator.parsed();
        let failures_before = self.accumulator.failures();
        let sender = &mut self.sender;

        loop {
            let n = self.ingress.read(&mut chunk);
            if n == 0 {
                break;
            }
            self.accumulator.feed(&chunk[..n], |reading| {
                trace!(?reading, "reading decoded");
                match sender.send(reading) {
                    Ok(()) => forwarded += 1,
                    Err(SendError::Full) => dropped += 1,
                    Err(SendError::Disconnected) => {
                        debug!("protocol core gone, reading discarded");
                        dropped += 1;
                    }
                }
            });
        }

        counter!("bridge_frames_parsed")
            .increment((self.accumulator.parsed() - parsed_before) as u64);
        let failures = self.accumulator.failures() - failures_before;
        if failures > 0 {
            counter!("bridge_parse_failures").increment(failures as u64);
        }
        counter!("bridge_readings_forwarded").increment(forwarded as u64);
        if dropped > 0 {
            counter!("bridge_readings_dropped").increment(dropped as u64);
        }
        if forwarded > 0 {
            self.sender.signal_consumer();
        }
        forwarded
    }

    /// Drain whenever the reader signals new bytes, until `shutdown` flips
    pub async fn run(mut self, data_ready: Arc<Notify>, mut shutdown: watch::Receiver<bool>) {
        info!("I/O core started");
        loop {
            tokio::select! {
                _ = data_ready.notified() => {
                    self.drain();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        // Bytes that arrived after the last notification
        self.drain();
        info!(
            parsed = self.accumulator.parsed(),
            failures = self.accumulator.failures(),
            discarded_bytes = self.accumulator.discarded(),
            "I/O core stopped"
        );
    }
}
