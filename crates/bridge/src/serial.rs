//! Serial input
//!
//! Either the real burner link through `tokio-serial` or a simulator that
//! writes plausible frames into an in-process pipe.

use crate::config::SerialConfig;
use crate::error::BridgeError;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWriteExt, DuplexStream};
use tokio_serial::{DataBits, Parity, SerialPortBuilderExt, StopBits};
use tracing::{debug, info};
use viking_protocol::BinaryFrame;

/// Byte source feeding the I/O core
pub type SerialInput = Box<dyn AsyncRead + Unpin + Send>;

/// Open the configured source. Must run inside a tokio runtime.
pub fn open(config: &SerialConfig) -> Result<SerialInput, BridgeError> {
    if config.is_mock() {
        info!(
            interval_ms = config.mock_interval_ms,
            "using simulated burner"
        );
        let interval = Duration::from_millis(config.mock_interval_ms.max(1));
        return Ok(Box::new(MockBurner::new().spawn(interval)));
    }

    let port = tokio_serial::new(&config.device, config.baud_rate)
        .data_bits(DataBits::Eight)
        .stop_bits(StopBits::One)
        .parity(Parity::None)
        .open_native_async()?;
    info!(device = %config.device, baud = config.baud_rate, "serial port open");
    Ok(Box::new(port))
}

/// Burner simulator.
///
/// Cycles through ignition, a running phase and shutdown. Alternates
/// between the binary and text encodings.
#[derive(Debug, Default, Clone)]
pub struct MockBurner {
    tick: u32,
}

const CYCLE: u32 = 60;

impl MockBurner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wire bytes for the next status message
    pub fn next_message(&mut self) -> Vec<u8> {
        let phase = self.tick % CYCLE;
        self.tick = self.tick.wrapping_add(1);

        let flame = (5..45).contains(&phase);
        let fan: u8 = match phase {
            0..=4 => 20 * phase as u8,
            5..=44 => 60 + (phase % 5) as u8 * 5,
            _ => 100 - ((phase - 45) * 6) as u8,
        };
        let temperature: u16 = if flame {
            (20 + (phase - 5) * 4).min(180) as u16
        } else {
            20
        };

        if phase % 2 == 0 {
            BinaryFrame::new(flame, 0, fan, temperature)
                .to_bytes()
                .to_vec()
        } else {
            format!("F:{},S:{},T:{}\n", u8::from(flame), fan, temperature).into_bytes()
        }
    }

    /// Run the simulator on a task and return the reading end of its pipe.
    ///
    /// The task stops once the reader is dropped.
    pub fn spawn(mut self, interval: Duration) -> DuplexStream {
        let (mut tx, rx) = tokio::io::duplex(256);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let message = self.next_message();
                if tx.write_all(&message).await.is_err() {
                    debug!("simulated burner reader closed");
                    break;
                }
            }
        });
        rx
    }
}
