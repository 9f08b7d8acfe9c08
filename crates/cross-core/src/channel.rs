//! Channel Implementation

use ring_buffer::spsc::{self, Consumer, Producer};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, Thread};
use std::time::Duration;
use thiserror::Error;
use tracing::{trace, warn};
use viking_protocol::SensorReading;

/// Readings the queue holds before `send` reports full
pub const QUEUE_CAPACITY: usize = 8;

/// Why a reading was not enqueued
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    #[error("cross-core queue is full")]
    Full,

    #[error("protocol core is not running")]
    Disconnected,
}

/// Cumulative counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChannelStats {
    /// Protocol messages (attribute reports) handled by the protocol core
    pub messages_processed: u32,
    /// Readings taken off the queue by the protocol core
    pub readings_processed: u32,
    /// Readings refused because the queue was full
    pub readings_dropped: u32,
}

#[derive(Default)]
struct Shared {
    signaled: AtomicBool,
    consumer: OnceLock<Thread>,
    messages_processed: AtomicU32,
    readings_processed: AtomicU32,
    readings_dropped: AtomicU32,
}

impl Shared {
    fn stats(&self) -> ChannelStats {
        ChannelStats {
            messages_processed: self.messages_processed.load(Ordering::Relaxed),
            readings_processed: self.readings_processed.load(Ordering::Relaxed),
            readings_dropped: self.readings_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Create a channel and return its producer and consumer halves.
///
/// Neither half is `Clone`, so there is exactly one of each.
pub fn channel() -> (ReadingSender, ReadingReceiver) {
    let (producer, consumer) = spsc::queue::<SensorReading, QUEUE_CAPACITY>();
    let shared = Arc::new(Shared::default());
    (
        ReadingSender {
            queue: producer,
            shared: Arc::clone(&shared),
        },
        ReadingReceiver {
            queue: consumer,
            shared,
        },
    )
}

/// I/O core half
pub struct ReadingSender {
    queue: Producer<SensorReading, QUEUE_CAPACITY>,
    shared: Arc<Shared>,
}

impl ReadingSender {
    /// Enqueue a reading without blocking.
    ///
    /// On [`SendError::Full`] the reading is gone; the caller does not
    /// retry.
    pub fn send(&mut self, reading: SensorReading) -> Result<(), SendError> {
        if !self.queue.is_connected() {
            return Err(SendError::Disconnected);
        }
        self.queue.push(reading).map_err(|_| {
            self.shared.readings_dropped.fetch_add(1, Ordering::Relaxed);
            warn!("cross-core queue full, reading dropped");
            SendError::Full
        })
    }

    /// Best-effort wake hint for the consumer
    pub fn signal_consumer(&self) {
        self.shared.signaled.store(true, Ordering::Release);
        if let Some(thread) = self.shared.consumer.get() {
            thread.unpark();
        }
    }

    /// Readings waiting in the queue
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn stats(&self) -> ChannelStats {
        self.shared.stats()
    }

    /// Read-only counter view for other tasks
    pub fn stats_handle(&self) -> StatsHandle {
        StatsHandle(Arc::clone(&self.shared))
    }
}

/// Protocol core half
pub struct ReadingReceiver {
    queue: Consumer<SensorReading, QUEUE_CAPACITY>,
    shared: Arc<Shared>,
}

impl ReadingReceiver {
    /// Take the oldest reading, if any
    pub fn try_receive(&mut self) -> Option<SensorReading> {
        let reading = self.queue.pop()?;
        self.shared
            .readings_processed
            .fetch_add(1, Ordering::Relaxed);
        Some(reading)
    }

    /// Count protocol messages handled by the consumer core
    pub fn record_messages(&self, messages: u32) {
        self.shared
            .messages_processed
            .fetch_add(messages, Ordering::Relaxed);
    }

    /// Clear the wake hint, returning whether it was set
    pub fn take_signal(&self) -> bool {
        self.shared.signaled.swap(false, Ordering::Acquire)
    }

    /// Register the calling thread as the one `signal_consumer` unparks.
    ///
    /// Only the first call binds; later calls are ignored.
    pub fn bind_current_thread(&self) {
        if self.shared.consumer.set(thread::current()).is_err() {
            trace!("consumer thread already bound");
        }
    }

    /// Park until signaled or `timeout` elapses.
    ///
    /// Returns immediately if a hint is already pending. Spurious wakeups
    /// are possible; callers poll the queue afterwards either way.
    pub fn wait(&self, timeout: Duration) {
        if !self.take_signal() {
            thread::park_timeout(timeout);
            self.take_signal();
        }
    }

    /// Whether the sender half still exists
    pub fn is_connected(&self) -> bool {
        self.queue.is_connected()
    }

    pub fn stats(&self) -> ChannelStats {
        self.shared.stats()
    }

    /// Read-only counter view for other tasks
    pub fn stats_handle(&self) -> StatsHandle {
        StatsHandle(Arc::clone(&self.shared))
    }
}

/// Cloneable read-only view of the channel counters
#[derive(Clone)]
pub struct StatsHandle(Arc<Shared>);

impl StatsHandle {
    pub fn stats(&self) -> ChannelStats {
        self.0.stats()
    }
}
