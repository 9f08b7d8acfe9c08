//! Cross-Core Reading Channel
//!
//! Moves decoded [`SensorReading`]s from the I/O core to the protocol
//! core. The queue is lock-free, bounded and never blocks; a separate wake
//! hint lets the producer nudge a parked consumer. The consumer must keep
//! polling on its own since hints coalesce.
//!
//! [`SensorReading`]: viking_protocol::SensorReading

mod channel;

pub use channel::{
    channel, ChannelStats, ReadingReceiver, ReadingSender, SendError, StatsHandle, QUEUE_CAPACITY,
};
