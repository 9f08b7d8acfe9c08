//! Ring Buffers
//!
//! Two fixed-capacity buffers sit between the serial line and the protocol
//! core:
//!
//! - [`IngressBuffer`]: byte ring written from interrupt context and
//!   drained by the parsing task. Every check-then-act runs inside a
//!   `critical_section`, which on the target masks the UART interrupt and
//!   on a hosted build is a process-wide lock.
//! - [`spsc`]: lock-free single-producer/single-consumer queue of `Copy`
//!   records, used for the cross-core handoff.

mod ingress;
mod queue;

pub use ingress::{IngressBuffer, INGRESS_CAPACITY};

/// Single-producer/single-consumer record queue
pub mod spsc {
    pub use crate::queue::{queue, Consumer, Producer};
}
