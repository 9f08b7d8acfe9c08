//! Streaming Frame Window
//!
//! Bytes drained from the ingress buffer arrive in arbitrary chunks; a
//! frame or line can straddle two chunks. The accumulator keeps a bounded
//! window, yields complete readings in arrival order and throws away bytes
//! that can no longer become part of a frame.

use crate::binary::{self, FRAME_SIZE};
use crate::error::ParseError;
use crate::reading::SensorReading;
use crate::text;
use crate::Decoded;
use heapless::Vec;
use tracing::{debug, warn};

/// Window capacity in bytes
pub const WINDOW_SIZE: usize = 128;

/// Bytes kept when the window overflows: a possible partial binary frame
const KEEP_ON_OVERFLOW: usize = FRAME_SIZE - 1;

/// Bounded reassembly window in front of the stateless parser
#[derive(Debug, Default)]
pub struct FrameAccumulator {
    window: Vec<u8, WINDOW_SIZE>,
    discarded: usize,
    parsed: usize,
    failures: usize,
}

impl FrameAccumulator {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `bytes` and hand every completed reading to `emit`
    pub fn feed<F>(&mut self, bytes: &[u8], mut emit: F)
    where
        F: FnMut(SensorReading),
    {
        for &byte in bytes {
            if self.window.is_full() {
                self.drain(&mut emit);
                if self.window.is_full() {
                    self.compact();
                }
            }
            // Room was made above
            let _ = self.window.push(byte);
        }
        self.drain(&mut emit);
    }

    /// Bytes currently buffered
    pub fn len(&self) -> usize {
        self.window.len()
    }

    /// Whether the window is empty
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Total bytes dropped without producing a reading
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    /// Readings produced so far
    pub fn parsed(&self) -> usize {
        self.parsed
    }

    /// Rejected text lines and binary frames dropped from the window
    pub fn failures(&self) -> usize {
        self.failures
    }

    fn drain<F>(&mut self, emit: &mut F)
    where
        F: FnMut(SensorReading),
    {
        while self.window.len() >= FRAME_SIZE {
            match self.next_decoded() {
                Step::Reading(decoded) => {
                    self.parsed += 1;
                    emit(decoded.reading);
                    self.remove_front(decoded.consumed);
                }
                Step::Reject(upto) => {
                    self.failures += 1;
                    self.discarded += upto;
                    self.remove_front(upto);
                }
                Step::Wait => break,
            }
        }
    }

    fn next_decoded(&self) -> Step {
        let binary = binary::scan(&self.window).ok();
        let text = text::scan(&self.window);

        match (binary, text) {
            (Some(b), Ok(t)) => Step::Reading(if t.consumed < b.consumed { t } else { b }),
            (Some(b), Err(_)) => Step::Reading(b),
            (None, Ok(t)) => Step::Reading(t),
            (None, Err(ParseError::NotText))
            | (None, Err(ParseError::MalformedLine("missing line terminator"))) => Step::Wait,
            (None, Err(e)) => self.reject_line(e),
        }
    }

    /// A complete line failed to parse. When a later `F:` precedes the
    /// newline, the line was cut short and the bytes from that `F:` may
    /// still be a good line, so only the bytes in front of it go.
    fn reject_line(&self, error: ParseError) -> Step {
        let Some(start) = find_line_start(&self.window, 0) else {
            return Step::Wait;
        };
        let Some(nl) = self.window[start..].iter().position(|&b| b == b'\n') else {
            return Step::Wait;
        };
        let nl = start + nl;

        let mut resync = None;
        let mut from = start + 1;
        while let Some(pos) = find_line_start(&self.window[..nl], from) {
            resync = Some(pos);
            from = pos + 1;
        }

        match resync {
            Some(pos) => {
                debug!(error = %error, dropped = pos, "truncated text line, resyncing");
                Step::Reject(pos)
            }
            None => {
                debug!(error = %error, "discarding rejected text line");
                Step::Reject(nl + 1)
            }
        }
    }

    fn remove_front(&mut self, count: usize) {
        let count = count.min(self.window.len());
        self.failures += binary::count_rejected(&self.window[..count]);
        let remaining = self.window.len() - count;
        self.window.copy_within(count.., 0);
        self.window.truncate(remaining);
    }

    fn compact(&mut self) {
        let drop = self.window.len() - KEEP_ON_OVERFLOW;
        warn!(dropped = drop, "frame window overflow, keeping trailing bytes");
        self.discarded += drop;
        self.remove_front(drop);
    }
}

enum Step {
    Reading(Decoded),
    /// A complete text line failed; drop this many bytes
    Reject(usize),
    Wait,
}

/// Position of the first `F:` at or after `from`
fn find_line_start(buf: &[u8], from: usize) -> Option<usize> {
    buf.get(from..)?
        .windows(2)
        .position(|w| w == b"F:")
        .map(|pos| from + pos)
}
