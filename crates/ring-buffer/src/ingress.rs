//! Serial Ingress Ring

use core::cell::RefCell;
use core::sync::atomic::{AtomicU32, Ordering};
use critical_section::Mutex;
use tracing::trace;

/// Ingress capacity in bytes
pub const INGRESS_CAPACITY: usize = 256;

struct Ring {
    data: [u8; INGRESS_CAPACITY],
    /// Next write position
    head: usize,
    /// Next read position
    tail: usize,
    count: usize,
}

impl Ring {
    const fn new() -> Self {
        Self {
            data: [0; INGRESS_CAPACITY],
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    fn push(&mut self, byte: u8) -> bool {
        if self.count == INGRESS_CAPACITY {
            return false;
        }
        self.data[self.head] = byte;
        self.head = (self.head + 1) % INGRESS_CAPACITY;
        self.count += 1;
        true
    }

    fn pop_into(&mut self, dest: &mut [u8]) -> usize {
        let n = dest.len().min(self.count);
        for slot in dest.iter_mut().take(n) {
            *slot = self.data[self.tail];
            self.tail = (self.tail + 1) % INGRESS_CAPACITY;
        }
        self.count -= n;
        n
    }
}

/// Byte ring between the UART interrupt (sole writer) and the parsing
/// task (sole reader).
///
/// A full ring never overwrites: the new byte is dropped and counted, so
/// an overrun is visible through [`IngressBuffer::dropped`].
pub struct IngressBuffer {
    ring: Mutex<RefCell<Ring>>,
    dropped: AtomicU32,
    received: AtomicU32,
}

impl IngressBuffer {
    /// Create an empty buffer; usable in a `static`
    pub const fn new() -> Self {
        Self {
            ring: Mutex::new(RefCell::new(Ring::new())),
            dropped: AtomicU32::new(0),
            received: AtomicU32::new(0),
        }
    }

    /// Store one byte. Interrupt context; never blocks.
    pub fn push(&self, byte: u8) {
        let stored = critical_section::with(|cs| self.ring.borrow_ref_mut(cs).push(byte));
        self.account(stored);
    }

    /// Store a chunk of bytes under a single critical section
    pub fn push_slice(&self, bytes: &[u8]) {
        let stored = critical_section::with(|cs| {
            let mut ring = self.ring.borrow_ref_mut(cs);
            bytes.iter().filter(|&&b| ring.push(b)).count()
        });
        let lost = bytes.len() - stored;
        self.received.fetch_add(stored as u32, Ordering::Relaxed);
        if lost > 0 {
            self.dropped.fetch_add(lost as u32, Ordering::Relaxed);
            trace!(lost, "ingress full, bytes dropped");
        }
    }

    fn account(&self, stored: bool) {
        if stored {
            self.received.fetch_add(1, Ordering::Relaxed);
        } else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            trace!("ingress full, byte dropped");
        }
    }

    /// Whether at least one byte is waiting
    pub fn available(&self) -> bool {
        critical_section::with(|cs| self.ring.borrow_ref(cs).count > 0)
    }

    /// Number of bytes waiting
    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.ring.borrow_ref(cs).count)
    }

    /// Whether the ring is empty
    pub fn is_empty(&self) -> bool {
        !self.available()
    }

    /// Move up to `dest.len()` bytes out of the ring, oldest first.
    ///
    /// An empty destination is a no-op returning 0.
    pub fn read(&self, dest: &mut [u8]) -> usize {
        if dest.is_empty() {
            return 0;
        }
        critical_section::with(|cs| self.ring.borrow_ref_mut(cs).pop_into(dest))
    }

    /// Bytes rejected because the ring was full
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Bytes accepted since creation
    pub fn received(&self) -> u32 {
        self.received.load(Ordering::Relaxed)
    }
}

impl Default for IngressBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_push_and_read() {
        let buffer = IngressBuffer::new();
        assert!(!buffer.available());

        for b in 0..10u8 {
            buffer.push(b);
        }
        assert!(buffer.available());
        assert_eq!(buffer.len(), 10);

        let mut out = [0u8; 4];
        assert_eq!(buffer.read(&mut out), 4);
        assert_eq!(out, [0, 1, 2, 3]);
        assert_eq!(buffer.len(), 6);
    }

    #[test]
    fn test_full_buffer_drops_new_bytes() {
        let buffer = IngressBuffer::new();
        for i in 0..INGRESS_CAPACITY + 3 {
            buffer.push(i as u8);
        }
        assert_eq!(buffer.len(), INGRESS_CAPACITY);
        assert_eq!(buffer.dropped(), 3);

        // Oldest bytes survive
        let mut out = [0u8; 2];
        buffer.read(&mut out);
        assert_eq!(out, [0, 1]);
    }

    #[test]
    fn test_empty_destination_is_noop() {
        let buffer = IngressBuffer::new();
        buffer.push(7);
        assert_eq!(buffer.read(&mut []), 0);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_wrap_around() {
        let buffer = IngressBuffer::new();
        let mut sink = [0u8; INGRESS_CAPACITY];

        buffer.push_slice(&[0xAB; 200]);
        assert_eq!(buffer.read(&mut sink[..150]), 150);

        let data: Vec<u8> = (0..150u8).collect();
        buffer.push_slice(&data);
        assert_eq!(buffer.len(), 200);

        assert_eq!(buffer.read(&mut sink), 200);
        assert!(sink[..50].iter().all(|&b| b == 0xAB));
        assert_eq!(&sink[50..200], data.as_slice());
        assert_eq!(buffer.dropped(), 0);
    }

    #[test]
    fn test_push_slice_counts_overflow() {
        let buffer = IngressBuffer::new();
        buffer.push_slice(&[1u8; INGRESS_CAPACITY + 10]);
        assert_eq!(buffer.dropped(), 10);
        assert_eq!(buffer.received(), INGRESS_CAPACITY as u32);
    }

    #[test]
    fn test_concurrent_producer_consumer() {
        let buffer = Arc::new(IngressBuffer::new());
        let total = 10_000usize;

        let producer = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                for i in 0..total {
                    // Spin until there is room so nothing is dropped
                    while buffer.len() == INGRESS_CAPACITY {
                        thread::yield_now();
                    }
                    buffer.push((i % 251) as u8);
                }
            })
        };

        let mut seen = 0usize;
        let mut chunk = [0u8; 32];
        while seen < total {
            let n = buffer.read(&mut chunk);
            for &b in &chunk[..n] {
                assert_eq!(b, (seen % 251) as u8);
                seen += 1;
            }
            if n == 0 {
                thread::yield_now();
            }
        }

        producer.join().unwrap();
        assert_eq!(buffer.dropped(), 0);
    }
}
