//! Lock-Free SPSC Queue
//!
//! Fixed capacity, no allocation after construction, and a full queue
//! rejects instead of overwriting. The producer and consumer halves are
//! separate owned handles, so the single-writer/single-reader discipline is
//! enforced by the type system rather than by convention.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Inner<T, const N: usize> {
    slots: [UnsafeCell<MaybeUninit<T>>; N],
    /// Total items written; the slot index is `head % N`
    head: AtomicUsize,
    /// Total items read
    tail: AtomicUsize,
}

// SAFETY: a slot is written only by the Producer while it is outside
// `tail..head`, and read only by the Consumer while inside it. The
// Release/Acquire pairs on head and tail order those accesses.
unsafe impl<T: Send, const N: usize> Sync for Inner<T, N> {}

impl<T, const N: usize> Inner<T, N> {
    fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        head.wrapping_sub(tail)
    }
}

/// Create a queue with capacity `N`, returning its two halves
pub fn queue<T: Copy + Send, const N: usize>() -> (Producer<T, N>, Consumer<T, N>) {
    let inner = Arc::new(Inner {
        slots: core::array::from_fn(|_| UnsafeCell::new(MaybeUninit::uninit())),
        head: AtomicUsize::new(0),
        tail: AtomicUsize::new(0),
    });
    (
        Producer {
            inner: Arc::clone(&inner),
        },
        Consumer { inner },
    )
}

/// Writing half
pub struct Producer<T, const N: usize> {
    inner: Arc<Inner<T, N>>,
}

impl<T: Copy + Send, const N: usize> Producer<T, N> {
    /// Append `value`, handing it back if the queue is full
    pub fn push(&mut self, value: T) -> Result<(), T> {
        let head = self.inner.head.load(Ordering::Relaxed);
        let tail = self.inner.tail.load(Ordering::Acquire);
        if head.wrapping_sub(tail) >= N {
            return Err(value);
        }

        // SAFETY: we are the only writer and this slot is not visible to
        // the consumer until head is published below
        unsafe {
            (*self.inner.slots[head % N].get()).write(value);
        }

        self.inner.head.store(head.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Items currently queued
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the next push would be rejected
    pub fn is_full(&self) -> bool {
        self.len() >= N
    }

    /// Whether the consumer half still exists
    pub fn is_connected(&self) -> bool {
        Arc::strong_count(&self.inner) > 1
    }

    /// Queue capacity
    pub const fn capacity(&self) -> usize {
        N
    }
}

/// Reading half
pub struct Consumer<T, const N: usize> {
    inner: Arc<Inner<T, N>>,
}

impl<T: Copy + Send, const N: usize> Consumer<T, N> {
    /// Take the oldest item, if any
    pub fn pop(&mut self) -> Option<T> {
        let tail = self.inner.tail.load(Ordering::Relaxed);
        let head = self.inner.head.load(Ordering::Acquire);
        if head == tail {
            return None;
        }

        // SAFETY: tail < head, so the producer finished writing this slot
        // and will not touch it until tail moves past it
        let value = unsafe { (*self.inner.slots[tail % N].get()).assume_init_read() };

        self.inner.tail.store(tail.wrapping_add(1), Ordering::Release);
        Some(value)
    }

    /// Items currently queued
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the producer half still exists
    pub fn is_connected(&self) -> bool {
        Arc::strong_count(&self.inner) > 1
    }

    /// Queue capacity
    pub const fn capacity(&self) -> usize {
        N
    }
}
