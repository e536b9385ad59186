//! Per-client counters for the header's sequence and source fields.
//!
//! # Why two counters? (for beginners)
//!
//! Every outgoing packet carries a one-byte *sequence* number and a four-byte
//! *source* id, and a device copies both into its reply.  One byte wraps after
//! 256 requests, which is too small to tell apart many requests in flight, so
//! replies are matched on the source id instead.  Each request gets its own
//! source id from [`SourceIdAllocator`]; the sequence byte still increments so
//! packet captures stay readable.
//!
//! Both counters use atomics, so any number of tasks can draw values at the
//! same time without a lock.

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

/// Wrapping counter for the one-byte header sequence field.
///
/// # Examples
///
/// ```rust
/// use lifx_core::protocol::SequenceCounter;
///
/// let counter = SequenceCounter::new();
/// assert_eq!(counter.next(), 0);
/// assert_eq!(counter.next(), 1);
/// ```
#[derive(Debug, Default)]
pub struct SequenceCounter {
    inner: AtomicU8,
}

impl SequenceCounter {
    /// Creates a new counter starting at 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next value; wraps from 255 to 0.
    pub fn next(&self) -> u8 {
        self.inner.fetch_add(1, Ordering::Relaxed)
    }

    /// Current value without incrementing.
    pub fn current(&self) -> u8 {
        self.inner.load(Ordering::Relaxed)
    }
}

/// Hands out non-zero `u32` source ids, one per request.
///
/// Zero is skipped because a zero source tells devices to broadcast their
/// reply instead of routing it back.  Ids repeat only after 2³² − 1 draws.
#[derive(Debug)]
pub struct SourceIdAllocator {
    inner: AtomicU32,
}

impl SourceIdAllocator {
    /// Starts drawing from `seed` (a zero seed starts at 1).
    pub fn starting_at(seed: u32) -> Self {
        Self {
            inner: AtomicU32::new(seed),
        }
    }

    /// Returns the next non-zero id.
    pub fn next(&self) -> u32 {
        loop {
            let id = self.inner.fetch_add(1, Ordering::Relaxed);
            if id != 0 {
                return id;
            }
        }
    }
}

impl Default for SourceIdAllocator {
    fn default() -> Self {
        Self::starting_at(1)
    }
}
