//! Bounded byte FIFO decoupling network delivery from device draining
//!
//! Single-producer single-consumer. The producer side blocks when the ring
//! is full; inbound audio is never dropped, backpressure propagates to the
//! network callback instead. The consumer side is threshold-gated: it only
//! hands out data once at least a frame's worth is buffered, and then
//! returns everything available in one contiguous run.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::AudioError;

/// Fixed-capacity byte ring with blocking whole-item enqueue
pub struct ByteRing {
    buf: Mutex<VecDeque<u8>>,
    space_available: Condvar,
    capacity: usize,
    bytes_enqueued: AtomicU64,
    bytes_dequeued: AtomicU64,
}

impl ByteRing {
    /// Create a ring with the given capacity in bytes
    ///
    /// Allocation failure is reported, not fatal here: the caller decides
    /// whether the process can continue without a playback path.
    pub fn with_capacity(capacity: usize) -> Result<Self, AudioError> {
        let mut buf = VecDeque::new();
        buf.try_reserve_exact(capacity)
            .map_err(|_| AudioError::BufferAllocation(capacity))?;

        Ok(Self {
            buf: Mutex::new(buf),
            space_available: Condvar::new(),
            capacity,
            bytes_enqueued: AtomicU64::new(0),
            bytes_dequeued: AtomicU64::new(0),
        })
    }

    /// Enqueue the whole of `data`, blocking until space exists
    ///
    /// The write is atomic: either every byte is enqueued or none are. With
    /// `max_wait = None` the call waits indefinitely; otherwise it gives up
    /// after the deadline and reports [`AudioError::BufferTimeout`]. Items
    /// larger than the ring can never fit and are rejected outright.
    pub fn push_all(&self, data: &[u8], max_wait: Option<Duration>) -> Result<(), AudioError> {
        if data.len() > self.capacity {
            return Err(AudioError::ItemTooLarge {
                item: data.len(),
                capacity: self.capacity,
            });
        }

        let deadline = max_wait.map(|wait| Instant::now() + wait);
        let mut buf = self.buf.lock();

        while self.capacity - buf.len() < data.len() {
            match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline
                        || self
                            .space_available
                            .wait_for(&mut buf, deadline - now)
                            .timed_out()
                    {
                        return Err(AudioError::BufferTimeout);
                    }
                }
                None => self.space_available.wait(&mut buf),
            }
        }

        buf.extend(data);
        self.bytes_enqueued
            .fetch_add(data.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    /// Dequeue all buffered bytes if at least `threshold` are available
    ///
    /// Returns the number of bytes appended to `out` (zero when below the
    /// threshold). The run may span many threshold units; the consumer
    /// drains whatever has accumulated.
    pub fn pop_available(&self, threshold: usize, out: &mut Vec<u8>) -> usize {
        let mut buf = self.buf.lock();
        if buf.len() < threshold {
            return 0;
        }

        let drained = buf.len();
        out.extend(buf.drain(..));
        drop(buf);

        self.bytes_dequeued
            .fetch_add(drained as u64, Ordering::Relaxed);
        self.space_available.notify_one();
        drained
    }

    /// Current buffered byte count
    pub fn len(&self) -> usize {
        self.buf.lock().len()
    }

    /// Check if the ring is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ring capacity in bytes
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total bytes ever enqueued
    pub fn bytes_enqueued(&self) -> u64 {
        self.bytes_enqueued.load(Ordering::Relaxed)
    }

    /// Total bytes ever dequeued
    pub fn bytes_dequeued(&self) -> u64 {
        self.bytes_dequeued.load(Ordering::Relaxed)
    }
}

/// Thread-safe handle to a byte ring
pub type SharedByteRing = Arc<ByteRing>;

/// Create a new shared byte ring
pub fn create_shared_ring(capacity: usize) -> Result<SharedByteRing, AudioError> {
    Ok(Arc::new(ByteRing::with_capacity(capacity)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::thread;

    #[test]
    fn test_push_pop_order() {
        let ring = ByteRing::with_capacity(64).unwrap();
        ring.push_all(&[1, 2, 3], None).unwrap();
        ring.push_all(&[4, 5], None).unwrap();

        let mut out = Vec::new();
        assert_eq!(ring.pop_available(1, &mut out), 5);
        assert_eq!(out, vec![1, 2, 3, 4, 5]);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_threshold_gates_pop() {
        let ring = ByteRing::with_capacity(64).unwrap();
        ring.push_all(&[0u8; 10], None).unwrap();

        let mut out = Vec::new();
        assert_eq!(ring.pop_available(11, &mut out), 0);
        assert!(out.is_empty());
        assert_eq!(ring.len(), 10);

        assert_eq!(ring.pop_available(10, &mut out), 10);
        assert_eq!(out.len(), 10);
    }

    #[test]
    fn test_oversized_item_rejected() {
        let ring = ByteRing::with_capacity(8).unwrap();
        let err = ring.push_all(&[0u8; 9], None);
        assert!(matches!(
            err,
            Err(AudioError::ItemTooLarge { item: 9, capacity: 8 })
        ));
    }

    #[test]
    fn test_push_times_out_when_full() {
        let ring = ByteRing::with_capacity(4).unwrap();
        ring.push_all(&[0u8; 4], None).unwrap();

        let err = ring.push_all(&[0u8; 1], Some(Duration::from_millis(10)));
        assert!(matches!(err, Err(AudioError::BufferTimeout)));
        // Nothing was partially written
        assert_eq!(ring.len(), 4);
    }

    #[test]
    fn test_blocked_producer_resumes_after_drain() {
        let ring = create_shared_ring(8).unwrap();
        ring.push_all(&[1u8; 8], None).unwrap();

        let producer_ring = ring.clone();
        let producer = thread::spawn(move || {
            producer_ring
                .push_all(&[2u8; 4], Some(Duration::from_secs(5)))
                .unwrap();
        });

        thread::sleep(Duration::from_millis(20));
        let mut out = Vec::new();
        assert_eq!(ring.pop_available(1, &mut out), 8);

        producer.join().unwrap();
        assert_eq!(ring.len(), 4);
        assert_eq!(ring.bytes_enqueued(), 12);
        assert_eq!(ring.bytes_dequeued(), 8);
    }

    proptest! {
        /// Dequeued bytes equal the concatenation of enqueued items in
        /// order, and never exceed what was enqueued.
        #[test]
        fn prop_fifo_order(items in prop::collection::vec(
            prop::collection::vec(any::<u8>(), 0..64), 0..32
        )) {
            let ring = ByteRing::with_capacity(64 * 32).unwrap();
            let mut expected = Vec::new();
            for item in &items {
                ring.push_all(item, None).unwrap();
                expected.extend_from_slice(item);
            }

            let mut out = Vec::new();
            let drained = ring.pop_available(0, &mut out);
            prop_assert_eq!(drained, expected.len());
            prop_assert_eq!(out, expected);
            prop_assert!(ring.bytes_dequeued() <= ring.bytes_enqueued());
        }
    }
}
