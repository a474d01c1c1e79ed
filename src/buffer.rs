use crossbeam::queue::ArrayQueue;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// How many threads may concurrently enqueue into a buffer.
///
/// Selected once at link time and never changed afterwards. `Single` takes the
/// allocation-light enqueue path; `Multi` serializes producers so that each
/// producer's items interleave in arrival order while keeping their own
/// relative order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterMode {
    /// Exactly one thread ever submits
    Single,
    /// Concurrent submitters, internally synchronized
    Multi,
}

/// A bounded FIFO queue shared between one producer side and one consumer
/// thread, built on crossbeam's lock-free `ArrayQueue`.
///
/// Capacity is rounded up to the next power of two. `push` blocks when the
/// queue is full; this is the backpressure mechanism by which a slow consumer
/// throttles a fast producer.
#[derive(Debug)]
pub struct RingBuffer<T: Send> {
    queue: Arc<ArrayQueue<T>>,
    multi_writer: Arc<AtomicBool>,
    producer_gate: Arc<Mutex<()>>,
    block_count: Arc<AtomicU64>,
}

impl<T: Send> Clone for RingBuffer<T> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
            multi_writer: Arc::clone(&self.multi_writer),
            producer_gate: Arc::clone(&self.producer_gate),
            block_count: Arc::clone(&self.block_count),
        }
    }
}

impl<T: Send> RingBuffer<T> {
    /// Create a buffer with at least `capacity` slots (rounded up to a power
    /// of two) in the given writer mode.
    pub fn new(capacity: usize, mode: WriterMode) -> Self {
        let capacity = capacity.max(1).next_power_of_two();
        Self {
            queue: Arc::new(ArrayQueue::new(capacity)),
            multi_writer: Arc::new(AtomicBool::new(mode == WriterMode::Multi)),
            producer_gate: Arc::new(Mutex::new(())),
            block_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Switch the producer arity. Must happen before any traffic; link
    /// formation is the only caller.
    pub fn set_writer_mode(&self, mode: WriterMode) {
        self.multi_writer
            .store(mode == WriterMode::Multi, Ordering::Relaxed);
    }

    /// Current writer mode.
    pub fn writer_mode(&self) -> WriterMode {
        if self.multi_writer.load(Ordering::Relaxed) {
            WriterMode::Multi
        } else {
            WriterMode::Single
        }
    }

    /// Enqueue an item, blocking while the queue is full.
    pub fn push(&self, item: T) {
        if self.multi_writer.load(Ordering::Relaxed) {
            let _gate = self.producer_gate.lock();
            self.push_blocking(item);
        } else {
            self.push_blocking(item);
        }
    }

    fn push_blocking(&self, mut item: T) {
        loop {
            match self.queue.push(item) {
                Ok(()) => return,
                Err(rejected) => {
                    item = rejected;
                    self.block_count.fetch_add(1, Ordering::Relaxed);
                    // Spin with a short sleep to reduce CPU usage
                    thread::sleep(Duration::from_micros(10));
                }
            }
        }
    }

    /// Dequeue an item if one is available.
    pub fn pop(&self) -> Option<T> {
        self.queue.pop()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Number of times a push found the queue full and had to wait.
    pub fn block_count(&self) -> u64 {
        self.block_count.load(Ordering::Relaxed)
    }
}
