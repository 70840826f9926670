//! Bounded, thread-safe FIFO queue of variable-length byte messages.
//!
//! Grounded on `async_queue.c`/`async_queue.h`: a fixed-capacity ring of
//! message slots with three independent overflow-behavior flags. The C
//! implementation lays messages out in a raw ring buffer of
//! length-prefixed slots; here `VecDeque<Box<[u8]>>` gives the same
//! capacity-bounded FIFO semantics without hand-rolling a ring buffer over
//! a byte array, which buys nothing in a language with an owned, growable
//! double-ended queue in the standard library.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use log::trace;

use crate::sync::{Mutex, ResetMode, SyncEvent};

/// Queue overflow / notification behavior. Three independent bits.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct QueueFlags(u8);

impl QueueFlags {
    /// Overflow drops the tail-most (oldest) entry and admits the new one.
    pub const DROP_OLDEST: QueueFlags = QueueFlags(0b001);
    /// Overflow suspends the producer until space is available.
    pub const BLOCK_WRITER: QueueFlags = QueueFlags(0b010);
    /// A reader-visible event is set after every successful enqueue.
    pub const SIGNAL_ON_INSERT: QueueFlags = QueueFlags(0b100);
    pub const NONE: QueueFlags = QueueFlags(0);

    pub const fn add(self, other: QueueFlags) -> QueueFlags {
        QueueFlags(self.0 | other.0)
    }

    fn contains(self, flag: QueueFlags) -> bool {
        self.0 & flag.0 != 0
    }
}

impl std::ops::BitOr for QueueFlags {
    type Output = QueueFlags;
    fn bitor(self, rhs: QueueFlags) -> QueueFlags {
        self.add(rhs)
    }
}

/// A point-in-time snapshot of queue counters.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct QueueStats {
    pub capacity: usize,
    pub current_depth: usize,
    pub max_msg_size: usize,
    pub enqueued: u64,
    pub dequeued: u64,
    pub dropped: u64,
}

struct Inner {
    slots: VecDeque<Box<[u8]>>,
}

/// A fixed-capacity FIFO of byte messages, safe to share across producer
/// and consumer threads via `Arc`.
pub struct Queue {
    capacity: usize,
    max_msg_size: usize,
    flags: QueueFlags,
    inner: Mutex<Inner>,
    not_full: SyncEvent,
    not_empty: SyncEvent,
    /// Set after every successful enqueue when `SIGNAL_ON_INSERT` is set;
    /// used by main-thread consumers that multiplex this queue with a
    /// runtime's `wait`. Manual-reset so a consumer observing it via a
    /// multi-object wait doesn't race a narrower auto-reset window.
    insert_signal: SyncEvent,
    enqueued: AtomicU64,
    dequeued: AtomicU64,
    dropped: AtomicU64,
}

impl Queue {
    /// Creates a queue holding up to `capacity` messages, each at most
    /// `max_msg_size` bytes.
    pub fn new(capacity: usize, max_msg_size: usize, flags: QueueFlags) -> Queue {
        assert!(capacity > 0, "queue capacity must be non-zero");
        assert!(max_msg_size > 0, "max_msg_size must be non-zero");
        Queue {
            capacity,
            max_msg_size,
            flags,
            inner: Mutex::new(Inner {
                slots: VecDeque::with_capacity(capacity),
            }),
            not_full: SyncEvent::new(ResetMode::Manual, true),
            not_empty: SyncEvent::new(ResetMode::Manual, false),
            insert_signal: SyncEvent::new(ResetMode::Manual, false),
            enqueued: AtomicU64::new(0),
            dequeued: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// The event that becomes signaled after any successful enqueue, when
    /// this queue was constructed with [`QueueFlags::SIGNAL_ON_INSERT`].
    /// Consumers typically `reset` it after draining.
    pub fn insert_signal(&self) -> &SyncEvent {
        &self.insert_signal
    }

    pub fn max_msg_size(&self) -> usize {
        self.max_msg_size
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Enqueues `data`. Returns `false` if the queue is full and neither
    /// `DROP_OLDEST` nor `BLOCK_WRITER` is set. `drop-oldest` wins if both
    /// overflow flags are set (no blocking).
    pub fn enqueue(&self, data: &[u8]) -> bool {
        if data.is_empty() || data.len() > self.max_msg_size {
            return false;
        }

        let mut guard = self.inner.lock();
        loop {
            if guard.slots.len() < self.capacity {
                break;
            }
            if self.flags.contains(QueueFlags::DROP_OLDEST) {
                guard.slots.pop_front();
                self.dropped.fetch_add(1, Ordering::Relaxed);
                trace!("queue full: dropped oldest message");
                break;
            }
            if self.flags.contains(QueueFlags::BLOCK_WRITER) {
                drop(guard);
                self.not_full.wait(None);
                guard = self.inner.lock();
                continue;
            }
            return false;
        }

        guard.slots.push_back(data.to_vec().into_boxed_slice());
        let depth = guard.slots.len();
        drop(guard);

        self.enqueued.fetch_add(1, Ordering::Relaxed);
        self.not_empty.set();
        if depth < self.capacity {
            self.not_full.set();
        } else {
            self.not_full.reset();
        }
        if self.flags.contains(QueueFlags::SIGNAL_ON_INSERT) {
            self.insert_signal.set();
        }
        true
    }

    /// Dequeues into `buf`. Returns `None` if empty, or if `buf` is too
    /// small to hold the message — in the latter case the message is left
    /// in place so a retry with a larger buffer succeeds.
    pub fn dequeue(&self, buf: &mut [u8]) -> Option<usize> {
        let mut guard = self.inner.lock();
        let front_len = guard.slots.front()?.len();
        if buf.len() < front_len {
            return None;
        }
        let msg = guard.slots.pop_front().unwrap();
        let depth = guard.slots.len();
        if depth == 0 {
            self.not_empty.reset();
        }
        drop(guard);

        buf[..msg.len()].copy_from_slice(&msg);
        self.dequeued.fetch_add(1, Ordering::Relaxed);
        self.not_full.set();
        Some(msg.len())
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().slots.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.inner.lock().slots.len() >= self.capacity
    }

    /// Resets head, tail and depth to zero. Counters other than depth are
    /// left unchanged. `clear(); clear()` is equivalent to one `clear()`.
    pub fn clear(&self) {
        let mut guard = self.inner.lock();
        guard.slots.clear();
        drop(guard);
        self.not_empty.reset();
        self.not_full.set();
    }

    pub fn stats(&self) -> QueueStats {
        let depth = self.inner.lock().slots.len();
        QueueStats {
            capacity: self.capacity,
            current_depth: depth,
            max_msg_size: self.max_msg_size,
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dequeued: self.dequeued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    /// Blocks the calling thread until the queue is non-empty or `timeout`
    /// elapses (`None` blocks indefinitely). Useful to a consumer thread
    /// that isn't multiplexing with a `Runtime`.
    pub fn wait_not_empty(&self, timeout: Option<Duration>) -> bool {
        if !self.is_empty() {
            return true;
        }
        self.not_empty.wait(timeout) && !self.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_producer_consumer_concurrent() {
        use std::sync::Arc;
        use std::thread;

        let q = Arc::new(Queue::new(32, 128, QueueFlags::BLOCK_WRITER));
        let producer = {
            let q = Arc::clone(&q);
            thread::spawn(move || {
                for i in 0..1000u32 {
                    assert!(q.enqueue(format!("m{i}").as_bytes()));
                }
            })
        };

        let mut buf = [0u8; 128];
        let mut received = 0u32;
        while received < 1000 {
            if let Some(n) = q.dequeue(&mut buf) {
                assert_eq!(&buf[..n], format!("m{received}").as_bytes());
                received += 1;
            } else {
                thread::yield_now();
            }
        }
        producer.join().unwrap();
        assert_eq!(q.stats().current_depth, 0);
        assert_eq!(q.stats().dropped, 0);
    }

    #[test]
    fn fifo_order_never_full() {
        let q = Queue::new(2000, 128, QueueFlags::NONE);
        for i in 0..1000u32 {
            assert!(q.enqueue(format!("m{i}").as_bytes()));
        }
        let mut buf = [0u8; 128];
        for i in 0..1000u32 {
            let n = q.dequeue(&mut buf).expect("message present");
            assert_eq!(&buf[..n], format!("m{i}").as_bytes());
        }
        let stats = q.stats();
        assert_eq!(stats.current_depth, 0);
        assert_eq!(stats.dropped, 0);
        assert_eq!(stats.enqueued, 1000);
        assert_eq!(stats.dequeued, 1000);
    }

    #[test]
    fn drop_oldest_overflow() {
        let q = Queue::new(4, 16, QueueFlags::DROP_OLDEST);
        for b in [b"A".as_ref(), b"B", b"C", b"D", b"E"] {
            assert!(q.enqueue(b));
        }
        let mut buf = [0u8; 16];
        let mut seen = Vec::new();
        while let Some(n) = q.dequeue(&mut buf) {
            seen.push(buf[..n].to_vec());
        }
        assert_eq!(seen, vec![b"B".to_vec(), b"C".to_vec(), b"D".to_vec(), b"E".to_vec()]);
        assert_eq!(q.stats().dropped, 1);
    }

    #[test]
    fn enqueue_rejects_when_full_without_overflow_flag() {
        let q = Queue::new(1, 16, QueueFlags::NONE);
        assert!(q.enqueue(b"first"));
        assert!(!q.enqueue(b"second"));
    }

    #[test]
    fn max_msg_size_boundary() {
        let q = Queue::new(4, 4, QueueFlags::NONE);
        assert!(q.enqueue(&[0u8; 4]));
        let q2 = Queue::new(4, 4, QueueFlags::NONE);
        assert!(!q2.enqueue(&[0u8; 5]));
    }

    #[test]
    fn dequeue_too_small_buffer_leaves_message_in_place() {
        let q = Queue::new(4, 16, QueueFlags::NONE);
        assert!(q.enqueue(b"hello"));
        let mut tiny = [0u8; 2];
        assert_eq!(q.dequeue(&mut tiny), None);
        let mut big = [0u8; 16];
        let n = q.dequeue(&mut big).unwrap();
        assert_eq!(&big[..n], b"hello");
    }

    #[test]
    fn clear_is_idempotent() {
        let q = Queue::new(4, 16, QueueFlags::NONE);
        q.enqueue(b"x");
        q.clear();
        q.clear();
        assert!(q.is_empty());
        assert_eq!(q.stats().current_depth, 0);
    }

    #[test]
    fn blocked_writer_wakes_on_dequeue() {
        use std::sync::Arc;
        use std::thread;

        let q = Arc::new(Queue::new(1, 16, QueueFlags::BLOCK_WRITER));
        assert!(q.enqueue(b"first"));

        let q2 = Arc::clone(&q);
        let writer = thread::spawn(move || {
            assert!(q2.enqueue(b"second"));
        });

        thread::sleep(Duration::from_millis(50));
        let mut buf = [0u8; 16];
        assert_eq!(q.dequeue(&mut buf).unwrap(), 5);
        writer.join().unwrap();
        assert_eq!(q.stats().current_depth, 1);
    }

    #[test]
    fn signal_on_insert_fires() {
        let q = Queue::new(4, 16, QueueFlags::SIGNAL_ON_INSERT);
        assert!(!q.insert_signal().is_set());
        q.enqueue(b"x");
        assert!(q.insert_signal().is_set());
    }
}
