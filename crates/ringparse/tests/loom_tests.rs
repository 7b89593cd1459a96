//! Loom-based concurrency tests for the slot handoff protocol.
//!
//! Run with: `cargo test --features loom --test loom_tests --release`
//!
//! The models below mirror the parser's synchronisation in isolation: slot
//! tags behind a mutex, payloads outside it, a condition variable per
//! direction, and a lock-free cancellation flag.

#![cfg(feature = "loom")]

use loom::cell::UnsafeCell;
use loom::sync::atomic::{AtomicBool, Ordering};
use loom::sync::{Arc, Condvar, Mutex};
use loom::thread;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Tag {
    Empty,
    Local,
    Foreign,
}

struct Tags {
    states: [Tag; 2],
    committed: usize,
    retrieved: usize,
    closed: bool,
}

/// Two-slot model of the ring. Capacity is kept tiny so loom's exhaustive
/// search stays tractable.
struct LoomRing {
    tags: Mutex<Tags>,
    slot_freed: Condvar,
    slot_ready: Condvar,
    payload: [UnsafeCell<u64>; 2],
}

unsafe impl Send for LoomRing {}
unsafe impl Sync for LoomRing {}

impl LoomRing {
    fn new() -> Self {
        Self {
            tags: Mutex::new(Tags {
                states: [Tag::Empty; 2],
                committed: 0,
                retrieved: 0,
                closed: false,
            }),
            slot_freed: Condvar::new(),
            slot_ready: Condvar::new(),
            payload: [UnsafeCell::new(0), UnsafeCell::new(0)],
        }
    }

    /// Producer: acquire, write payload outside the lock, commit.
    fn produce(&self, value: u64) -> bool {
        let index = {
            let mut tags = self.tags.lock().unwrap();
            loop {
                if tags.closed {
                    return false;
                }
                let index = tags.committed % 2;
                if tags.states[index] == Tag::Empty {
                    tags.states[index] = Tag::Local;
                    break index;
                }
                tags = self.slot_freed.wait(tags).unwrap();
            }
        };

        self.payload[index].with_mut(|p| unsafe { *p = value });

        let mut tags = self.tags.lock().unwrap();
        assert_eq!(tags.states[index], Tag::Local);
        tags.states[index] = Tag::Foreign;
        tags.committed += 1;
        self.slot_ready.notify_all();
        true
    }

    /// Consumer: wait for a committed slot, read payload outside the lock, release.
    fn consume(&self, keep_running: &AtomicBool) -> Option<u64> {
        let index = {
            let mut tags = self.tags.lock().unwrap();
            loop {
                if !keep_running.load(Ordering::Acquire) {
                    return None;
                }
                if tags.retrieved < tags.committed {
                    let index = tags.retrieved % 2;
                    assert_eq!(tags.states[index], Tag::Foreign);
                    tags.retrieved += 1;
                    break index;
                }
                tags = self.slot_ready.wait(tags).unwrap();
            }
        };

        let value = self.payload[index].with(|p| unsafe { *p });

        let mut tags = self.tags.lock().unwrap();
        tags.states[index] = Tag::Empty;
        self.slot_freed.notify_all();
        Some(value)
    }

    fn cancel(&self, keep_running: &AtomicBool) {
        keep_running.store(false, Ordering::Release);
        let mut tags = self.tags.lock().unwrap();
        tags.closed = true;
        self.slot_freed.notify_all();
        self.slot_ready.notify_all();
    }
}

/// Three records through two slots: the producer must wait for a release
/// and the consumer must see commit order.
#[test]
fn loom_handoff_preserves_order() {
    loom::model(|| {
        let ring = Arc::new(LoomRing::new());
        let keep_running = Arc::new(AtomicBool::new(true));

        let producer_ring = Arc::clone(&ring);
        let producer = thread::spawn(move || {
            for v in 1..=3 {
                assert!(producer_ring.produce(v));
            }
        });

        let mut received = Vec::new();
        for _ in 0..3 {
            received.push(ring.consume(&keep_running).unwrap());
        }

        producer.join().unwrap();
        assert_eq!(received, vec![1, 2, 3]);
    });
}

/// A consumer waiting for an example that never comes is released by cancel.
#[test]
fn loom_cancel_wakes_waiting_consumer() {
    loom::model(|| {
        let ring = Arc::new(LoomRing::new());
        let keep_running = Arc::new(AtomicBool::new(true));

        let consumer_ring = Arc::clone(&ring);
        let consumer_flag = Arc::clone(&keep_running);
        let consumer = thread::spawn(move || consumer_ring.consume(&consumer_flag));

        ring.cancel(&keep_running);

        assert_eq!(consumer.join().unwrap(), None);
    });
}

/// A producer blocked on a full ring is released by cancel.
#[test]
fn loom_cancel_wakes_blocked_producer() {
    loom::model(|| {
        let ring = Arc::new(LoomRing::new());
        let keep_running = Arc::new(AtomicBool::new(true));

        assert!(ring.produce(1));
        assert!(ring.produce(2));

        let producer_ring = Arc::clone(&ring);
        let producer = thread::spawn(move || producer_ring.produce(3));

        ring.cancel(&keep_running);

        assert!(!producer.join().unwrap());
    });
}
