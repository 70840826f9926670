//! Integration coverage of the queue under real cross-thread producer and
//! consumer pressure, as opposed to the single-threaded edge cases already
//! covered by the unit tests inside `src/queue.rs`.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use nightshift::{Queue, QueueFlags};

#[test]
fn signal_on_insert_lets_a_consumer_thread_multiplex_without_polling() {
    let q = Arc::new(Queue::new(16, 64, QueueFlags::SIGNAL_ON_INSERT));

    let consumer = {
        let q = Arc::clone(&q);
        thread::spawn(move || {
            let mut received = Vec::new();
            while received.len() < 5 {
                if q.insert_signal().wait(Some(Duration::from_secs(2))) {
                    q.insert_signal().reset();
                    let mut buf = [0u8; 64];
                    while let Some(n) = q.dequeue(&mut buf) {
                        received.push(buf[..n].to_vec());
                    }
                }
            }
            received
        })
    };

    thread::sleep(Duration::from_millis(20));
    for i in 0..5u32 {
        assert!(q.enqueue(format!("msg{i}").as_bytes()));
    }

    let received = consumer.join().unwrap();
    assert_eq!(received.len(), 5);
    for (i, msg) in received.iter().enumerate() {
        assert_eq!(msg, format!("msg{i}").as_bytes());
    }
}

#[test]
fn drop_oldest_under_concurrent_producers_never_exceeds_capacity() {
    let q = Arc::new(Queue::new(8, 32, QueueFlags::DROP_OLDEST));
    let mut producers = Vec::new();
    for p in 0..4 {
        let q = Arc::clone(&q);
        producers.push(thread::spawn(move || {
            for i in 0..200u32 {
                assert!(q.enqueue(format!("p{p}-{i}").as_bytes()));
            }
        }));
    }
    for p in producers {
        p.join().unwrap();
    }

    assert!(q.stats().current_depth <= 8);
    assert!(q.stats().dropped > 0);
    assert_eq!(q.stats().enqueued, q.stats().dropped + q.stats().current_depth as u64);
}

#[test]
fn block_writer_applies_backpressure_without_losing_messages() {
    let q = Arc::new(Queue::new(4, 32, QueueFlags::BLOCK_WRITER));
    let producer = {
        let q = Arc::clone(&q);
        thread::spawn(move || {
            for i in 0..50u32 {
                assert!(q.enqueue(format!("m{i}").as_bytes()));
            }
        })
    };

    let mut buf = [0u8; 32];
    let mut received = 0u32;
    while received < 50 {
        if let Some(n) = q.dequeue(&mut buf) {
            assert_eq!(&buf[..n], format!("m{received}").as_bytes());
            received += 1;
        } else {
            thread::sleep(Duration::from_millis(1));
        }
    }
    producer.join().unwrap();
    assert_eq!(q.stats().dropped, 0);
    assert_eq!(q.stats().enqueued, 50);
    assert_eq!(q.stats().dequeued, 50);
}
