//! Integration coverage of `Worker` composed with other primitives, beyond
//! the lifecycle unit tests already in `src/worker.rs`.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use nightshift::{Queue, QueueFlags, Worker};

#[test]
fn worker_feeds_a_queue_until_stopped() {
    let queue = Arc::new(Queue::new(64, 32, QueueFlags::SIGNAL_ON_INSERT));
    let produced = Arc::new(AtomicU32::new(0));

    struct Ctx {
        queue: Arc<Queue>,
        produced: Arc<AtomicU32>,
    }

    let ctx = Ctx {
        queue: Arc::clone(&queue),
        produced: Arc::clone(&produced),
    };

    let mut worker = Worker::spawn(
        |ctx: Ctx| {
            let mut n = 0u32;
            while Worker::current_should_stop() != Some(true) {
                ctx.queue.enqueue(format!("tick{n}").as_bytes());
                ctx.produced.fetch_add(1, Ordering::SeqCst);
                n += 1;
                thread::sleep(Duration::from_millis(2));
            }
        },
        ctx,
        None,
    )
    .unwrap();

    thread::sleep(Duration::from_millis(50));
    worker.signal_stop();
    assert!(worker.join(Some(Duration::from_secs(2))));

    assert!(produced.load(Ordering::SeqCst) > 0);
    assert!(!queue.is_empty());
}

#[test]
fn multiple_workers_stop_independently() {
    let mut workers: Vec<Worker> = (0..4)
        .map(|_| {
            Worker::spawn(
                |_: ()| {
                    while Worker::current_should_stop() != Some(true) {
                        thread::sleep(Duration::from_millis(2));
                    }
                },
                (),
                None,
            )
            .unwrap()
        })
        .collect();

    // Stop only the first two; the rest should remain running.
    workers[0].signal_stop();
    workers[1].signal_stop();
    assert!(workers[0].join(Some(Duration::from_secs(1))));
    assert!(workers[1].join(Some(Duration::from_secs(1))));

    assert_eq!(workers[2].state(), nightshift::WorkerState::Running);
    assert_eq!(workers[3].state(), nightshift::WorkerState::Running);

    workers[2].signal_stop();
    workers[3].signal_stop();
    assert!(workers[2].join(Some(Duration::from_secs(1))));
    assert!(workers[3].join(Some(Duration::from_secs(1))));
}

#[test]
fn stop_event_is_observable_for_multi_object_waits() {
    let mut worker = Worker::spawn(
        |_: ()| {
            loop {
                let should_stop =
                    Worker::with_current_stop_event(|ev| ev.wait(Some(Duration::from_millis(10))))
                        .unwrap();
                if should_stop {
                    return;
                }
            }
        },
        (),
        None,
    )
    .unwrap();

    worker.signal_stop();
    assert!(worker.join(Some(Duration::from_secs(2))));
}
