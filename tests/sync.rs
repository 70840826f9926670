//! Direct coverage of the sync primitives, independent of the event loop.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use nightshift::{Mutex, ResetMode, SyncEvent};

#[test]
fn mutex_excludes_concurrent_access() {
    let counter = Arc::new(Mutex::new(0u64));
    let mut handles = Vec::new();
    for _ in 0..8 {
        let counter = Arc::clone(&counter);
        handles.push(thread::spawn(move || {
            for _ in 0..1000 {
                *counter.lock() += 1;
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(*counter.lock(), 8000);
}

#[test]
fn mutex_recovers_from_a_poisoned_lock() {
    let m = Arc::new(Mutex::new(String::from("ok")));
    let m2 = Arc::clone(&m);
    let _ = thread::spawn(move || {
        let _guard = m2.lock();
        panic!("deliberate panic to poison the inner std mutex");
    })
    .join();

    // The wrapper recovers the inner value rather than propagating the
    // poison to every subsequent caller.
    assert_eq!(&*m.lock(), "ok");
}

#[test]
fn manual_reset_event_stays_signaled_until_reset() {
    let ev = SyncEvent::new(ResetMode::Manual, false);
    assert!(!ev.is_set());
    ev.set();
    assert!(ev.wait(Some(Duration::ZERO)));
    assert!(ev.wait(Some(Duration::ZERO)));
    ev.reset();
    assert!(!ev.is_set());
}

#[test]
fn auto_reset_event_clears_on_first_observation() {
    let ev = Arc::new(SyncEvent::new(ResetMode::Auto, false));
    ev.set();
    assert!(ev.wait(Some(Duration::ZERO)));
    assert!(!ev.is_set());
}

#[test]
fn wait_times_out_without_spurious_true() {
    let ev = SyncEvent::new(ResetMode::Manual, false);
    let start = std::time::Instant::now();
    assert!(!ev.wait(Some(Duration::from_millis(40))));
    assert!(start.elapsed() >= Duration::from_millis(35));
}

#[test]
fn auto_reset_event_wakes_exactly_one_waiter() {
    let ev = Arc::new(SyncEvent::new(ResetMode::Auto, false));
    let woken = Arc::new(Mutex::new(0u32));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let ev = Arc::clone(&ev);
        let woken = Arc::clone(&woken);
        handles.push(thread::spawn(move || {
            if ev.wait(Some(Duration::from_millis(500))) {
                *woken.lock() += 1;
            }
        }));
    }

    thread::sleep(Duration::from_millis(50));
    ev.set();

    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(*woken.lock(), 1);
}
