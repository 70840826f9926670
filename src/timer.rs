//! Periodic timer: fires a user callback every *N* microseconds on a
//! dedicated thread.
//!
//! Grounded on `posix_timer.c`/`win32_timer.c`'s drift-correction pattern:
//! rather than sleeping for `interval` after each tick (which accumulates
//! callback latency as drift), the next deadline is computed as
//! `start + n * interval`, and catch-up after an overrun is bounded to one
//! interval (a slow callback causes a skipped tick, never a burst of
//! queued ones).

use std::sync::Arc;
use std::time::Duration;

use log::{trace, warn};

use crate::sync::{ResetMode, SyncEvent};
use crate::worker::Worker;

/// A periodic timer bound to a single callback, running on its own
/// thread. Unlike `posix_timer.c`'s `static timer_callback_t` singleton
/// (re-architected per spec §9: "prefer a per-timer-instance closure"),
/// each `Timer` owns its callback independently, so multiple timers can
/// coexist.
pub struct Timer {
    worker: Worker,
}

impl Timer {
    /// Starts a timer armed immediately, firing `callback` roughly every
    /// `interval` until `stop` is called. Callbacks never overlap: if
    /// `callback` runs longer than `interval`, one or more subsequent
    /// ticks are skipped rather than queued.
    pub fn start<F>(interval: Duration, mut callback: F) -> Timer
    where
        F: FnMut() + Send + 'static,
    {
        assert!(!interval.is_zero(), "timer interval must be non-zero");

        let worker = Worker::spawn(
            move |_: ()| {
                let start = std::time::Instant::now();
                let mut tick: u32 = 0;
                loop {
                    tick += 1;
                    let deadline = start + interval * tick;
                    let now = std::time::Instant::now();
                    let remaining = deadline.saturating_duration_since(now);

                    let should_stop =
                        Worker::with_current_stop_event(|ev| ev.wait(Some(remaining)))
                            .unwrap_or(true);
                    if should_stop {
                        trace!("timer worker observed stop request");
                        return;
                    }

                    // We may have woken up early due to a spurious return
                    // from `wait` timing out slightly before `deadline`;
                    // `SyncEvent::wait` already loops internally so this
                    // only happens once the deadline has truly passed.
                    callback();

                    // Bound catch-up to one interval: if the callback ran
                    // long enough that we're already past the *next*
                    // deadline too, skip forward instead of firing a
                    // burst of queued callbacks.
                    let now = std::time::Instant::now();
                    while start + interval * (tick + 1) <= now {
                        tick += 1;
                        warn!("timer callback overran its interval; skipping a tick");
                    }
                }
            },
            (),
            None,
        )
        .expect("failed to spawn timer thread");

        Timer { worker }
    }

    /// Stops the timer and joins its thread. Blocks until any in-flight
    /// callback invocation returns.
    pub fn stop(mut self) {
        self.worker.signal_stop();
        self.worker.join(None);
    }
}

/// The heartbeat facility: a flag the main loop polls once per iteration,
/// set by a dedicated [`Timer`] thread on a fixed period. This is the
/// reference external completion source named in spec §2.
pub struct Heartbeat {
    timer: Option<Timer>,
    fired: Arc<SyncEvent>,
}

impl Heartbeat {
    /// Starts a heartbeat that sets its flag every `interval`.
    pub fn start(interval: Duration) -> Heartbeat {
        let fired = Arc::new(SyncEvent::new(ResetMode::Manual, false));
        let fired_for_timer = Arc::clone(&fired);
        let timer = Timer::start(interval, move || fired_for_timer.set());
        Heartbeat {
            timer: Some(timer),
            fired,
        }
    }

    /// True if a heartbeat has fired since the last `consume`.
    pub fn is_due(&self) -> bool {
        self.fired.is_set()
    }

    /// Observes and clears the pending-heartbeat flag. Call once per main
    /// loop iteration.
    pub fn consume(&self) -> bool {
        let due = self.fired.is_set();
        if due {
            self.fired.reset();
        }
        due
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    #[test]
    fn fires_approximately_on_schedule() {
        let count = Arc::new(AtomicU32::new(0));
        let count2 = Arc::clone(&count);
        let timer = Timer::start(Duration::from_millis(20), move || {
            count2.fetch_add(1, Ordering::SeqCst);
        });

        std::thread::sleep(Duration::from_millis(110));
        timer.stop();

        let n = count.load(Ordering::SeqCst);
        assert!((3..=8).contains(&n), "expected roughly 5 ticks, got {n}");
    }

    #[test]
    fn heartbeat_consume_clears_flag() {
        let hb = Heartbeat::start(Duration::from_millis(10));
        let start = Instant::now();
        while !hb.is_due() && start.elapsed() < Duration::from_secs(2) {
            std::thread::sleep(Duration::from_millis(2));
        }
        assert!(hb.consume());
        assert!(!hb.is_due());
    }
}
