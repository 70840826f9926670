//! Worker thread lifecycle: cooperative cancellation, state reporting,
//! join-with-timeout.
//!
//! Grounded on `async_worker.h`/`async_worker_pthread.c`: a thread bound to
//! a user procedure, a manual-reset stop event the procedure is expected
//! to poll, and a thread-local slot publishing "the worker currently
//! executing" for the duration of the procedure's frame.

use std::cell::RefCell;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{trace, warn};

use crate::sync::{ResetMode, SyncEvent};

/// A worker's lifecycle state.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[repr(u8)]
pub enum WorkerState {
    Stopped = 0,
    Running = 1,
    Stopping = 2,
}

impl WorkerState {
    fn from_u8(v: u8) -> WorkerState {
        match v {
            0 => WorkerState::Stopped,
            1 => WorkerState::Running,
            _ => WorkerState::Stopping,
        }
    }
}

struct Shared {
    state: AtomicU8,
    stop_event: SyncEvent,
}

/// A thread bound to a user procedure, with cooperative stop-signal and
/// join. Must eventually be joined; dropping a `Worker` without joining
/// leaks the underlying thread (the join handle is simply detached).
pub struct Worker {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

thread_local! {
    static CURRENT: RefCell<Option<Arc<Shared>>> = const { RefCell::new(None) };
}

impl Worker {
    /// Starts a thread that runs `proc(ctx)`. The thread publishes itself
    /// as "current" for the duration of `proc`, transitions
    /// Stopped -> Running before calling it and Running -> Stopped after
    /// it returns, then clears the thread-local. `stack_size` of `None`
    /// uses the platform default.
    pub fn spawn<F, C>(proc: F, ctx: C, stack_size: Option<usize>) -> std::io::Result<Worker>
    where
        F: FnOnce(C) + Send + 'static,
        C: Send + 'static,
    {
        let shared = Arc::new(Shared {
            state: AtomicU8::new(WorkerState::Running as u8),
            stop_event: SyncEvent::new(ResetMode::Manual, false),
        });

        let thread_shared = Arc::clone(&shared);
        let mut builder = thread::Builder::new();
        if let Some(size) = stack_size {
            builder = builder.stack_size(size);
        }

        let handle = builder.spawn(move || {
            CURRENT.with(|cell| *cell.borrow_mut() = Some(Arc::clone(&thread_shared)));
            trace!("worker thread entering procedure");

            proc(ctx);

            thread_shared
                .state
                .store(WorkerState::Stopped as u8, Ordering::SeqCst);
            CURRENT.with(|cell| *cell.borrow_mut() = None);
            trace!("worker thread exited procedure");
        })?;

        Ok(Worker {
            shared,
            handle: Some(handle),
        })
    }

    /// Asserts the worker's cancellation event. Cooperative: the worker
    /// only stops once it observes the event via `should_stop` or a
    /// multi-object wait on `stop_event`.
    pub fn signal_stop(&self) {
        let prev = self
            .shared
            .state
            .compare_exchange(
                WorkerState::Running as u8,
                WorkerState::Stopping as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .unwrap_or_else(|v| v);
        if prev == WorkerState::Stopped as u8 {
            trace!("signal_stop on already-stopped worker: no-op");
        }
        self.shared.stop_event.set();
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.shared.state.load(Ordering::SeqCst))
    }

    /// The stop event, for multi-object waits (e.g. "stdin readable OR
    /// stop requested" in one syscall).
    pub fn stop_event(&self) -> &SyncEvent {
        &self.shared.stop_event
    }

    /// Waits up to `timeout` (`None` = infinite) for the thread to reach
    /// `Stopped`. The underlying `JoinHandle::join` has no native timeout,
    /// so this polls the lifecycle state at a short fixed interval and
    /// only performs the (now instantaneous) untimed join once `Stopped`
    /// is observed.
    pub fn join(&mut self, timeout: Option<Duration>) -> bool {
        const POLL_INTERVAL: Duration = Duration::from_millis(5);

        let deadline = timeout.map(|d| Instant::now() + d);
        loop {
            if self.state() == WorkerState::Stopped {
                break;
            }
            match deadline {
                Some(deadline) if Instant::now() >= deadline => return false,
                _ => thread::sleep(POLL_INTERVAL),
            }
        }

        if let Some(handle) = self.handle.take() {
            if let Err(panic) = handle.join() {
                warn!("worker thread panicked: {panic:?}");
            }
        }
        true
    }

    /// `Some(true)`/`Some(false)` reporting whether the worker running on
    /// the calling thread has been asked to stop, or `None` if called
    /// from a non-worker context.
    pub fn current_should_stop() -> Option<bool> {
        CURRENT.with(|cell| {
            cell.borrow()
                .as_ref()
                .map(|shared| shared.state.load(Ordering::SeqCst) == WorkerState::Stopping as u8)
        })
    }

    /// Runs `f` with the stop event of the worker running on the calling
    /// thread, for callers that need to wait on it directly (e.g. as part
    /// of a multi-object wait). Returns `None` outside a worker context.
    pub fn with_current_stop_event<R>(f: impl FnOnce(&SyncEvent) -> R) -> Option<R> {
        CURRENT.with(|cell| cell.borrow().as_ref().map(|shared| f(&shared.stop_event)))
    }

    /// The worker thread's native handle, for callers on Windows that need
    /// to interrupt a blocking synchronous read via `CancelSynchronousIo`
    /// (see `console::cancel_pending_read`). `None` once the thread has
    /// already been joined.
    #[cfg(windows)]
    pub(crate) fn raw_thread_handle(&self) -> Option<std::os::windows::io::RawHandle> {
        use std::os::windows::io::AsRawHandle;
        self.handle.as_ref().map(|h| h.as_raw_handle())
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if self.handle.is_some() {
            warn!("Worker dropped without join: its thread is leaked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn lifecycle_stop_join_current() {
        let ran = Arc::new(AtomicBool::new(false));
        let ran2 = Arc::clone(&ran);

        let mut worker = Worker::spawn(
            move |_: ()| {
                while Worker::current_should_stop() != Some(true) {
                    thread::sleep(Duration::from_millis(2));
                }
                ran2.store(true, Ordering::SeqCst);
            },
            (),
            None,
        )
        .unwrap();

        worker.signal_stop();
        assert!(worker.join(Some(Duration::from_secs(2))));
        assert_eq!(worker.state(), WorkerState::Stopped);
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn join_timeout_returns_false_if_not_stopped() {
        let mut worker = Worker::spawn(
            |_: ()| {
                while Worker::current_should_stop() != Some(true) {
                    thread::sleep(Duration::from_millis(2));
                }
            },
            (),
            None,
        )
        .unwrap();

        assert!(!worker.join(Some(Duration::from_millis(20))));
        worker.signal_stop();
        assert!(worker.join(Some(Duration::from_secs(1))));
    }

    #[test]
    fn current_is_none_outside_worker() {
        assert_eq!(Worker::current_should_stop(), None);
    }
}
