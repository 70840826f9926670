use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Whether a [`SyncEvent`] wakes every current waiter and stays signaled, or
/// wakes exactly one waiter and clears itself.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ResetMode {
    /// `set` wakes all current waiters; the event remains signaled until an
    /// explicit `reset`.
    Manual,
    /// `set` wakes at most one waiter and clears atomically with that wake.
    Auto,
}

/// A binary event with manual-reset or auto-reset semantics and a timed
/// wait that never returns early on a spurious wakeup.
///
/// Grounded on `port_sync.h`'s POSIX fallback (`pthread_mutex_t` +
/// `pthread_cond_t` + `signaled` + `manual_reset`); on all platforms Rust's
/// std already abstracts the native primitive the same way, so there is no
/// platform split here the way there is for the runtime backends.
pub struct SyncEvent {
    mode: ResetMode,
    state: Mutex<bool>,
    condvar: Condvar,
}

impl SyncEvent {
    /// Creates a new event. `initial_state` is `true` if it starts
    /// signaled.
    pub fn new(mode: ResetMode, initial_state: bool) -> SyncEvent {
        SyncEvent {
            mode,
            state: Mutex::new(initial_state),
            condvar: Condvar::new(),
        }
    }

    /// Signals the event. For [`ResetMode::Manual`] this wakes every
    /// current waiter and leaves the flag set; for [`ResetMode::Auto`] it
    /// wakes at most one waiter and clears as part of that handoff.
    pub fn set(&self) {
        let mut signaled = self.state.lock().unwrap();
        *signaled = true;
        match self.mode {
            ResetMode::Manual => self.condvar.notify_all(),
            ResetMode::Auto => self.condvar.notify_one(),
        }
    }

    /// Forces the signaled flag to `false`.
    pub fn reset(&self) {
        let mut signaled = self.state.lock().unwrap();
        *signaled = false;
    }

    /// Waits for the event with the given timeout.
    ///
    /// `None` blocks indefinitely. `Some(Duration::ZERO)` polls and returns
    /// immediately. Loops internally against the signaled flag so a
    /// spurious OS wakeup never causes an early `true`/`false` flip.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        let mut signaled = self.state.lock().unwrap();
        let deadline = timeout.map(|d| Instant::now() + d);

        loop {
            if *signaled {
                if self.mode == ResetMode::Auto {
                    *signaled = false;
                }
                return true;
            }

            match deadline {
                None => {
                    signaled = self.condvar.wait(signaled).unwrap();
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    let (guard, result) = self
                        .condvar
                        .wait_timeout(signaled, deadline - now)
                        .unwrap();
                    signaled = guard;
                    if result.timed_out() && !*signaled {
                        return false;
                    }
                }
            }
        }
    }

    /// Non-blocking check; equivalent to `wait(Some(Duration::ZERO))`.
    pub fn is_set(&self) -> bool {
        self.wait(Some(Duration::ZERO))
    }
}
