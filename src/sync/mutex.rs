use std::sync::{self, TryLockError};

/// A non-recursive, non-timed mutex.
///
/// Thin wrapper over [`std::sync::Mutex`] under the same contract the core
/// assumes everywhere it takes a lock: held only for durations bounded by a
/// few memcpys and counter increments, never across a blocking call. Unlike
/// the original's `CRITICAL_SECTION`/`pthread_mutex_t` pair this needs no
/// platform split — `std::sync::Mutex` already picks the right native
/// primitive per platform.
pub struct Mutex<T: ?Sized> {
    inner: sync::Mutex<T>,
}

pub use std::sync::MutexGuard;

impl<T> Mutex<T> {
    pub fn new(value: T) -> Mutex<T> {
        Mutex {
            inner: sync::Mutex::new(value),
        }
    }
}

impl<T: ?Sized> Mutex<T> {
    /// Blocks until the lock is acquired.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Acquires the lock if it is immediately available; never blocks.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        match self.inner.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::WouldBlock) => None,
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
        }
    }
}
