//! The unified event-loop runtime: the heart of the core (spec §4.4).
//!
//! `Runtime` presents one API backed by three platform strategies
//! (completion-based IOCP on Windows, epoll on Linux, `poll(2)` as the
//! portable Unix fallback), mirroring how `mio::Poll` presents one API
//! backed by per-platform `sys::Selector`s (epoll/kqueue/IOCP) behind a
//! `cfg`-selected module, generalized here to a trait object so the three
//! strategies can also be unit-tested independently of `cfg(target_os)`.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::Duration;

use log::trace;

use crate::error;
use crate::event::Events;
use crate::handle::{CompletionKey, RawHandle};
use crate::interest::Interest;
use crate::sys;
use crate::token::Token;

/// Platform strategy a [`Runtime`] delegates to. One implementation per
/// backend named in spec §4.4; `Runtime` itself contains no
/// platform-specific logic beyond choosing which to construct.
pub(crate) trait Backend: Send + Sync {
    fn register(
        &self,
        handle: RawHandle,
        interest: Interest,
        token: Token,
        listening: bool,
    ) -> io::Result<()>;
    fn modify(&self, handle: RawHandle, interest: Interest, token: Token) -> io::Result<()>;
    fn unregister(&self, handle: RawHandle) -> io::Result<()>;
    fn wake_up(&self) -> io::Result<()>;
    fn post_completion(&self, key: CompletionKey, data: usize) -> io::Result<()>;
    fn wait(&self, events: &mut Events, timeout: Option<Duration>) -> io::Result<usize>;
    /// Pre-posts a write of `data` on the completion-based backend; a
    /// no-op on the readiness-based backends, where the caller performs
    /// the write itself once it observes writable readiness (spec §4.4,
    /// "Platform-Specific Helpers").
    fn post_write(&self, _handle: RawHandle, _data: &[u8]) -> io::Result<()> {
        Ok(())
    }
}

/// Registers I/O sources and posts worker completions. Cheaply cloneable;
/// every clone shares the same underlying backend (mirrors `mio::Registry`
/// wrapping `Arc<sys::Selector>`).
#[derive(Clone)]
pub struct Registry {
    backend: Arc<dyn Backend>,
}

impl Registry {
    /// Registers a connection-oriented endpoint. A handle may not be
    /// registered twice without an intervening `unregister`.
    pub fn register(&self, handle: RawHandle, interest: Interest, token: Token) -> io::Result<()> {
        trace!("registering handle with runtime");
        self.backend.register(handle, interest, token, false)
    }

    /// Registers a listening endpoint. Its readability means "a new
    /// connection is pending" (spec §4.1): on the completion-based backend
    /// the runtime pre-accepts on a dedicated helper thread and delivers
    /// the accepted handle as the event's primary handle; on the
    /// readiness-based backends this is equivalent to `register` and the
    /// caller performs the accept itself once notified.
    pub fn register_listener(
        &self,
        handle: RawHandle,
        token: Token,
    ) -> io::Result<()> {
        trace!("registering listening endpoint with runtime");
        self.backend
            .register(handle, Interest::READABLE, token, true)
    }

    /// Changes the interest mask (and/or token) for an already-registered
    /// handle. On the completion-based backend this is advisory only:
    /// interest there is implicitly managed by whether a read or write is
    /// currently posted (spec §9, Open Questions resolution).
    pub fn modify(&self, handle: RawHandle, interest: Interest, token: Token) -> io::Result<()> {
        self.backend.modify(handle, interest, token)
    }

    /// Detaches a handle. Pending operations associated with it are
    /// cancelled or reaped; the runtime never closes the handle itself.
    pub fn unregister(&self, handle: RawHandle) -> io::Result<()> {
        trace!("unregistering handle from runtime");
        self.backend.unregister(handle)
    }

    /// Causes any concurrent or next `wait` to return promptly, with zero
    /// events if nothing else is pending. Safe from any thread.
    pub fn wake_up(&self) -> io::Result<()> {
        self.backend.wake_up()
    }

    /// Enqueues a worker-originated completion carrying `key` and `data`.
    /// Safe from any thread.
    pub fn post_completion(&self, key: CompletionKey, data: usize) -> io::Result<()> {
        self.backend.post_completion(key, data)
    }

    /// Pre-posts a write on the completion-based backend; a no-op
    /// elsewhere.
    pub fn post_write(&self, handle: RawHandle, data: &[u8]) -> io::Result<()> {
        self.backend.post_write(handle, data)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry").finish()
    }
}

/// The event-loop runtime. One instance per process; construct before
/// registering any endpoint or worker bound to it, destroy only after all
/// are unregistered.
///
/// `wait` may be called from exactly one thread for the life of the
/// runtime (spec §4.4, "Single-caller invariant"); violating this is
/// undefined behavior in the three backends this wraps, so in debug
/// builds `Runtime` fails fast instead of silently corrupting state.
pub struct Runtime {
    registry: Registry,
    waiter: Mutex<Option<ThreadId>>,
    in_wait: AtomicBool,
}

impl Runtime {
    /// Constructs a runtime, allocating backend-specific demultiplexer
    /// resources and a wake-up channel.
    pub fn new() -> io::Result<Runtime> {
        let backend = sys::new_backend()?;
        Ok(Runtime {
            registry: Registry {
                backend: Arc::from(backend),
            },
            waiter: Mutex::new(None),
            in_wait: AtomicBool::new(false),
        })
    }

    /// A cheaply-cloneable handle for registering endpoints and posting
    /// completions from other threads.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// See [`Registry::register`].
    pub fn register(&self, handle: RawHandle, interest: Interest, token: Token) -> io::Result<()> {
        self.registry.register(handle, interest, token)
    }

    /// See [`Registry::register_listener`].
    pub fn register_listener(&self, handle: RawHandle, token: Token) -> io::Result<()> {
        self.registry.register_listener(handle, token)
    }

    /// See [`Registry::modify`].
    pub fn modify(&self, handle: RawHandle, interest: Interest, token: Token) -> io::Result<()> {
        self.registry.modify(handle, interest, token)
    }

    /// See [`Registry::unregister`].
    pub fn unregister(&self, handle: RawHandle) -> io::Result<()> {
        self.registry.unregister(handle)
    }

    /// See [`Registry::wake_up`].
    pub fn wake_up(&self) -> io::Result<()> {
        self.registry.wake_up()
    }

    /// See [`Registry::post_completion`].
    pub fn post_completion(&self, key: CompletionKey, data: usize) -> io::Result<()> {
        self.registry.post_completion(key, data)
    }

    /// See [`Registry::post_write`].
    pub fn post_write(&self, handle: RawHandle, data: &[u8]) -> io::Result<()> {
        self.registry.post_write(handle, data)
    }

    /// Blocks until events are available, `timeout` elapses, or
    /// `wake_up`/`post_completion` is called from another thread. Returns
    /// the number of events pushed into `events` (also `events.len()`).
    ///
    /// `timeout` of `None` blocks indefinitely; `Some(Duration::ZERO)`
    /// polls and returns immediately.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if called concurrently from a second
    /// thread while another call is in flight (spec's single-caller
    /// invariant). In release builds this check is skipped and the
    /// violation is the caller's undefined behavior, per spec.
    pub fn wait(&self, events: &mut Events, timeout: Option<Duration>) -> io::Result<usize> {
        self.enter_wait()?;
        events.clear();
        let result = self.registry.backend.wait(events, timeout);
        self.exit_wait();
        result
    }

    fn enter_wait(&self) -> io::Result<()> {
        if self.in_wait.swap(true, Ordering::SeqCst) {
            debug_assert!(
                false,
                "Runtime::wait called concurrently from a second thread"
            );
            return Err(error::invalid_input(
                "Runtime::wait is already in flight on another thread",
            ));
        }
        let mut waiter = self.waiter.lock().unwrap();
        *waiter = Some(thread::current().id());
        Ok(())
    }

    fn exit_wait(&self) {
        self.in_wait.store(false, Ordering::SeqCst);
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime").finish()
    }
}
