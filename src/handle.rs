//! The OS handle type events and registrations are expressed in terms of.
//!
//! On Unix this is a raw file descriptor; on Windows a raw `SOCKET`. The
//! runtime never closes these on the caller's behalf (spec: "the core never
//! closes the underlying handle").

#[cfg(unix)]
pub type RawHandle = std::os::unix::io::RawFd;

#[cfg(windows)]
pub type RawHandle = std::os::windows::io::RawSocket;

#[cfg(not(any(unix, windows)))]
pub type RawHandle = usize;

/// An opaque, nonzero key identifying a class of worker-originated
/// completions (e.g. "console line available"). Zero is reserved and never
/// produced by [`Runtime::post_completion`].
///
/// [`Runtime::post_completion`]: crate::Runtime::post_completion
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct CompletionKey(pub std::num::NonZeroUsize);

impl CompletionKey {
    pub const fn new(key: usize) -> Option<CompletionKey> {
        match std::num::NonZeroUsize::new(key) {
            Some(k) => Some(CompletionKey(k)),
            None => None,
        }
    }

    pub const fn get(self) -> usize {
        self.0.get()
    }
}

/// Reserved key for the wake-up channel's own completion, produced when a
/// backend translates a bare [`Registry::wake_up`] call into an
/// [`Event::Completion`] rather than silently swallowing it. Distinct from
/// any key an application can construct via [`CompletionKey::new`], since
/// `usize::MAX` is never handed out to [`Registry::post_completion`]
/// callers by convention enforced here, not by the type.
///
/// [`Registry::wake_up`]: crate::poll::Registry::wake_up
/// [`Registry::post_completion`]: crate::poll::Registry::post_completion
/// [`Event::Completion`]: crate::event::Event::Completion
pub const WAKE_COMPLETION_KEY: CompletionKey = match CompletionKey::new(usize::MAX) {
    Some(k) => k,
    None => unreachable!(),
};

/// Reserved key for console-worker completions (spec §6: "distinct from any
/// I/O completion key and from the wake-up sentinel").
pub const CONSOLE_COMPLETION_KEY: CompletionKey = match CompletionKey::new(usize::MAX - 1) {
    Some(k) => k,
    None => unreachable!(),
};
