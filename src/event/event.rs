use crate::event::EventFlags;
use crate::handle::{CompletionKey, RawHandle};
use crate::Token;

use std::fmt;

/// One record returned by [`Runtime::wait`].
///
/// Exactly one of the two shapes below is ever populated for a given
/// `Event`: an I/O event (readiness or, on the completion-based backend, a
/// completed read/write/accept) or a worker completion. Mixing the two
/// shapes in one record is forbidden by the runtime contract, which is why
/// this is an `enum` rather than a struct of optional fields.
///
/// [`Runtime::wait`]: crate::Runtime::wait
pub enum Event {
    /// A connection-oriented or listening endpoint produced readiness (or,
    /// on the completion-based backend, bytes already transferred).
    Io {
        /// The endpoint's handle. On the completion-based backend, a
        /// listening endpoint's accept event carries the already-accepted
        /// handle here rather than the listening handle (spec §9).
        handle: RawHandle,
        /// The token supplied at `register` time for this handle.
        token: Token,
        /// readable / writable / error / closed, combinable.
        flags: EventFlags,
        /// Populated only on the completion-based backend, for completed
        /// reads.
        bytes_transferred: Option<usize>,
        /// Populated only on the completion-based backend. Valid until the
        /// event is consumed, after which the runtime returns the backing
        /// operation context to its pool.
        buffer: Option<Box<[u8]>>,
    },
    /// A worker thread called `post_completion`, or `wake_up` fired.
    Completion {
        /// Nonzero for worker-sourced events; the wake-up sentinel key for
        /// events produced by `wake_up`.
        key: CompletionKey,
        /// Opaque payload passed to `post_completion` (0 for `wake_up`).
        data: usize,
    },
}

impl Event {
    /// True for the `Io` shape.
    pub fn is_io(&self) -> bool {
        matches!(self, Event::Io { .. })
    }

    /// True for the `Completion` shape.
    pub fn is_completion(&self) -> bool {
        matches!(self, Event::Completion { .. })
    }

    /// The endpoint handle, if this is an `Io` event.
    pub fn handle(&self) -> Option<RawHandle> {
        match self {
            Event::Io { handle, .. } => Some(*handle),
            Event::Completion { .. } => None,
        }
    }

    /// The registration token, if this is an `Io` event.
    pub fn token(&self) -> Option<Token> {
        match self {
            Event::Io { token, .. } => Some(*token),
            Event::Completion { .. } => None,
        }
    }

    /// The completion key and payload, if this is a `Completion` event.
    pub fn completion(&self) -> Option<(CompletionKey, usize)> {
        match self {
            Event::Completion { key, data } => Some((*key, *data)),
            Event::Io { .. } => None,
        }
    }

    pub fn is_readable(&self) -> bool {
        matches!(self, Event::Io { flags, .. } if flags.is_readable())
    }

    pub fn is_writable(&self) -> bool {
        matches!(self, Event::Io { flags, .. } if flags.is_writable())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Event::Io { flags, .. } if flags.is_error())
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Event::Io { flags, .. } if flags.is_closed())
    }

    pub fn bytes_transferred(&self) -> Option<usize> {
        match self {
            Event::Io {
                bytes_transferred, ..
            } => *bytes_transferred,
            Event::Completion { .. } => None,
        }
    }

    pub fn buffer(&self) -> Option<&[u8]> {
        match self {
            Event::Io { buffer, .. } => buffer.as_deref(),
            Event::Completion { .. } => None,
        }
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Io {
                handle,
                token,
                flags,
                bytes_transferred,
                ..
            } => f
                .debug_struct("Event::Io")
                .field("handle", handle)
                .field("token", token)
                .field("flags", flags)
                .field("bytes_transferred", bytes_transferred)
                .finish(),
            Event::Completion { key, data } => f
                .debug_struct("Event::Completion")
                .field("key", key)
                .field("data", data)
                .finish(),
        }
    }
}
