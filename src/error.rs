use std::io;

/// Builds an `io::Error` for a caller-supplied argument that violates a
/// precondition (null handle, zero capacity, duplicate registration, ...).
///
/// Matches the "invalid-argument" kind from the error taxonomy: returned
/// synchronously, no side effects.
pub(crate) fn invalid_input(msg: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, msg)
}

/// Builds an `io::Error` for a handle that is already registered.
pub(crate) fn already_registered() -> io::Error {
    io::Error::new(io::ErrorKind::AlreadyExists, "handle already registered")
}

/// Builds an `io::Error` for a handle that was never registered (or was
/// already unregistered).
pub(crate) fn not_registered() -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, "handle not registered")
}

/// Builds an `io::Error` for resource exhaustion (allocation failure,
/// descriptor-table full). Not recoverable by retry at this layer.
pub(crate) fn resource_exhausted(msg: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::OutOfMemory, msg)
}
