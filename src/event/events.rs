use crate::event::Event;

use std::fmt;
use std::slice;

/// A batch of events filled in by [`Runtime::wait`].
///
/// Reused across calls the way `mio::Events` is: construct once outside the
/// main loop, pass `&mut events` to every `wait` call. The runtime clears it
/// and pushes newly observed events onto the end, up to `capacity()`.
///
/// [`Runtime::wait`]: crate::Runtime::wait
pub struct Events {
    inner: Vec<Event>,
    capacity: usize,
}

impl Events {
    /// Creates an `Events` able to hold up to `capacity` events per `wait`
    /// call.
    pub fn with_capacity(capacity: usize) -> Events {
        Events {
            inner: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Maximum number of events a single `wait` call will push into this
    /// buffer.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of events currently held.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Drops all events, retaining the underlying allocation.
    pub fn clear(&mut self) {
        self.inner.clear();
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            inner: self.inner.iter(),
        }
    }

    pub(crate) fn push(&mut self, event: Event) {
        self.inner.push(event);
    }

    pub(crate) fn is_full(&self) -> bool {
        self.inner.len() >= self.capacity
    }
}

impl fmt::Debug for Events {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.inner.iter()).finish()
    }
}

/// [`Events`] iterator, see [`Events::iter`].
pub struct Iter<'a> {
    inner: slice::Iter<'a, Event>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Event;

    fn next(&mut self) -> Option<&'a Event> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a> IntoIterator for &'a Events {
    type Item = &'a Event;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}
