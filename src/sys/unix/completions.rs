//! Side queue carrying worker-posted completions and wake-up markers.
//!
//! `eventfd`/pipe notifiers only carry "something happened, go check",
//! not an arbitrary payload per write (an `eventfd` in particular
//! coalesces concurrent writes into a running sum, so two `post_completion`
//! calls racing each other cannot be told apart from the counter value
//! alone). The actual `(key, data)` pairs queue here; the notifier is
//! purely the "wake epoll_wait/poll" signal. `post_completion`'s ordering
//! guarantee (one worker's successive posts observed in issue order) is
//! preserved because both the push and the notifier write happen while
//! holding this queue's lock-free-at-use-site `Mutex`, in that order, and
//! the consumer drains in push order.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::handle::CompletionKey;

#[derive(Clone, Copy)]
pub enum Posted {
    Completion { key: CompletionKey, data: usize },
    WakeUp,
}

#[derive(Default)]
pub struct CompletionQueue {
    inner: Mutex<VecDeque<Posted>>,
}

impl CompletionQueue {
    pub fn new() -> CompletionQueue {
        CompletionQueue {
            inner: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push(&self, item: Posted) {
        self.inner.lock().unwrap().push_back(item);
    }

    pub fn drain_into(&self, out: &mut Vec<Posted>) {
        let mut guard = self.inner.lock().unwrap();
        out.extend(guard.drain(..));
    }
}
