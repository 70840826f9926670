pub(crate) mod completions;
pub(crate) mod selector;
pub(crate) mod waker;

use std::io;

use crate::poll::Backend;

/// Picks `epoll` where available, falling back to `poll(2)` elsewhere, per
/// spec §4.4's backend selection ("epoll on Linux... `poll(2)` as the
/// portable fallback on Unix platforms without epoll").
#[cfg(target_os = "linux")]
pub(crate) fn new_backend() -> io::Result<Box<dyn Backend>> {
    selector::epoll::EpollBackend::new().map(|b| Box::new(b) as Box<dyn Backend>)
}

#[cfg(all(unix, not(target_os = "linux")))]
pub(crate) fn new_backend() -> io::Result<Box<dyn Backend>> {
    selector::poll::PollBackend::new().map(|b| Box::new(b) as Box<dyn Backend>)
}
