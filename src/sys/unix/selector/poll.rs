//! Backend C: the portable `poll(2)` fallback for Unix platforms without
//! `epoll` (spec §4.4, Backend C).
//!
//! Grounded on `mio::sys::unix::selector::poll` for the linear-scan
//! registration table shape, generalized with the same side
//! [`CompletionQueue`] the epoll backend uses so both readiness-based
//! backends share one completion-delivery story.

use std::io;
use std::os::unix::io::RawFd;
use std::sync::Mutex;
use std::time::Duration;

use log::{trace, warn};

use crate::error;
use crate::event::{Event, EventFlags, Events};
use crate::handle::{RawHandle, WAKE_COMPLETION_KEY};
use crate::interest::Interest;
use crate::poll::Backend;
use crate::sys::unix::completions::{CompletionQueue, Posted};
use crate::sys::unix::waker::pipe::Pipe;
use crate::token::Token;

/// Upper bound on simultaneously registered handles; the array grows by
/// doubling from an initial small size up to this cap, past which
/// registration fails rather than growing unbounded (spec §4.4, Backend C).
const MAX_REGISTRATIONS: usize = 4096;

struct Slot {
    fd: RawFd,
    token: Token,
    interest: Interest,
}

pub struct PollBackend {
    waker: Pipe,
    queue: CompletionQueue,
    slots: Mutex<Vec<Slot>>,
}

fn interest_to_poll_events(interest: Interest) -> i16 {
    let mut bits = 0i16;
    if interest.is_readable() {
        bits |= libc::POLLIN;
    }
    if interest.is_writable() {
        bits |= libc::POLLOUT;
    }
    bits
}

fn timeout_to_millis(timeout: Option<Duration>) -> i32 {
    match timeout {
        None => -1,
        Some(d) if d.is_zero() => 0,
        Some(d) => i32::try_from(d.as_millis()).unwrap_or(i32::MAX),
    }
}

impl PollBackend {
    pub fn new() -> io::Result<PollBackend> {
        Ok(PollBackend {
            waker: Pipe::new()?,
            queue: CompletionQueue::new(),
            slots: Mutex::new(Vec::with_capacity(16)),
        })
    }
}

impl Backend for PollBackend {
    fn register(
        &self,
        handle: RawHandle,
        interest: Interest,
        token: Token,
        _listening: bool,
    ) -> io::Result<()> {
        let mut slots = self.slots.lock().unwrap();
        if slots.iter().any(|s| s.fd == handle) {
            return Err(error::already_registered());
        }
        if slots.len() >= MAX_REGISTRATIONS {
            return Err(error::resource_exhausted(
                "poll backend registration table is full",
            ));
        }
        if slots.len() == slots.capacity() {
            let grown = (slots.capacity() * 2).min(MAX_REGISTRATIONS);
            slots.reserve(grown - slots.len());
        }
        slots.push(Slot {
            fd: handle,
            token,
            interest,
        });
        Ok(())
    }

    fn modify(&self, handle: RawHandle, interest: Interest, token: Token) -> io::Result<()> {
        let mut slots = self.slots.lock().unwrap();
        let slot = slots
            .iter_mut()
            .find(|s| s.fd == handle)
            .ok_or_else(error::not_registered)?;
        slot.interest = interest;
        slot.token = token;
        Ok(())
    }

    fn unregister(&self, handle: RawHandle) -> io::Result<()> {
        let mut slots = self.slots.lock().unwrap();
        let len_before = slots.len();
        slots.retain(|s| s.fd != handle);
        if slots.len() == len_before {
            return Err(error::not_registered());
        }
        Ok(())
    }

    fn wake_up(&self) -> io::Result<()> {
        self.queue.push(Posted::WakeUp);
        self.waker.wake()
    }

    fn post_completion(&self, key: crate::handle::CompletionKey, data: usize) -> io::Result<()> {
        self.queue.push(Posted::Completion { key, data });
        self.waker.wake()
    }

    fn wait(&self, events: &mut Events, timeout: Option<Duration>) -> io::Result<usize> {
        let (entries, interests): (Vec<(RawFd, Token)>, Vec<Interest>) = {
            let slots = self.slots.lock().unwrap();
            slots
                .iter()
                .map(|s| ((s.fd, s.token), s.interest))
                .unzip()
        };

        let mut pollfds = Vec::with_capacity(entries.len() + 1);
        pollfds.push(libc::pollfd {
            fd: self.waker.read_fd(),
            events: libc::POLLIN,
            revents: 0,
        });
        for ((fd, _token), interest) in entries.iter().zip(interests.iter()) {
            pollfds.push(libc::pollfd {
                fd: *fd,
                events: interest_to_poll_events(*interest),
                revents: 0,
            });
        }

        let millis = timeout_to_millis(timeout);
        let n = unsafe { libc::poll(pollfds.as_mut_ptr(), pollfds.len() as libc::nfds_t, millis) };

        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                trace!("poll interrupted by signal; reporting zero events");
                return Ok(0);
            }
            return Err(err);
        }

        let waker_revents = pollfds[0].revents;

        for (i, (_fd, token)) in entries.iter().enumerate() {
            if events.is_full() {
                break;
            }
            let revents = pollfds[i + 1].revents;
            if revents == 0 {
                continue;
            }

            let mut flags = EventFlags::EMPTY;
            if revents & libc::POLLIN != 0 {
                flags |= EventFlags::READABLE;
            }
            if revents & libc::POLLOUT != 0 {
                flags |= EventFlags::WRITABLE;
            }
            if revents & libc::POLLERR != 0 {
                flags |= EventFlags::ERROR;
            }
            if revents & (libc::POLLHUP | libc::POLLNVAL) != 0 {
                flags |= EventFlags::CLOSED;
            }
            if flags.is_empty() {
                continue;
            }

            events.push(Event::Io {
                handle: entries[i].0,
                token: *token,
                flags,
                bytes_transferred: None,
                buffer: None,
            });
        }

        if waker_revents & libc::POLLIN != 0 {
            self.waker.drain();
            let mut posted = Vec::new();
            self.queue.drain_into(&mut posted);
            for item in posted {
                if events.is_full() {
                    break;
                }
                match item {
                    Posted::Completion { key, data } => {
                        events.push(Event::Completion { key, data });
                    }
                    Posted::WakeUp => {
                        events.push(Event::Completion {
                            key: WAKE_COMPLETION_KEY,
                            data: 0,
                        });
                    }
                }
            }
        } else if waker_revents & (libc::POLLNVAL | libc::POLLERR) != 0 {
            warn!("poll backend wake-up pipe reported an unexpected condition");
        }

        Ok(events.len())
    }
}
