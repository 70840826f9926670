//! Backend B: readiness, O(log n) scalable — Linux `epoll`.
//!
//! Grounded on `mio::sys::unix::selector::epoll` for the registration and
//! `epoll_wait` loop shape, generalized with a side completion queue (see
//! `sys::unix::completions`) so worker threads can post typed completions
//! through the same `wait` call, per spec §4.4 Backend B.

use std::collections::HashMap;
use std::io;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use log::{trace, warn};

use crate::error;
use crate::event::{Event, EventFlags, Events};
use crate::handle::{CompletionKey, RawHandle, WAKE_COMPLETION_KEY};
use crate::interest::Interest;
use crate::poll::Backend;
use crate::sys::unix::completions::{CompletionQueue, Posted};
use crate::sys::unix::waker::eventfd::EventFd;
use crate::token::Token;

/// `epoll_data.u64` value reserved for the waker's own registration; never
/// produced for a user handle since real fds are small non-negative
/// integers from the kernel's fd table.
const WAKER_DATA: u64 = u64::MAX;

struct Registration {
    token: Token,
}

pub struct EpollBackend {
    epfd: RawFd,
    waker: EventFd,
    queue: CompletionQueue,
    registrations: Mutex<HashMap<RawFd, Registration>>,
    closed: AtomicBool,
}

fn interest_to_epoll_events(interest: Interest) -> u32 {
    let mut bits = 0u32;
    if interest.is_readable() {
        bits |= libc::EPOLLIN as u32;
    }
    if interest.is_writable() {
        bits |= libc::EPOLLOUT as u32;
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

impl EpollBackend {
    pub fn new() -> io::Result<EpollBackend> {
        let epfd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
        if epfd < 0 {
            return Err(io::Error::last_os_error());
        }
        let waker = EventFd::new()?;

        let mut ev = libc::epoll_event {
            events: libc::EPOLLIN as u32,
            u64: WAKER_DATA,
        };
        if unsafe { libc::epoll_ctl(epfd, libc::EPOLL_CTL_ADD, waker.as_raw_fd(), &mut ev) } < 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(epfd) };
            return Err(err);
        }

        Ok(EpollBackend {
            epfd,
            waker,
            queue: CompletionQueue::new(),
            registrations: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        })
    }
}

impl Backend for EpollBackend {
    fn register(
        &self,
        handle: RawHandle,
        interest: Interest,
        token: Token,
        _listening: bool,
    ) -> io::Result<()> {
        let mut regs = self.registrations.lock().unwrap();
        if regs.contains_key(&handle) {
            return Err(error::already_registered());
        }

        let mut ev = libc::epoll_event {
            events: interest_to_epoll_events(interest),
            u64: handle as u64,
        };
        if unsafe { libc::epoll_ctl(self.epfd, libc::EPOLL_CTL_ADD, handle, &mut ev) } < 0 {
            return Err(io::Error::last_os_error());
        }
        regs.insert(handle, Registration { token });
        Ok(())
    }

    fn modify(&self, handle: RawHandle, interest: Interest, token: Token) -> io::Result<()> {
        let mut regs = self.registrations.lock().unwrap();
        let reg = regs.get_mut(&handle).ok_or_else(error::not_registered)?;

        let mut ev = libc::epoll_event {
            events: interest_to_epoll_events(interest),
            u64: handle as u64,
        };
        if unsafe { libc::epoll_ctl(self.epfd, libc::EPOLL_CTL_MOD, handle, &mut ev) } < 0 {
            return Err(io::Error::last_os_error());
        }
        reg.token = token;
        Ok(())
    }

    fn unregister(&self, handle: RawHandle) -> io::Result<()> {
        let mut regs = self.registrations.lock().unwrap();
        if regs.remove(&handle).is_none() {
            return Err(error::not_registered());
        }
        // EPOLL_CTL_DEL's event argument is ignored on Linux but older
        // kernels required a non-null pointer.
        let mut ev = libc::epoll_event { events: 0, u64: 0 };
        if unsafe { libc::epoll_ctl(self.epfd, libc::EPOLL_CTL_DEL, handle, &mut ev) } < 0 {
            let err = io::Error::last_os_error();
            // The fd may already be gone (closed by the caller); that's
            // not our problem to report since we never owned it.
            if err.kind() != io::ErrorKind::NotFound {
                return Err(err);
            }
        }
        Ok(())
    }

    fn wake_up(&self) -> io::Result<()> {
        self.queue.push(Posted::WakeUp);
        self.waker.wake()
    }

    fn post_completion(&self, key: CompletionKey, data: usize) -> io::Result<()> {
        self.queue.push(Posted::Completion { key, data });
        self.waker.wake()
    }

    fn wait(&self, events: &mut Events, timeout: Option<Duration>) -> io::Result<usize> {
        let capacity = events.capacity().max(1);
        let mut raw = vec![libc::epoll_event { events: 0, u64: 0 }; capacity];
        let millis = timeout_to_millis(timeout);

        let n = unsafe {
            libc::epoll_wait(self.epfd, raw.as_mut_ptr(), raw.len() as i32, millis)
        };

        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                trace!("epoll_wait interrupted by signal; reporting zero events");
                return Ok(0);
            }
            return Err(err);
        }

        let mut saw_waker = false;
        {
            let regs = self.registrations.lock().unwrap();
            for raw_ev in &raw[..n as usize] {
                if raw_ev.u64 == WAKER_DATA {
                    saw_waker = true;
                    continue;
                }
                if events.is_full() {
                    break;
                }
                let handle = raw_ev.u64 as RawFd;
                let Some(reg) = regs.get(&handle) else {
                    // Stale event for a handle unregistered since this
                    // wait began; silently discard (spec §4.4 Backend B).
                    warn!("discarding stale epoll event for unregistered handle");
                    continue;
                };

                let mut flags = EventFlags::EMPTY;
                let bits = raw_ev.events;
                if bits & (libc::EPOLLIN as u32) != 0 {
                    flags |= EventFlags::READABLE;
                }
                if bits & (libc::EPOLLOUT as u32) != 0 {
                    flags |= EventFlags::WRITABLE;
                }
                if bits & (libc::EPOLLERR as u32) != 0 {
                    flags |= EventFlags::ERROR;
                }
                if bits & (libc::EPOLLHUP as u32 | libc::EPOLLRDHUP as u32) != 0 {
                    flags |= EventFlags::CLOSED;
                }
                if flags.is_empty() {
                    continue;
                }

                events.push(Event::Io {
                    handle,
                    token: reg.token,
                    flags,
                    bytes_transferred: None,
                    buffer: None,
                });
            }
        }

        if saw_waker {
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
        }

        Ok(events.len())
    }
}

impl Drop for EpollBackend {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            unsafe { libc::close(self.epfd) };
        }
    }
}
