//! Wake-up primitive for the epoll backend, grounded on
//! `mio::sys::unix::waker::eventfd`: an `eventfd(2)` object registered
//! into the epoll instance with read interest. Any thread can wake a
//! blocked `epoll_wait` by writing to it; the counter semantics of
//! `eventfd` mean concurrent wakes coalesce into one readiness
//! notification, which is exactly what's wanted here (the payload for
//! worker completions travels over a side queue, not the eventfd value
//! itself — see `sys::unix::selector::epoll`).

use std::io;
use std::os::unix::io::RawFd;

pub struct EventFd {
    fd: RawFd,
}

impl EventFd {
    pub fn new() -> io::Result<EventFd> {
        // EFD_NONBLOCK | EFD_CLOEXEC
        let fd = unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(EventFd { fd })
    }

    pub fn as_raw_fd(&self) -> RawFd {
        self.fd
    }

    pub fn wake(&self) -> io::Result<()> {
        let buf: u64 = 1;
        let ret = unsafe {
            libc::write(
                self.fd,
                &buf as *const u64 as *const libc::c_void,
                std::mem::size_of::<u64>(),
            )
        };
        if ret < 0 {
            let err = io::Error::last_os_error();
            // EAGAIN means the counter is already saturated/pending; the
            // waiter will still observe readiness, so this isn't fatal.
            if err.kind() == io::ErrorKind::WouldBlock {
                return Ok(());
            }
            return Err(err);
        }
        Ok(())
    }

    /// Drains the counter so the notifier stops reporting readable until
    /// the next `wake`.
    pub fn drain(&self) {
        let mut buf = [0u8; 8];
        loop {
            let ret =
                unsafe { libc::read(self.fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
            if ret <= 0 {
                break;
            }
        }
    }
}

impl Drop for EventFd {
    fn drop(&mut self) {
        unsafe { libc::close(self.fd) };
    }
}
