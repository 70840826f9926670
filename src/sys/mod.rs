//! Platform selector dispatch (spec §4.4): one [`Backend`](crate::poll::Backend)
//! implementation per target, chosen at `Runtime::new` time via `cfg`, the
//! same shape `mio::sys` uses to pick epoll/kqueue/IOCP.

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub(crate) use unix::new_backend;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub(crate) use windows::new_backend;
