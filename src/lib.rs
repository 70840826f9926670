//! A cross-platform async I/O and worker-coordination runtime core.
//!
//! `nightshift` unifies three OS event-notification models behind one API:
//! completion-based I/O completion ports on Windows, `epoll` on Linux, and
//! portable `poll(2)` elsewhere, the same way `mio::Poll` presents one API
//! over epoll/kqueue/IOCP. On top of the event loop it provides the ambient
//! primitives a driver-style runtime needs: a bounded byte-message queue, a
//! cooperatively-cancellable worker thread abstraction, drift-corrected
//! periodic timers, and a console input worker, none of which are specific
//! to networking.
//!
//! # Feature flags
//!
//! * `os-poll` — the event-loop [`Runtime`]/[`Registry`]: registration,
//!   demultiplexing, wake-up, worker-completion posting.
//! * `os-sync` — [`sync::Mutex`]/[`sync::SyncEvent`] and the things built on
//!   them ([`queue::Queue`], [`worker::Worker`], [`timer::Timer`],
//!   [`timer::Heartbeat`]), usable independently of the event loop.
//! * `os-util` — extensions that need both: [`console::ConsoleWorker`].
//!
//! None of the above is enabled by default beyond the optional `log`
//! integration; callers select what they need explicitly, the way `mio`
//! gates `os-poll`/`os-ext`/`net`.

#![deny(rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[cfg(feature = "os-poll")]
mod error;

#[cfg(feature = "os-poll")]
mod token;
#[cfg(feature = "os-poll")]
pub use token::Token;

#[cfg(feature = "os-poll")]
mod interest;
#[cfg(feature = "os-poll")]
pub use interest::Interest;

#[cfg(feature = "os-poll")]
mod handle;
#[cfg(feature = "os-poll")]
pub use handle::{CompletionKey, RawHandle, CONSOLE_COMPLETION_KEY, WAKE_COMPLETION_KEY};

#[cfg(feature = "os-poll")]
pub mod event;
#[cfg(feature = "os-poll")]
pub use event::{Event, Events};

#[cfg(feature = "os-poll")]
mod poll;
#[cfg(feature = "os-poll")]
pub use poll::{Registry, Runtime};

#[cfg(feature = "os-poll")]
mod sys;

#[cfg(feature = "os-sync")]
pub mod sync;
#[cfg(feature = "os-sync")]
pub use sync::{Mutex, MutexGuard, ResetMode, SyncEvent};

#[cfg(feature = "os-sync")]
pub mod queue;
#[cfg(feature = "os-sync")]
pub use queue::{Queue, QueueFlags, QueueStats};

#[cfg(feature = "os-sync")]
pub mod worker;
#[cfg(feature = "os-sync")]
pub use worker::{Worker, WorkerState};

#[cfg(feature = "os-sync")]
mod timer;
#[cfg(feature = "os-sync")]
pub use timer::{Heartbeat, Timer};

#[cfg(feature = "os-util")]
mod console;
#[cfg(feature = "os-util")]
pub use console::{ConsoleKind, ConsoleWorker};
