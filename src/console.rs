//! Console input worker (spec §5, "Console input facility").
//!
//! Grounded on `console_worker.h`: a background thread that reads lines from
//! standard input and hands them to the main loop through the same
//! `Queue`/`Registry::post_completion` machinery workers already use, since
//! stdin is one of the few handles that can't be registered directly with
//! any of the three backends portably. Four-way console-type detection
//! (none attached / real interactive console / redirected pipe / redirected
//! file) mirrors the original's `console_kind_detect`.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, trace, warn};

use crate::handle::CONSOLE_COMPLETION_KEY;
use crate::poll::Registry;
use crate::queue::Queue;
use crate::worker::Worker;

/// What standard input is actually connected to. Detected once at startup;
/// a `None` console means there is nothing meaningful to read and the
/// worker exits immediately without ever blocking on a read.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ConsoleKind {
    /// No stdin attached (e.g. a service with a closed/invalid handle).
    None,
    /// An interactive terminal.
    Real,
    /// A redirected pipe (`prog | prog2`, or a parent feeding input).
    Pipe,
    /// Redirected from a regular file (`prog < input.txt`).
    File,
}

impl std::fmt::Display for ConsoleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConsoleKind::None => "none",
            ConsoleKind::Real => "real",
            ConsoleKind::Pipe => "pipe",
            ConsoleKind::File => "file",
        };
        f.write_str(s)
    }
}

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Reads newline-delimited input from stdin on its own thread and enqueues
/// each line (delimiter stripped) into a caller-supplied queue, posting a
/// completion through `registry` after each insert so the main loop can
/// multiplex console input with its other events.
pub struct ConsoleWorker {
    worker: Worker,
    kind: ConsoleKind,
}

struct Shared {
    registry: Registry,
    queue: Arc<Queue>,
    max_line_len: usize,
}

impl ConsoleWorker {
    /// Detects the console kind and, unless it's `None`, starts the
    /// background reader. `max_line_len` bounds a single enqueued line;
    /// longer input is split at that boundary (spec §5: "a fixed maximum
    /// length").
    pub fn start(
        registry: Registry,
        queue: Arc<Queue>,
        max_line_len: usize,
    ) -> io::Result<ConsoleWorker> {
        let kind = detect_console_kind();
        debug!("console input detected as {kind:?}");

        let shared = Shared {
            registry,
            queue,
            max_line_len,
        };

        let worker = Worker::spawn(
            move |shared: Shared| {
                if kind == ConsoleKind::None {
                    trace!("no console attached; console worker exiting immediately");
                    return;
                }
                run_reader(&shared);
            },
            shared,
            None,
        )?;

        Ok(ConsoleWorker { worker, kind })
    }

    pub fn kind(&self) -> ConsoleKind {
        self.kind
    }

    /// Signals the worker to stop and joins it, interrupting a blocked read
    /// via the platform's cancel-I/O primitive if necessary.
    pub fn stop(mut self, timeout: Option<Duration>) -> bool {
        self.worker.signal_stop();
        #[cfg(windows)]
        if let Some(handle) = self.worker.raw_thread_handle() {
            cancel_pending_read(handle);
        }
        self.worker.join(timeout)
    }
}

fn run_reader(shared: &Shared) {
    let mut line: Vec<u8> = Vec::new();
    loop {
        if Worker::current_should_stop() == Some(true) {
            trace!("console worker observed stop request");
            return;
        }

        match read_byte_with_timeout(POLL_INTERVAL) {
            ReadOutcome::Byte(b) => {
                if b == b'\n' {
                    deliver_line(shared, &line);
                    line.clear();
                } else {
                    line.push(b);
                    if line.len() >= shared.max_line_len {
                        deliver_line(shared, &line);
                        line.clear();
                    }
                }
            }
            ReadOutcome::Timeout => continue,
            ReadOutcome::Eof => {
                if !line.is_empty() {
                    deliver_line(shared, &line);
                }
                trace!("console worker observed EOF");
                return;
            }
            ReadOutcome::Aborted => {
                trace!("console worker's pending read was cancelled");
                return;
            }
            ReadOutcome::Error(e) => {
                warn!("console worker read error: {e}");
                return;
            }
        }
    }
}

fn deliver_line(shared: &Shared, line: &[u8]) {
    if !shared.queue.enqueue(line) {
        warn!("console line dropped: queue full and no overflow policy admitted it");
        return;
    }
    if let Err(e) = shared.registry.post_completion(CONSOLE_COMPLETION_KEY, line.len()) {
        warn!("failed to post console completion: {e}");
    }
}

enum ReadOutcome {
    Byte(u8),
    Timeout,
    Eof,
    Aborted,
    Error(io::Error),
}

#[cfg(unix)]
fn detect_console_kind() -> ConsoleKind {
    use std::os::unix::io::AsRawFd;

    let fd = io::stdin().as_raw_fd();
    unsafe {
        if libc::isatty(fd) == 1 {
            return ConsoleKind::Real;
        }
        let mut st: libc::stat = std::mem::zeroed();
        if libc::fstat(fd, &mut st) != 0 {
            return ConsoleKind::None;
        }
        match st.st_mode & libc::S_IFMT {
            libc::S_IFIFO => ConsoleKind::Pipe,
            libc::S_IFREG => ConsoleKind::File,
            libc::S_IFCHR => ConsoleKind::Real,
            _ => ConsoleKind::None,
        }
    }
}

#[cfg(unix)]
fn read_byte_with_timeout(timeout: Duration) -> ReadOutcome {
    use std::os::unix::io::AsRawFd;

    let fd = io::stdin().as_raw_fd();
    let mut pfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let millis = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);

    let ready = unsafe { libc::poll(&mut pfd, 1, millis) };
    if ready == 0 {
        return ReadOutcome::Timeout;
    }
    if ready < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return ReadOutcome::Timeout;
        }
        return ReadOutcome::Error(err);
    }
    if pfd.revents & (libc::POLLERR | libc::POLLNVAL) != 0 {
        return ReadOutcome::Aborted;
    }

    let mut buf = [0u8; 1];
    let n = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, 1) };
    if n == 0 {
        ReadOutcome::Eof
    } else if n < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::WouldBlock || err.kind() == io::ErrorKind::Interrupted {
            ReadOutcome::Timeout
        } else {
            ReadOutcome::Error(err)
        }
    } else {
        ReadOutcome::Byte(buf[0])
    }
}

#[cfg(windows)]
fn detect_console_kind() -> ConsoleKind {
    use windows_sys::Win32::Storage::FileSystem::{
        GetFileType, FILE_TYPE_CHAR, FILE_TYPE_DISK, FILE_TYPE_PIPE,
    };
    use windows_sys::Win32::System::Console::{GetConsoleMode, GetStdHandle, STD_INPUT_HANDLE};

    unsafe {
        let handle = GetStdHandle(STD_INPUT_HANDLE);
        if handle == 0 || handle == -1_isize as _ {
            return ConsoleKind::None;
        }
        let mut mode: u32 = 0;
        if GetConsoleMode(handle, &mut mode) != 0 {
            return ConsoleKind::Real;
        }
        match GetFileType(handle) {
            FILE_TYPE_PIPE => ConsoleKind::Pipe,
            FILE_TYPE_DISK => ConsoleKind::File,
            FILE_TYPE_CHAR => ConsoleKind::Real,
            _ => ConsoleKind::None,
        }
    }
}

#[cfg(windows)]
fn read_byte_with_timeout(timeout: Duration) -> ReadOutcome {
    use windows_sys::Win32::Foundation::WAIT_OBJECT_0;
    use windows_sys::Win32::Storage::FileSystem::ReadFile;
    use windows_sys::Win32::System::Console::{GetStdHandle, STD_INPUT_HANDLE};
    use windows_sys::Win32::System::Threading::WaitForSingleObject;

    unsafe {
        let handle = GetStdHandle(STD_INPUT_HANDLE);
        let millis = u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX);
        let wait = WaitForSingleObject(handle, millis);
        if wait != WAIT_OBJECT_0 {
            return ReadOutcome::Timeout;
        }

        let mut buf = [0u8; 1];
        let mut read: u32 = 0;
        let ok = ReadFile(handle, buf.as_mut_ptr(), 1, &mut read, std::ptr::null_mut());
        if ok == 0 {
            return ReadOutcome::Error(io::Error::last_os_error());
        }
        if read == 0 {
            ReadOutcome::Eof
        } else {
            ReadOutcome::Byte(buf[0])
        }
    }
}

#[cfg(windows)]
fn cancel_pending_read(thread_handle: std::os::windows::io::RawHandle) {
    use windows_sys::Win32::System::IO::CancelSynchronousIo;

    // Best-effort: unblocks a synchronous ReadFile if one happens to be in
    // flight on the worker's thread at the moment stop is signaled. A
    // missed window just means the reader observes stop on its next
    // `WaitForSingleObject` timeout instead (spec §5 tolerates a short
    // shutdown delay here).
    unsafe {
        CancelSynchronousIo(thread_handle as windows_sys::Win32::Foundation::HANDLE);
    }
}
