//! Dedicated accept worker for backend A's listening endpoints (spec §4.1,
//! §9 "Operation taxonomy... accept"): IOCP has no ergonomic native way to
//! wait for "a new connection is pending" the way it waits for reads and
//! writes, so a helper thread polls the listening sockets with `WSAPoll`
//! and calls `accept` itself, then posts the accepted handle through the
//! completion port with the listening endpoint's token carried through.
//!
//! Simplified relative to `mio::sys::windows::afd`'s AFD-based listener
//! polling, per spec §9's Open Questions resolution favoring a plain
//! `WSAPoll` loop over reimplementing AFD.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};

use windows_sys::Win32::Foundation::HANDLE;
use windows_sys::Win32::Networking::WinSock::{
    accept, WSAPoll, INVALID_SOCKET, POLLRDNORM, SOCKET, WSAPOLLFD,
};
use windows_sys::Win32::System::IO::{OVERLAPPED, PostQueuedCompletionStatus};

use crate::handle::RawHandle;
use crate::token::Token;
use crate::worker::Worker;

const ACCEPT_KEY: usize = 3;
const POLL_TIMEOUT_MS: i32 = 50;

struct AcceptedConnection {
    handle: RawHandle,
    token: Token,
}

struct Shared {
    listeners: Mutex<HashMap<RawHandle, Token>>,
}

pub(super) struct AcceptWorker {
    shared: Arc<Shared>,
    worker: Worker,
}

impl AcceptWorker {
    pub fn spawn(port: HANDLE) -> io::Result<AcceptWorker> {
        let shared = Arc::new(Shared {
            listeners: Mutex::new(HashMap::new()),
        });
        let run_shared = Arc::clone(&shared);

        let worker = Worker::spawn(
            move |_ctx: ()| {
                run_accept_loop(port, &run_shared);
            },
            (),
            None,
        )?;

        Ok(AcceptWorker { shared, worker })
    }

    pub fn add_listener(&mut self, handle: RawHandle, token: Token) {
        self.shared.listeners.lock().unwrap().insert(handle, token);
    }

    pub fn remove_listener(&mut self, handle: RawHandle) {
        self.shared.listeners.lock().unwrap().remove(&handle);
    }
}

impl Drop for AcceptWorker {
    fn drop(&mut self) {
        self.worker.signal_stop();
        self.worker.join(None);
    }
}

fn run_accept_loop(port: HANDLE, shared: &Shared) {
    loop {
        let should_stop = Worker::with_current_stop_event(|ev| ev.is_set()).unwrap_or(true);
        if should_stop {
            return;
        }

        let snapshot: Vec<(RawHandle, Token)> = {
            let listeners = shared.listeners.lock().unwrap();
            listeners.iter().map(|(h, t)| (*h, *t)).collect()
        };
        if snapshot.is_empty() {
            std::thread::sleep(std::time::Duration::from_millis(POLL_TIMEOUT_MS as u64));
            continue;
        }

        let mut fds: Vec<WSAPOLLFD> = snapshot
            .iter()
            .map(|(h, _)| WSAPOLLFD {
                fd: *h as SOCKET,
                events: POLLRDNORM,
                revents: 0,
            })
            .collect();

        let ready = unsafe { WSAPoll(fds.as_mut_ptr(), fds.len() as u32, POLL_TIMEOUT_MS) };
        if ready <= 0 {
            continue;
        }

        for (fd, (handle, token)) in fds.iter().zip(snapshot.iter()) {
            if fd.revents & POLLRDNORM == 0 {
                continue;
            }
            let accepted = unsafe {
                accept(*handle as SOCKET, std::ptr::null_mut(), std::ptr::null_mut())
            };
            if accepted == INVALID_SOCKET {
                continue;
            }

            let boxed = Box::new(AcceptedConnection {
                handle: accepted as RawHandle,
                token: *token,
            });
            let ptr = Box::into_raw(boxed) as *mut OVERLAPPED;
            let ok = unsafe { PostQueuedCompletionStatus(port, 0, ACCEPT_KEY, ptr) };
            if ok == 0 {
                unsafe { drop(Box::from_raw(ptr as *mut AcceptedConnection)) };
            }
        }
    }
}
