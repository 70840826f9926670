//! Backend A: completion-based I/O via an I/O completion port (spec §4.4,
//! Backend A).
//!
//! Grounded on the shape of `mio::sys::windows::selector`/`iocp_handler`
//! (`CreateIoCompletionPort`, `GetQueuedCompletionStatusEx`,
//! `PostQueuedCompletionStatus`), simplified per spec §9's Open Questions:
//! operation contexts are refcounted per handle rather than indexed through
//! a `Slab`-based handler registry, and listening endpoints are served by a
//! dedicated `WSAPoll`-based accept worker instead of AFD polling.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{trace, warn};
use windows_sys::Win32::Foundation::{CloseHandle, HANDLE, INVALID_HANDLE_VALUE};
use windows_sys::Win32::Networking::WinSock::{WSARecv, WSASend, SOCKET, WSABUF};
use windows_sys::Win32::System::IO::{
    CancelIoEx, CreateIoCompletionPort, GetQueuedCompletionStatusEx, OVERLAPPED, OVERLAPPED_ENTRY,
};

use crate::error;
use crate::event::{Event, EventFlags, Events};
use crate::handle::{CompletionKey, RawHandle, WAKE_COMPLETION_KEY};
use crate::interest::Interest;
use crate::poll::Backend;
use crate::token::Token;

use super::accept_worker::AcceptWorker;
use super::overlapped::{HandleState, OpKind, OverlappedOp, OverlappedPool};
use super::waker;

pub(super) const WAKE_KEY: usize = 0;
const POST_KEY: usize = 1;
const HANDLE_KEY: usize = 2;
const ACCEPT_KEY: usize = 3;

const MAX_ENTRIES: usize = 256;

struct PostedCompletion {
    key: CompletionKey,
    data: usize,
}

struct AcceptedConnection {
    handle: RawHandle,
    token: Token,
}

pub struct IocpBackend {
    port: HANDLE,
    pool: OverlappedPool,
    connected: Mutex<HashMap<RawHandle, Arc<HandleState>>>,
    listeners: Mutex<HashMap<RawHandle, Arc<HandleState>>>,
    accept_worker: Mutex<Option<AcceptWorker>>,
}

unsafe impl Send for IocpBackend {}
unsafe impl Sync for IocpBackend {}

impl IocpBackend {
    pub fn new() -> io::Result<IocpBackend> {
        let port = unsafe { CreateIoCompletionPort(INVALID_HANDLE_VALUE, 0, 0, 0) };
        if port == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(IocpBackend {
            port,
            pool: OverlappedPool::new(),
            connected: Mutex::new(HashMap::new()),
            listeners: Mutex::new(HashMap::new()),
            accept_worker: Mutex::new(None),
        })
    }

    fn ensure_accept_worker(&self) -> io::Result<()> {
        let mut guard = self.accept_worker.lock().unwrap();
        if guard.is_none() {
            *guard = Some(AcceptWorker::spawn(self.port)?);
        }
        Ok(())
    }

    fn post_read(&self, state: Arc<HandleState>) -> io::Result<()> {
        let mut op = self.pool.acquire(OpKind::Read, state);
        let socket = op.handle_state.handle as SOCKET;
        let mut wsabuf = WSABUF {
            len: op.buffer.len() as u32,
            buf: op.buffer.as_mut_ptr(),
        };
        let mut flags: u32 = 0;
        let overlapped_ptr: *mut OVERLAPPED = &mut op.overlapped;
        let raw = Box::into_raw(op);
        let ret = unsafe {
            WSARecv(
                socket,
                &mut wsabuf,
                1,
                std::ptr::null_mut(),
                &mut flags,
                overlapped_ptr,
                None,
            )
        };
        if ret != 0 {
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::WouldBlock {
                unsafe { drop(Box::from_raw(raw)) };
                return Err(err);
            }
        }
        Ok(())
    }
}

impl Backend for IocpBackend {
    fn register(
        &self,
        handle: RawHandle,
        interest: Interest,
        token: Token,
        listening: bool,
    ) -> io::Result<()> {
        let table = if listening {
            &self.listeners
        } else {
            &self.connected
        };
        {
            let mut map = table.lock().unwrap();
            if map.contains_key(&handle) {
                return Err(error::already_registered());
            }
            let state = Arc::new(HandleState {
                handle,
                token: Mutex::new(token),
                unregistered: AtomicBool::new(false),
            });
            map.insert(handle, Arc::clone(&state));
        }

        let key = if listening { ACCEPT_KEY } else { HANDLE_KEY };
        let result = unsafe {
            CreateIoCompletionPort(handle as HANDLE, self.port, key, 0)
        };
        if result == 0 {
            table.lock().unwrap().remove(&handle);
            return Err(io::Error::last_os_error());
        }

        if listening {
            self.ensure_accept_worker()?;
            let mut worker = self.accept_worker.lock().unwrap();
            if let Some(w) = worker.as_mut() {
                w.add_listener(handle, token);
            }
        } else if interest.is_readable() {
            let state = Arc::clone(self.connected.lock().unwrap().get(&handle).unwrap());
            self.post_read(state)?;
        }

        Ok(())
    }

    fn modify(&self, handle: RawHandle, _interest: Interest, token: Token) -> io::Result<()> {
        // Advisory only: interest on backend A is implicitly managed by
        // whichever operations are posted (spec §9, Open Questions).
        let connected = self.connected.lock().unwrap();
        if let Some(state) = connected.get(&handle) {
            *state.token.lock().unwrap() = token;
            return Ok(());
        }
        drop(connected);
        let listeners = self.listeners.lock().unwrap();
        if let Some(state) = listeners.get(&handle) {
            *state.token.lock().unwrap() = token;
            return Ok(());
        }
        Err(error::not_registered())
    }

    fn unregister(&self, handle: RawHandle) -> io::Result<()> {
        if let Some(state) = self.connected.lock().unwrap().remove(&handle) {
            state.unregistered.store(true, Ordering::SeqCst);
            // Cancel any read/write still in flight on this handle so its
            // OVERLAPPED context doesn't linger; the cancelled op still
            // completes through the port and is reported as closed by the
            // `unregistered` check in `wait` below rather than silently
            // dropped (spec §4.4 Backend A: "cancel-all-pending on
            // unregister").
            unsafe { CancelIoEx(handle as HANDLE, std::ptr::null_mut()) };
            return Ok(());
        }
        if let Some(state) = self.listeners.lock().unwrap().remove(&handle) {
            state.unregistered.store(true, Ordering::SeqCst);
            if let Some(worker) = self.accept_worker.lock().unwrap().as_mut() {
                worker.remove_listener(handle);
            }
            return Ok(());
        }
        Err(error::not_registered())
    }

    fn wake_up(&self) -> io::Result<()> {
        waker::post_wake(self.port)
    }

    fn post_completion(&self, key: CompletionKey, data: usize) -> io::Result<()> {
        let boxed = Box::new(PostedCompletion { key, data });
        let ptr = Box::into_raw(boxed) as *mut OVERLAPPED;
        let ok = unsafe {
            windows_sys::Win32::System::IO::PostQueuedCompletionStatus(self.port, 0, POST_KEY, ptr)
        };
        if ok == 0 {
            unsafe { drop(Box::from_raw(ptr as *mut PostedCompletion)) };
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn post_write(&self, handle: RawHandle, data: &[u8]) -> io::Result<()> {
        let state = {
            let connected = self.connected.lock().unwrap();
            Arc::clone(connected.get(&handle).ok_or_else(error::not_registered)?)
        };
        let mut op = self.pool.acquire(OpKind::Write, state);
        op.buffer = data.to_vec().into_boxed_slice();
        let socket = op.handle_state.handle as SOCKET;
        let mut wsabuf = WSABUF {
            len: op.buffer.len() as u32,
            buf: op.buffer.as_mut_ptr(),
        };
        let overlapped_ptr: *mut OVERLAPPED = &mut op.overlapped;
        let raw = Box::into_raw(op);
        let ret = unsafe {
            WSASend(socket, &mut wsabuf, 1, std::ptr::null_mut(), 0, overlapped_ptr, None)
        };
        if ret != 0 {
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::WouldBlock {
                unsafe { drop(Box::from_raw(raw)) };
                return Err(err);
            }
        }
        Ok(())
    }

    fn wait(&self, events: &mut Events, timeout: Option<Duration>) -> io::Result<usize> {
        let capacity = events.capacity().clamp(1, MAX_ENTRIES);
        let mut entries: Vec<OVERLAPPED_ENTRY> =
            (0..capacity).map(|_| unsafe { std::mem::zeroed() }).collect();
        let mut removed: u32 = 0;
        let millis = match timeout {
            None => u32::MAX,
            Some(d) if d.is_zero() => 0,
            Some(d) => u32::try_from(d.as_millis()).unwrap_or(u32::MAX),
        };

        let ok = unsafe {
            GetQueuedCompletionStatusEx(
                self.port,
                entries.as_mut_ptr(),
                entries.len() as u32,
                &mut removed,
                millis,
                0,
            )
        };
        if ok == 0 {
            let err = io::Error::last_os_error();
            // WAIT_TIMEOUT surfaces as a plain OS error on this API.
            if err.raw_os_error() == Some(258) {
                return Ok(0);
            }
            return Err(err);
        }

        for entry in &entries[..removed as usize] {
            if events.is_full() {
                break;
            }
            match entry.lpCompletionKey {
                WAKE_KEY => {
                    events.push(Event::Completion {
                        key: WAKE_COMPLETION_KEY,
                        data: 0,
                    });
                }
                POST_KEY => {
                    if entry.lpOverlapped.is_null() {
                        continue;
                    }
                    let posted = unsafe { Box::from_raw(entry.lpOverlapped as *mut PostedCompletion) };
                    events.push(Event::Completion {
                        key: posted.key,
                        data: posted.data,
                    });
                }
                ACCEPT_KEY => {
                    if entry.lpOverlapped.is_null() {
                        continue;
                    }
                    let accepted =
                        unsafe { Box::from_raw(entry.lpOverlapped as *mut AcceptedConnection) };
                    events.push(Event::Io {
                        handle: accepted.handle,
                        token: accepted.token,
                        flags: EventFlags::READABLE,
                        bytes_transferred: None,
                        buffer: None,
                    });
                }
                HANDLE_KEY => {
                    if entry.lpOverlapped.is_null() {
                        continue;
                    }
                    let op = unsafe { Box::from_raw(entry.lpOverlapped as *mut OverlappedOp) };
                    let token = *op.handle_state.token.lock().unwrap();
                    let handle = op.handle_state.handle;
                    let bytes = entry.dwNumberOfBytesTransferred as usize;
                    let unregistered = op.handle_state.unregistered.load(Ordering::SeqCst);

                    if unregistered {
                        // This completion was already in flight when
                        // `unregister` cancelled the handle; the caller no
                        // longer owns it, so report it as closed rather
                        // than a live read/write and never repost.
                        events.push(Event::Io {
                            handle,
                            token,
                            flags: EventFlags::CLOSED,
                            bytes_transferred: Some(bytes),
                            buffer: None,
                        });
                        self.pool.release(op);
                        continue;
                    }

                    match op.kind {
                        OpKind::Read => {
                            if bytes == 0 {
                                events.push(Event::Io {
                                    handle,
                                    token,
                                    flags: EventFlags::CLOSED,
                                    bytes_transferred: Some(0),
                                    buffer: None,
                                });
                            } else {
                                let buffer = op.buffer[..bytes].to_vec().into_boxed_slice();
                                events.push(Event::Io {
                                    handle,
                                    token,
                                    flags: EventFlags::READABLE,
                                    bytes_transferred: Some(bytes),
                                    buffer: Some(buffer),
                                });
                                let still_connected =
                                    self.connected.lock().unwrap().contains_key(&handle);
                                if still_connected {
                                    let state = Arc::clone(&op.handle_state);
                                    if let Err(e) = self.post_read(state) {
                                        warn!("failed to repost read after completion: {e}");
                                    }
                                }
                            }
                        }
                        OpKind::Write => {
                            events.push(Event::Io {
                                handle,
                                token,
                                flags: EventFlags::WRITABLE,
                                bytes_transferred: Some(bytes),
                                buffer: None,
                            });
                        }
                    }
                    self.pool.release(op);
                }
                other => {
                    trace!("discarding completion with unrecognized key {other}");
                }
            }
        }

        Ok(events.len())
    }
}

impl Drop for IocpBackend {
    fn drop(&mut self) {
        unsafe { CloseHandle(self.port) };
    }
}
