//! Pooled `OVERLAPPED` operation contexts for the IOCP backend.
//!
//! Grounded on the shape of `mio::sys::windows::iocp_handler`'s completion
//! dispatch, simplified: instead of a `Slab`-indexed handler registry keyed
//! by a separate completion key, each in-flight operation carries its own
//! handle, token and buffer directly in the `OVERLAPPED` extension, so the
//! completion key IOCP hands back only needs to distinguish "real I/O" from
//! "wake" from "posted completion" (see `selector::HANDLE_KEY` and kin).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use windows_sys::Win32::System::IO::OVERLAPPED;

use crate::handle::RawHandle;
use crate::token::Token;

pub(super) const READ_BUFFER_SIZE: usize = 4096;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub(super) enum OpKind {
    Read,
    Write,
}

/// Per-handle bookkeeping shared by every in-flight operation on that
/// handle. Kept alive by `Arc` clones held inside each `OverlappedOp`, so a
/// handle's registration state outlives `unregister` until the last posted
/// operation on it actually completes or is cancelled (spec §9, Open
/// Questions: per-handle refcounting avoids returning a context to the pool
/// while the OS still references it).
pub(super) struct HandleState {
    pub handle: RawHandle,
    pub token: Mutex<Token>,
    /// Set once `unregister` has removed this handle from the backend's
    /// registration tables. A completion for an operation already posted
    /// before that point can still arrive afterward; checked at dispatch
    /// so such a completion surfaces as closed rather than a live read
    /// for a handle the caller no longer believes is registered (spec
    /// §4.4/§9: unregistering cancels pending ops and any trailing
    /// completion for the handle is reported as closed/error).
    pub unregistered: AtomicBool,
}

/// Extension of `OVERLAPPED`; must keep `overlapped` as the first field so a
/// `*mut OverlappedOp` is safely reinterpretable as `*mut OVERLAPPED` when
/// handed to `ReadFile`/`WSASend`/etc, and the pointer IOCP returns in a
/// completion entry is safely reinterpretable back.
#[repr(C)]
pub(super) struct OverlappedOp {
    pub overlapped: OVERLAPPED,
    pub kind: OpKind,
    pub handle_state: Arc<HandleState>,
    pub buffer: Box<[u8]>,
}

impl OverlappedOp {
    fn new(kind: OpKind, handle_state: Arc<HandleState>, buffer: Box<[u8]>) -> Box<OverlappedOp> {
        Box::new(OverlappedOp {
            overlapped: unsafe { std::mem::zeroed() },
            kind,
            handle_state,
            buffer,
        })
    }
}

/// Free-list pool of boxed operation contexts, reused across posts to avoid
/// an allocation on every read/write cycle.
#[derive(Default)]
pub(super) struct OverlappedPool {
    free: Mutex<Vec<Box<OverlappedOp>>>,
}

impl OverlappedPool {
    pub fn new() -> OverlappedPool {
        OverlappedPool {
            free: Mutex::new(Vec::new()),
        }
    }

    pub fn acquire(&self, kind: OpKind, handle_state: Arc<HandleState>) -> Box<OverlappedOp> {
        let mut op = {
            let mut free = self.free.lock().unwrap();
            free.pop()
                .unwrap_or_else(|| OverlappedOp::new(kind, Arc::clone(&handle_state), vec![0u8; READ_BUFFER_SIZE].into_boxed_slice()))
        };
        op.overlapped = unsafe { std::mem::zeroed() };
        op.kind = kind;
        op.handle_state = handle_state;
        op
    }

    pub fn release(&self, op: Box<OverlappedOp>) {
        let mut free = self.free.lock().unwrap();
        if free.len() < 256 {
            free.push(op);
        }
    }
}
