//! Wakes a blocked `GetQueuedCompletionStatusEx` via `PostQueuedCompletionStatus`
//! with the reserved wake completion key, grounded on
//! `mio::sys::windows::waker`'s use of a synthetic completion post rather
//! than a separate OS object (no `eventfd` equivalent is needed on IOCP,
//! since the completion port itself is the wait primitive).

use std::io;

use windows_sys::Win32::Foundation::HANDLE;
use windows_sys::Win32::System::IO::PostQueuedCompletionStatus;

use super::selector::WAKE_KEY;

pub(super) fn post_wake(port: HANDLE) -> io::Result<()> {
    let ok = unsafe { PostQueuedCompletionStatus(port, 0, WAKE_KEY, std::ptr::null_mut()) };
    if ok == 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
