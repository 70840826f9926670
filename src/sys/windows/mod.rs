mod accept_worker;
mod overlapped;
mod selector;
mod waker;

use std::io;

use crate::poll::Backend;

pub(crate) fn new_backend() -> io::Result<Box<dyn Backend>> {
    selector::IocpBackend::new().map(|b| Box::new(b) as Box<dyn Backend>)
}
