#[cfg(target_os = "linux")]
pub(crate) mod epoll;

#[cfg(all(unix, not(target_os = "linux")))]
pub(crate) mod poll;
