// Platform handles for the shutdown channel
// Raw write/poll primitives here are async-signal-safe: one syscall, no allocation, no locks

use crate::error::DuplicationError;
use std::io;
use std::time::Duration;

#[cfg(unix)]
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
#[cfg(windows)]
use std::os::windows::io::{AsRawSocket, AsSocket, BorrowedSocket, OwnedSocket, RawSocket};

/// Raw platform descriptor: a file descriptor on unix, a SOCKET on Windows
#[cfg(unix)]
pub type RawHandle = RawFd;
#[cfg(windows)]
pub type RawHandle = RawSocket;

/// Owned platform descriptor, closed on drop
#[cfg(unix)]
pub type OwnedHandle = OwnedFd;
#[cfg(windows)]
pub type OwnedHandle = OwnedSocket;

/// Sentinel for "no handle"
#[cfg(unix)]
pub const INVALID_HANDLE: RawHandle = -1;
#[cfg(windows)]
pub const INVALID_HANDLE: RawHandle = windows_sys::Win32::Networking::WinSock::INVALID_SOCKET as RawHandle;

/// Atomic cell able to hold a `RawHandle`
#[cfg(unix)]
pub(crate) type AtomicRawHandle = std::sync::atomic::AtomicI32;
#[cfg(windows)]
pub(crate) type AtomicRawHandle = std::sync::atomic::AtomicU64;

#[cfg(unix)]
pub(crate) fn raw_of(handle: &OwnedHandle) -> RawHandle {
    handle.as_raw_fd()
}

#[cfg(windows)]
pub(crate) fn raw_of(handle: &OwnedHandle) -> RawHandle {
    handle.as_raw_socket()
}

/// Write a single zero byte to `raw`.
///
/// Safe to call from a signal handler. Returns false when the write did not
/// happen (invalid handle, full pipe, closed peer); a full pipe already means
/// the channel is signaled, so callers ignore the result.
#[cfg(unix)]
pub(crate) fn write_byte(raw: RawHandle) -> bool {
    if raw == INVALID_HANDLE {
        return false;
    }
    let byte = 0u8;
    // SAFETY: `byte` outlives the call and the length matches; an invalid or
    // stale descriptor only makes write(2) fail.
    let written = unsafe { libc::write(raw, (&byte as *const u8).cast(), 1) };
    written == 1
}

#[cfg(windows)]
pub(crate) fn write_byte(raw: RawHandle) -> bool {
    use windows_sys::Win32::Networking::WinSock::send;

    if raw == INVALID_HANDLE {
        return false;
    }
    let byte = 0u8;
    // SAFETY: `byte` outlives the call; an invalid socket only makes send fail.
    let sent = unsafe { send(raw as _, &byte, 1, 0) };
    sent == 1
}

/// Write `msg` to standard error with a single raw write.
#[cfg(unix)]
#[cfg_attr(not(feature = "interrupt-bridge"), allow(dead_code))]
pub(crate) fn write_stderr(msg: &[u8]) {
    // SAFETY: `msg` is a valid slice for the duration of the call.
    unsafe {
        libc::write(libc::STDERR_FILENO, msg.as_ptr().cast(), msg.len());
    }
}

#[cfg(windows)]
#[cfg_attr(not(feature = "interrupt-bridge"), allow(dead_code))]
pub(crate) fn write_stderr(msg: &[u8]) {
    // SAFETY: `msg` is a valid slice for the duration of the call.
    unsafe {
        libc::write(2, msg.as_ptr().cast(), msg.len() as _);
    }
}

/// Poll `raw` for readability without consuming anything.
///
/// A zero timeout never blocks. `EINTR` is retried.
#[cfg(unix)]
pub(crate) fn poll_readable(raw: RawHandle, timeout: Duration) -> bool {
    if raw == INVALID_HANDLE {
        return false;
    }
    let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as libc::c_int;
    let mut pfd = libc::pollfd {
        fd: raw,
        events: libc::POLLIN,
        revents: 0,
    };
    loop {
        // SAFETY: `pfd` is a single valid pollfd for the duration of the call.
        let ready = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
        if ready < 0 && io::Error::last_os_error().kind() == io::ErrorKind::Interrupted {
            continue;
        }
        return ready > 0 && pfd.revents & libc::POLLIN != 0;
    }
}

#[cfg(windows)]
pub(crate) fn poll_readable(raw: RawHandle, timeout: Duration) -> bool {
    use windows_sys::Win32::Networking::WinSock::{WSAPoll, POLLRDNORM, WSAPOLLFD};

    if raw == INVALID_HANDLE {
        return false;
    }
    let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as i32;
    let mut pfd = WSAPOLLFD {
        fd: raw as _,
        events: POLLRDNORM as _,
        revents: 0,
    };
    // SAFETY: `pfd` is a single valid WSAPOLLFD for the duration of the call.
    let ready = unsafe { WSAPoll(&mut pfd, 1, timeout_ms) };
    ready > 0 && (pfd.revents & POLLRDNORM as i16) != 0
}

/// Caller-owned duplicate of the observe endpoint
///
/// Independently pollable and closable. Once the lifecycle it came from is
/// torn down the handle is stale: it keeps polling its own descriptor, which
/// no longer receives signals.
#[derive(Debug)]
pub struct ObserverHandle {
    handle: OwnedHandle,
}

impl ObserverHandle {
    /// Duplicate `source` into an independent, close-on-exec, non-blocking handle
    pub(crate) fn duplicate(source: &OwnedHandle) -> Result<Self, DuplicationError> {
        // try_clone uses F_DUPFD_CLOEXEC on unix and WSADuplicateSocketW on Windows
        let handle = source.try_clone()?;
        super::nonblock::set_nonblocking(&handle)?;
        Ok(Self { handle })
    }

    /// True once shutdown has been signaled; never blocks, never drains
    pub fn is_signaled(&self) -> bool {
        poll_readable(self.as_raw(), Duration::ZERO)
    }

    /// Wait up to `timeout` for the shutdown signal
    pub fn wait(&self, timeout: Duration) -> bool {
        poll_readable(self.as_raw(), timeout)
    }

    pub fn as_raw(&self) -> RawHandle {
        raw_of(&self.handle)
    }

    /// Close the duplicate; the original channel is unaffected
    pub fn close(self) {
        drop(self.handle);
    }

    pub fn into_owned(self) -> OwnedHandle {
        self.handle
    }
}

#[cfg(unix)]
impl AsRawFd for ObserverHandle {
    fn as_raw_fd(&self) -> RawFd {
        self.handle.as_raw_fd()
    }
}

#[cfg(unix)]
impl AsFd for ObserverHandle {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.handle.as_fd()
    }
}

#[cfg(windows)]
impl AsRawSocket for ObserverHandle {
    fn as_raw_socket(&self) -> RawSocket {
        self.handle.as_raw_socket()
    }
}

#[cfg(windows)]
impl AsSocket for ObserverHandle {
    fn as_socket(&self) -> BorrowedSocket<'_> {
        self.handle.as_socket()
    }
}
