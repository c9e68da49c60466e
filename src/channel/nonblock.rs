// Non-blocking mode for channel endpoints
// fcntl(O_NONBLOCK) on unix, ioctlsocket(FIONBIO) via socket2 on Windows

use super::handle::OwnedHandle;
use crate::error::NonBlockingError;

/// Put `handle` into non-blocking mode
#[cfg(unix)]
pub fn set_nonblocking(handle: &OwnedHandle) -> Result<(), NonBlockingError> {
    use std::os::fd::AsRawFd;

    let fd = handle.as_raw_fd();
    // SAFETY: `fd` is owned by `handle` and stays open for both calls.
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags < 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        if flags & libc::O_NONBLOCK == 0
            && libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0
        {
            return Err(std::io::Error::last_os_error().into());
        }
    }
    Ok(())
}

#[cfg(windows)]
pub fn set_nonblocking(handle: &OwnedHandle) -> Result<(), NonBlockingError> {
    socket2::SockRef::from(handle).set_nonblocking(true)?;
    Ok(())
}

/// True if `handle` is in non-blocking mode
#[cfg(unix)]
pub fn is_nonblocking(handle: &OwnedHandle) -> std::io::Result<bool> {
    use std::os::fd::AsRawFd;

    // SAFETY: the descriptor is owned by `handle`.
    let flags = unsafe { libc::fcntl(handle.as_raw_fd(), libc::F_GETFL) };
    if flags < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(flags & libc::O_NONBLOCK != 0)
}
