// Anonymous pipe endpoints (unix)

use super::handle::OwnedHandle;
use crate::error::{ChannelCreationError, CreationStep};
use std::io;
use std::os::fd::FromRawFd;

/// Create a pipe, returning `(notify, observe)` = (write end, read end).
/// Both ends are close-on-exec.
pub(crate) fn create() -> Result<(OwnedHandle, OwnedHandle), ChannelCreationError> {
    let mut fds: [libc::c_int; 2] = [-1, -1];
    open_cloexec(&mut fds)?;
    // SAFETY: the pipe was created, so both descriptors are open and owned by us.
    let (observe, notify) = unsafe { (OwnedHandle::from_raw_fd(fds[0]), OwnedHandle::from_raw_fd(fds[1])) };
    Ok((notify, observe))
}

/// Atomic pipe + close-on-exec, so a concurrent fork/exec never inherits either end
#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "dragonfly",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "illumos"
))]
fn open_cloexec(fds: &mut [libc::c_int; 2]) -> Result<(), ChannelCreationError> {
    // SAFETY: `fds` has room for the two descriptors pipe2(2) writes.
    if unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) } != 0 {
        return Err(ChannelCreationError::at(CreationStep::Pipe)(io::Error::last_os_error()));
    }
    Ok(())
}

/// No pipe2 here: the flag is applied after creation
#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "dragonfly",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "illumos"
)))]
fn open_cloexec(fds: &mut [libc::c_int; 2]) -> Result<(), ChannelCreationError> {
    // SAFETY: `fds` has room for the two descriptors pipe(2) writes.
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        return Err(ChannelCreationError::at(CreationStep::Pipe)(io::Error::last_os_error()));
    }
    for fd in *fds {
        if let Err(e) = set_cloexec(fd) {
            // SAFETY: both descriptors were just created and are not shared yet.
            unsafe {
                libc::close(fds[0]);
                libc::close(fds[1]);
            }
            return Err(ChannelCreationError::at(CreationStep::CloseOnExec)(e));
        }
    }
    Ok(())
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "dragonfly",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "illumos"
)))]
fn set_cloexec(fd: libc::c_int) -> io::Result<()> {
    // SAFETY: `fd` stays open for the duration of both calls.
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFD);
        if flags < 0 || libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}
