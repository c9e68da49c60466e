// Interrupt bridge
// Turns SIGINT (Ctrl+C / Ctrl+Break on Windows) into a shutdown request
//
// The handler writes a fixed notice to stderr and one byte to the notify end
// published in NOTIFY. Nothing else: no allocation, no locks, no manager access.
//
// Teardown resets NOTIFY before the channel is closed, but a handler already
// running may still write to a descriptor that was just closed (or reused).
// That race is accepted: the write fails or lands as a spurious byte.

use crate::channel::handle::{write_byte, write_stderr, AtomicRawHandle, RawHandle, INVALID_HANDLE};
use crate::error::HandlerInstallError;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

static NOTIFY: AtomicRawHandle = AtomicRawHandle::new(INVALID_HANDLE);
static INSTALLED: AtomicBool = AtomicBool::new(false);

const NOTICE: &[u8] = b"\nInterrupt received: disconnecting running client(s) ...\n";

fn on_interrupt() {
    write_stderr(NOTICE);
    write_byte(NOTIFY.load(Ordering::Acquire));
}

#[cfg(unix)]
extern "C" fn handle_signal(_signum: libc::c_int) {
    // The writes may clobber errno of the interrupted thread
    let location = errno_location();
    // SAFETY: errno is thread-local; the pointer is valid for this thread.
    let saved = location.map(|p| unsafe { *p });
    on_interrupt();
    if let (Some(p), Some(errno)) = (location, saved) {
        // SAFETY: as above.
        unsafe { *p = errno };
    }
}

#[cfg(any(target_os = "linux", target_os = "android", target_os = "emscripten"))]
fn errno_location() -> Option<*mut libc::c_int> {
    // SAFETY: always returns the calling thread's errno slot.
    Some(unsafe { libc::__errno_location() })
}

#[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd", target_os = "dragonfly"))]
fn errno_location() -> Option<*mut libc::c_int> {
    // SAFETY: always returns the calling thread's errno slot.
    Some(unsafe { libc::__error() })
}

#[cfg(any(target_os = "netbsd", target_os = "openbsd"))]
fn errno_location() -> Option<*mut libc::c_int> {
    // SAFETY: always returns the calling thread's errno slot.
    Some(unsafe { libc::__errno() })
}

#[cfg(any(target_os = "illumos", target_os = "solaris"))]
fn errno_location() -> Option<*mut libc::c_int> {
    // SAFETY: always returns the calling thread's errno slot.
    Some(unsafe { libc::___errno() })
}

#[cfg(all(
    unix,
    not(any(
        target_os = "linux",
        target_os = "android",
        target_os = "emscripten",
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "dragonfly",
        target_os = "netbsd",
        target_os = "openbsd",
        target_os = "illumos",
        target_os = "solaris"
    ))
))]
fn errno_location() -> Option<*mut libc::c_int> {
    None
}

#[cfg(windows)]
unsafe extern "system" fn handle_console_event(ctrl_type: u32) -> windows_sys::Win32::Foundation::BOOL {
    use windows_sys::Win32::System::Console::{CTRL_BREAK_EVENT, CTRL_C_EVENT};

    if ctrl_type == CTRL_C_EVENT || ctrl_type == CTRL_BREAK_EVENT {
        on_interrupt();
        return 1;
    }
    0
}

/// Installed interrupt handler; restores prior dispositions on uninstall/drop.
/// At most one bridge exists per process.
pub struct InterruptBridge {
    #[cfg(unix)]
    previous: Vec<(libc::c_int, libc::sigaction)>,
}

impl std::fmt::Debug for InterruptBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut dbg = f.debug_struct("InterruptBridge");
        #[cfg(unix)]
        dbg.field("signals", &self.previous.iter().map(|(sig, _)| *sig).collect::<Vec<_>>());
        dbg.finish()
    }
}

impl InterruptBridge {
    /// Route `signals` to a single write on `notify`
    pub fn install(notify: RawHandle, signals: &[i32]) -> Result<Self, HandlerInstallError> {
        if INSTALLED
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(HandlerInstallError::AlreadyInstalled);
        }
        NOTIFY.store(notify, Ordering::Release);

        let mut bridge = Self {
            #[cfg(unix)]
            previous: Vec::with_capacity(signals.len()),
        };
        // Dropping a partially installed bridge restores what was registered so far
        bridge.register(signals)?;

        info!(?signals, "Interrupt bridge installed");
        Ok(bridge)
    }

    #[cfg(unix)]
    fn register(&mut self, signals: &[i32]) -> Result<(), HandlerInstallError> {
        for &signal in signals {
            if signal_hook::consts::FORBIDDEN.contains(&signal) {
                return Err(HandlerInstallError::Forbidden(signal));
            }
            // SAFETY: zeroed sigaction is a valid starting point; the handler
            // only performs async-signal-safe writes.
            unsafe {
                let mut action: libc::sigaction = std::mem::zeroed();
                action.sa_sigaction = handle_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
                action.sa_flags = libc::SA_RESTART;
                libc::sigemptyset(&mut action.sa_mask);

                let mut old: libc::sigaction = std::mem::zeroed();
                if libc::sigaction(signal, &action, &mut old) != 0 {
                    return Err(std::io::Error::last_os_error().into());
                }
                self.previous.push((signal, old));
            }
            debug!(
                signal,
                name = signal_hook::low_level::signal_name(signal),
                "Interrupt handler registered"
            );
        }
        Ok(())
    }

    #[cfg(windows)]
    fn register(&mut self, _signals: &[i32]) -> Result<(), HandlerInstallError> {
        use windows_sys::Win32::System::Console::SetConsoleCtrlHandler;

        // SAFETY: the handler is a plain function with the expected signature.
        if unsafe { SetConsoleCtrlHandler(Some(handle_console_event), 1) } == 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        Ok(())
    }

    pub fn is_installed() -> bool {
        INSTALLED.load(Ordering::Acquire)
    }

    /// Remove the handler and restore the previous behavior
    pub fn uninstall(self) {
        drop(self);
    }
}

impl Drop for InterruptBridge {
    fn drop(&mut self) {
        NOTIFY.store(INVALID_HANDLE, Ordering::Release);

        #[cfg(unix)]
        while let Some((signal, old)) = self.previous.pop() {
            // SAFETY: `old` was filled in by sigaction for this very signal.
            unsafe {
                libc::sigaction(signal, &old, std::ptr::null_mut());
            }
        }

        #[cfg(windows)]
        // SAFETY: removes the handler registered in `register`.
        unsafe {
            windows_sys::Win32::System::Console::SetConsoleCtrlHandler(Some(handle_console_event), 0);
        }

        INSTALLED.store(false, Ordering::Release);
        debug!("Interrupt bridge uninstalled");
    }
}
