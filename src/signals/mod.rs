// Signal handling for graceful shutdown
// Maps signal names and hosts the interrupt bridge and the async listener

#[cfg(feature = "interrupt-bridge")]
pub mod bridge;
pub mod listener;

use crate::error::HandlerInstallError;

/// Resolve a signal name such as `SIGINT` (or `INT`) to its number
pub fn signal_number(name: &str) -> Result<i32, HandlerInstallError> {
    use signal_hook::consts::*;

    let upper = name.trim().to_ascii_uppercase();
    let bare = upper.strip_prefix("SIG").unwrap_or(&upper);
    let number = match bare {
        "INT" => SIGINT,
        "TERM" => SIGTERM,
        #[cfg(unix)]
        "HUP" => SIGHUP,
        #[cfg(unix)]
        "QUIT" => SIGQUIT,
        #[cfg(unix)]
        "USR1" => SIGUSR1,
        #[cfg(unix)]
        "USR2" => SIGUSR2,
        _ => return Err(HandlerInstallError::UnknownSignal(name.to_string())),
    };
    Ok(number)
}

/// Resolve every name in `names`, failing on the first unknown one
pub fn signal_numbers<S: AsRef<str>>(names: &[S]) -> Result<Vec<i32>, HandlerInstallError> {
    names.iter().map(|n| signal_number(n.as_ref())).collect()
}
