// Dual-endpoint signaling channel
// One notify end, one observe end, built on a pipe or a loopback socket pair

pub mod handle;
pub mod loopback;
pub mod nonblock;
#[cfg(unix)]
pub mod pipe;

use crate::error::{ChannelCreationError, DuplicationError, NonBlockingError};
use handle::{poll_readable, raw_of, write_byte, ObserverHandle, OwnedHandle, RawHandle, INVALID_HANDLE};
use std::time::Duration;
use tracing::debug;

/// Primitive backing a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// Anonymous pipe (unix only)
    Pipe,
    /// Connected TCP socket pair on 127.0.0.1
    Loopback,
}

impl ChannelKind {
    /// The lightest primitive the platform's poll API accepts
    pub const fn platform_default() -> Self {
        if cfg!(unix) {
            ChannelKind::Pipe
        } else {
            ChannelKind::Loopback
        }
    }

    pub const fn is_supported(self) -> bool {
        match self {
            ChannelKind::Pipe => cfg!(unix),
            ChannelKind::Loopback => true,
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelKind::Pipe => f.write_str("pipe"),
            ChannelKind::Loopback => f.write_str("loopback"),
        }
    }
}

/// Both endpoints live or die together
#[derive(Debug)]
struct Endpoints {
    notify: OwnedHandle,
    observe: OwnedHandle,
}

/// Unidirectional signaling channel with a pollable observe end
#[derive(Debug)]
pub struct DualEndpointChannel {
    endpoints: Option<Endpoints>,
    kind: ChannelKind,
}

impl DualEndpointChannel {
    /// Create a channel on the platform's default primitive
    pub fn create() -> Result<Self, ChannelCreationError> {
        Self::create_with(ChannelKind::platform_default())
    }

    /// Create a channel on an explicit primitive
    pub fn create_with(kind: ChannelKind) -> Result<Self, ChannelCreationError> {
        let (notify, observe) = match kind {
            #[cfg(unix)]
            ChannelKind::Pipe => pipe::create()?,
            #[cfg(not(unix))]
            ChannelKind::Pipe => {
                return Err(ChannelCreationError::at(crate::error::CreationStep::Pipe)(
                    std::io::Error::new(std::io::ErrorKind::Unsupported, "pipes are not pollable here"),
                ))
            }
            ChannelKind::Loopback => loopback::create()?,
        };
        debug!(%kind, notify = raw_of(&notify), observe = raw_of(&observe), "Channel created");
        Ok(Self {
            endpoints: Some(Endpoints { notify, observe }),
            kind,
        })
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn is_open(&self) -> bool {
        self.endpoints.is_some()
    }

    /// Configure both endpoints non-blocking
    pub fn set_nonblocking(&self) -> Result<(), NonBlockingError> {
        if let Some(ep) = &self.endpoints {
            nonblock::set_nonblocking(&ep.notify)?;
            nonblock::set_nonblocking(&ep.observe)?;
        }
        Ok(())
    }

    /// Write one byte to the notify end; repeated calls are harmless
    pub fn signal(&self) {
        write_byte(self.notify_raw());
    }

    /// Zero-timeout readability check on the observe end
    pub fn is_signaled(&self) -> bool {
        poll_readable(self.observe_raw(), Duration::ZERO)
    }

    /// Wait up to `timeout` for the observe end to become readable
    pub fn wait(&self, timeout: Duration) -> bool {
        poll_readable(self.observe_raw(), timeout)
    }

    /// Independent handle onto the observe end
    pub fn duplicate(&self) -> Result<ObserverHandle, DuplicationError> {
        let ep = self.endpoints.as_ref().ok_or(DuplicationError::NotArmed)?;
        ObserverHandle::duplicate(&ep.observe)
    }

    /// Raw notify handle, `INVALID_HANDLE` once closed
    pub fn notify_raw(&self) -> RawHandle {
        self.endpoints.as_ref().map_or(INVALID_HANDLE, |ep| raw_of(&ep.notify))
    }

    /// Raw observe handle, `INVALID_HANDLE` once closed
    pub fn observe_raw(&self) -> RawHandle {
        self.endpoints.as_ref().map_or(INVALID_HANDLE, |ep| raw_of(&ep.observe))
    }

    /// Release both endpoints; closing twice is a no-op
    pub fn close(&mut self) {
        if let Some(ep) = self.endpoints.take() {
            debug!(kind = %self.kind, "Channel closed");
            drop(ep);
        }
    }
}
