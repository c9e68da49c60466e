// Shutdown channel
// Level-triggered "shutdown requested" flag observable through ordinary polling

use crate::channel::handle::{ObserverHandle, RawHandle};
use crate::channel::{ChannelKind, DualEndpointChannel};
use crate::error::{ChannelCreationError, DuplicationError, NonBlockingError};
use std::time::Duration;
use tracing::debug;

/// Observable state of the shutdown channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    /// No channel constructed
    Unarmed,
    /// Channel open, no shutdown requested yet
    Armed,
    /// Shutdown requested; stays here until the channel is closed
    Signaled,
}

/// Wraps one channel; "signaled" is always read back from the observe end,
/// never cached, so every duplicated observer agrees with it.
#[derive(Debug)]
pub struct ShutdownChannel {
    channel: DualEndpointChannel,
}

impl ShutdownChannel {
    /// Construct the underlying channel. Endpoints are still blocking until
    /// [`ShutdownChannel::set_nonblocking`] runs.
    pub fn open(kind: ChannelKind) -> Result<Self, ChannelCreationError> {
        Ok(Self {
            channel: DualEndpointChannel::create_with(kind)?,
        })
    }

    pub fn set_nonblocking(&self) -> Result<(), NonBlockingError> {
        self.channel.set_nonblocking()
    }

    /// Request shutdown. Lock-free and idempotent.
    pub fn signal(&self) {
        self.channel.signal();
        debug!("Shutdown channel signaled");
    }

    pub fn is_signaled(&self) -> bool {
        self.channel.is_signaled()
    }

    pub fn wait(&self, timeout: Duration) -> bool {
        self.channel.wait(timeout)
    }

    pub fn state(&self) -> ShutdownState {
        if !self.channel.is_open() {
            ShutdownState::Unarmed
        } else if self.is_signaled() {
            ShutdownState::Signaled
        } else {
            ShutdownState::Armed
        }
    }

    pub fn duplicate_observer(&self) -> Result<ObserverHandle, DuplicationError> {
        self.channel.duplicate()
    }

    /// Raw notify end, as handed to the interrupt bridge
    pub fn notify_raw(&self) -> RawHandle {
        self.channel.notify_raw()
    }

    /// Raw observe end, polled directly by the lifecycle manager
    pub fn observe_raw(&self) -> RawHandle {
        self.channel.observe_raw()
    }

    pub fn kind(&self) -> ChannelKind {
        self.channel.kind()
    }

    /// Close the channel. Outstanding observers go stale.
    pub fn close(&mut self) {
        self.channel.close();
    }
}
