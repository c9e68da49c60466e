// Lifeline - process lifecycle and shutdown-signal coordination
// Reference-counted global init/cleanup plus a pollable, interrupt-safe shutdown channel

pub mod channel;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod shutdown;
pub mod signals;

pub use channel::handle::{ObserverHandle, RawHandle, INVALID_HANDLE};
pub use channel::{ChannelKind, DualEndpointChannel};
pub use config::{LifecycleConfig, LifelineConfig};
pub use error::{InitError, InitStage, StatusCode};
pub use lifecycle::{
    dup_shutdown_handle, global, global_cleanup, global_init, is_shutting_down, register_dependent,
    request_shutdown, FnSubsystem, LifecycleManager, Subsystem,
};
pub use shutdown::{ShutdownChannel, ShutdownState};
