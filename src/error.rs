// Error types for channel construction, handle configuration and global init
// Every fallible step names itself so rollback logs and callers can tell stages apart

use std::fmt;
use std::io;
use thiserror::Error;

/// Failure reported by a dependent subsystem
pub type SubsystemError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Step of dual-endpoint channel construction that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationStep {
    Pipe,
    CloseOnExec,
    ListenerSocket,
    Bind,
    Listen,
    ConnectorSocket,
    Connect,
    Accept,
    PeerMismatch,
}

impl fmt::Display for CreationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let step = match self {
            CreationStep::Pipe => "pipe",
            CreationStep::CloseOnExec => "close-on-exec",
            CreationStep::ListenerSocket => "listener socket",
            CreationStep::Bind => "bind",
            CreationStep::Listen => "listen",
            CreationStep::ConnectorSocket => "connector socket",
            CreationStep::Connect => "connect",
            CreationStep::Accept => "accept",
            CreationStep::PeerMismatch => "peer verification",
        };
        f.write_str(step)
    }
}

/// Socket or pipe allocation failed while building a channel
#[derive(Debug, Error)]
#[error("failed to create shutdown channel at {step} step")]
pub struct ChannelCreationError {
    pub step: CreationStep,
    #[source]
    pub source: io::Error,
}

impl ChannelCreationError {
    pub(crate) fn at(step: CreationStep) -> impl FnOnce(io::Error) -> Self {
        move |source| Self { step, source }
    }
}

/// Setting a handle to non-blocking mode failed
#[derive(Debug, Error)]
#[error("failed to set handle non-blocking")]
pub struct NonBlockingError(#[from] pub io::Error);

/// Duplicating the observe endpoint failed
#[derive(Debug, Error)]
pub enum DuplicationError {
    #[error("shutdown channel is not armed")]
    NotArmed,

    #[error("failed to duplicate observer handle")]
    Io(#[from] io::Error),

    #[error(transparent)]
    NonBlocking(#[from] NonBlockingError),
}

/// Installing the interrupt handler failed
#[derive(Debug, Error)]
pub enum HandlerInstallError {
    #[error("an interrupt bridge is already installed in this process")]
    AlreadyInstalled,

    #[error("signal {0} cannot carry a shutdown handler")]
    Forbidden(i32),

    #[error("unknown signal name `{0}`")]
    UnknownSignal(String),

    #[error("failed to register interrupt handler")]
    Io(#[from] io::Error),
}

/// Stage of global initialization, in construction order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitStage {
    Dependent { index: usize, name: String },
    Channel,
    NonBlocking,
    InterruptBridge,
}

impl fmt::Display for InitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitStage::Dependent { index, name } => write!(f, "dependent #{index} ({name})"),
            InitStage::Channel => f.write_str("shutdown channel"),
            InitStage::NonBlocking => f.write_str("non-blocking setup"),
            InitStage::InterruptBridge => f.write_str("interrupt bridge"),
        }
    }
}

/// Boundary status code for global initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Ok,
    GlobalInitFailed,
}

/// Global initialization failed; everything built by the call was rolled back
#[derive(Debug, Error)]
pub enum InitError {
    #[error("dependent subsystem `{name}` (#{index}) failed to initialize")]
    Dependent {
        index: usize,
        name: String,
        #[source]
        source: SubsystemError,
    },

    #[error(transparent)]
    Channel(#[from] ChannelCreationError),

    #[error(transparent)]
    NonBlocking(#[from] NonBlockingError),

    #[error(transparent)]
    HandlerInstall(#[from] HandlerInstallError),
}

impl InitError {
    /// The first stage that failed
    pub fn stage(&self) -> InitStage {
        match self {
            InitError::Dependent { index, name, .. } => InitStage::Dependent {
                index: *index,
                name: name.clone(),
            },
            InitError::Channel(_) => InitStage::Channel,
            InitError::NonBlocking(_) => InitStage::NonBlocking,
            InitError::HandlerInstall(_) => InitStage::InterruptBridge,
        }
    }

    pub fn code(&self) -> StatusCode {
        StatusCode::GlobalInitFailed
    }
}

/// Dependents and configuration can only change while the manager is unarmed
#[derive(Debug, Error)]
pub enum RegisterError {
    #[error("cannot change {0} while the lifecycle is initialized")]
    Armed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_error_reports_stage() {
        let err = InitError::Dependent {
            index: 1,
            name: "worker".to_string(),
            source: "boom".into(),
        };
        assert_eq!(
            err.stage(),
            InitStage::Dependent { index: 1, name: "worker".to_string() }
        );
        assert_eq!(err.code(), StatusCode::GlobalInitFailed);
        assert_eq!(err.stage().to_string(), "dependent #1 (worker)");
    }

    #[test]
    fn test_channel_error_names_step() {
        let err = ChannelCreationError::at(CreationStep::Accept)(io::Error::from(
            io::ErrorKind::ConnectionRefused,
        ));
        assert_eq!(err.to_string(), "failed to create shutdown channel at accept step");
        assert_eq!(InitError::from(err).stage(), InitStage::Channel);
    }
}
