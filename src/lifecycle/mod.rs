// Global Lifecycle Manager
// Reference-counted one-time construction of the shutdown channel and dependent subsystems

pub mod subsystem;

pub use subsystem::{FnSubsystem, Subsystem};

use crate::channel::handle::{poll_readable, write_byte, AtomicRawHandle, ObserverHandle, INVALID_HANDLE};
use crate::config::LifecycleConfig;
use crate::error::{DuplicationError, InitError, RegisterError, SubsystemError};
use crate::shutdown::{ShutdownChannel, ShutdownState};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

#[cfg(feature = "interrupt-bridge")]
use crate::signals::bridge::InterruptBridge;

/// Process-wide manager behind the free functions below
static GLOBAL: Lazy<LifecycleManager> = Lazy::new(LifecycleManager::default);

/// Lifecycle manager
///
/// `global_init` may be called any number of times from any thread; only the
/// call that takes the count from 0 to 1 builds anything, and only the
/// `global_cleanup` that brings it back to 0 tears it down. A failed init
/// rolls back in reverse order and leaves the manager ready for a retry.
///
/// The lock only guards construction and teardown. Requesting and polling
/// shutdown go through the raw channel ends published below, so they never
/// wait on a dependent's init or cleanup and may be called from inside one.
/// A caller that loaded a handle just before teardown may write to or poll a
/// descriptor that is being closed (or was reused); the write fails or lands
/// as a stray byte, the poll reports a stale answer. That race is accepted.
pub struct LifecycleManager {
    state: Mutex<ManagerState>,

    /// Channel ends while armed, `INVALID_HANDLE` otherwise
    notify: AtomicRawHandle,
    observe: AtomicRawHandle,
}

struct ManagerState {
    config: LifecycleConfig,

    ref_count: usize,

    /// Registration order is init order
    registered: Vec<Arc<dyn Subsystem>>,

    /// Dependents whose init succeeded in the current lifecycle
    active: Vec<Arc<dyn Subsystem>>,

    /// Present iff `ref_count > 0`
    shutdown: Option<ShutdownChannel>,

    #[cfg(feature = "interrupt-bridge")]
    bridge: Option<InterruptBridge>,
}

impl LifecycleManager {
    /// Create an unarmed manager with no dependents
    pub fn new(config: LifecycleConfig) -> Self {
        Self::with_dependents(config, Vec::new())
    }

    /// Create an unarmed manager with dependents in init order
    pub fn with_dependents(config: LifecycleConfig, dependents: Vec<Arc<dyn Subsystem>>) -> Self {
        Self {
            state: Mutex::new(ManagerState {
                config,
                ref_count: 0,
                registered: dependents,
                active: Vec::new(),
                shutdown: None,
                #[cfg(feature = "interrupt-bridge")]
                bridge: None,
            }),
            notify: AtomicRawHandle::new(INVALID_HANDLE),
            observe: AtomicRawHandle::new(INVALID_HANDLE),
        }
    }

    /// Append a dependent; rejected while initialized
    pub fn register(&self, dependent: Arc<dyn Subsystem>) -> Result<(), RegisterError> {
        let mut state = self.state.lock();
        if state.ref_count > 0 {
            return Err(RegisterError::Armed(format!("dependent `{}`", dependent.name())));
        }
        debug!(subsystem = dependent.name(), position = state.registered.len(), "Dependent registered");
        state.registered.push(dependent);
        Ok(())
    }

    /// Replace the configuration; rejected while initialized
    pub fn reconfigure(&self, config: LifecycleConfig) -> Result<(), RegisterError> {
        let mut state = self.state.lock();
        if state.ref_count > 0 {
            return Err(RegisterError::Armed("configuration".to_string()));
        }
        state.config = config;
        Ok(())
    }

    /// Initialize, or add a reference if already initialized
    #[instrument(skip(self))]
    pub fn global_init(&self) -> Result<(), InitError> {
        let mut state = self.state.lock();

        if state.ref_count > 0 {
            state.ref_count += 1;
            debug!(ref_count = state.ref_count, "Lifecycle already initialized");
            return Ok(());
        }

        match state.construct() {
            Ok(()) => {
                state.ref_count = 1;
                self.publish(state.shutdown.as_ref());
                info!(
                    dependents = state.active.len(),
                    kind = ?state.shutdown.as_ref().map(|s| s.kind()),
                    "Lifecycle initialized"
                );
                Ok(())
            }
            Err(err) => {
                error!(stage = %err.stage(), error = %err, "Global initialization failed - rolling back");
                state.teardown();
                Err(err)
            }
        }
    }

    /// Drop a reference; the last one tears everything down
    #[instrument(skip(self))]
    pub fn global_cleanup(&self) {
        let mut state = self.state.lock();

        if state.ref_count == 0 {
            debug!("Cleanup without matching init ignored");
            return;
        }

        state.ref_count -= 1;
        if state.ref_count > 0 {
            debug!(ref_count = state.ref_count, "Lifecycle reference released");
            return;
        }

        self.publish(None);
        state.teardown();
        info!("Lifecycle torn down");
    }

    /// Signal the shutdown channel; a no-op while unarmed. Lock-free.
    pub fn request_shutdown(&self) {
        let notify = self.notify.load(Ordering::Acquire);
        if notify == INVALID_HANDLE {
            debug!("Shutdown request ignored - lifecycle not initialized");
            return;
        }
        write_byte(notify);
        info!("Shutdown requested");
    }

    /// True once shutdown has been requested; false while unarmed. Never blocks.
    pub fn is_shutting_down(&self) -> bool {
        poll_readable(self.observe.load(Ordering::Acquire), Duration::ZERO)
    }

    /// Caller-owned pollable handle onto the shutdown channel
    pub fn duplicate_observer_handle(&self) -> Result<ObserverHandle, DuplicationError> {
        // Unpublished during construction and teardown, so dependents calling
        // this from their callbacks fail fast instead of taking the lock
        if self.observe.load(Ordering::Acquire) == INVALID_HANDLE {
            return Err(DuplicationError::NotArmed);
        }
        let state = self.state.lock();
        state
            .shutdown
            .as_ref()
            .ok_or(DuplicationError::NotArmed)?
            .duplicate_observer()
    }

    /// Block up to `timeout` for a shutdown request without holding the lock
    pub fn wait_for_shutdown(&self, timeout: Duration) -> Result<bool, DuplicationError> {
        let observer = self.duplicate_observer_handle()?;
        Ok(observer.wait(timeout))
    }

    pub fn state(&self) -> ShutdownState {
        let observe = self.observe.load(Ordering::Acquire);
        if observe == INVALID_HANDLE {
            ShutdownState::Unarmed
        } else if poll_readable(observe, Duration::ZERO) {
            ShutdownState::Signaled
        } else {
            ShutdownState::Armed
        }
    }

    pub fn ref_count(&self) -> usize {
        self.state.lock().ref_count
    }

    pub fn config(&self) -> LifecycleConfig {
        self.state.lock().config.clone()
    }

    /// Expose the channel ends to the lock-free paths; `None` withdraws them
    fn publish(&self, shutdown: Option<&ShutdownChannel>) {
        let (notify, observe) = shutdown.map_or((INVALID_HANDLE, INVALID_HANDLE), |s| {
            (s.notify_raw(), s.observe_raw())
        });
        self.notify.store(notify, Ordering::Release);
        self.observe.store(observe, Ordering::Release);
    }
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new(LifecycleConfig::default())
    }
}

impl ManagerState {
    /// Build everything in order; whatever succeeded stays recorded for rollback
    fn construct(&mut self) -> Result<(), InitError> {
        let registered = self.registered.clone();
        for (index, dependent) in registered.into_iter().enumerate() {
            run_init(dependent.as_ref()).map_err(|source| InitError::Dependent {
                index,
                name: dependent.name().to_string(),
                source,
            })?;
            debug!(subsystem = dependent.name(), index, "Dependent initialized");
            self.active.push(dependent);
        }

        let shutdown = self.shutdown.insert(ShutdownChannel::open(self.config.channel_kind())?);
        shutdown.set_nonblocking()?;

        #[cfg(feature = "interrupt-bridge")]
        if self.config.interrupt_bridge {
            let signals = crate::signals::signal_numbers(self.config.interrupt_signals.as_slice())?;
            let notify = shutdown.notify_raw();
            self.bridge = Some(InterruptBridge::install(notify, &signals)?);
        }

        Ok(())
    }

    /// Reverse construction order; never fails
    fn teardown(&mut self) {
        #[cfg(feature = "interrupt-bridge")]
        if let Some(bridge) = self.bridge.take() {
            bridge.uninstall();
        }

        if let Some(mut shutdown) = self.shutdown.take() {
            shutdown.close();
        }

        while let Some(dependent) = self.active.pop() {
            match run_cleanup(dependent.as_ref()) {
                Ok(()) => debug!(subsystem = dependent.name(), "Dependent cleaned up"),
                Err(e) => warn!(subsystem = dependent.name(), error = %e, "Dependent cleanup failed - continuing"),
            }
        }
    }
}

fn run_init(dependent: &dyn Subsystem) -> Result<(), SubsystemError> {
    panic::catch_unwind(AssertUnwindSafe(|| dependent.init()))
        .unwrap_or_else(|_| Err(format!("{} panicked during init", dependent.name()).into()))
}

fn run_cleanup(dependent: &dyn Subsystem) -> Result<(), SubsystemError> {
    panic::catch_unwind(AssertUnwindSafe(|| dependent.cleanup()))
        .unwrap_or_else(|_| Err(format!("{} panicked during cleanup", dependent.name()).into()))
}

/// The process-wide manager
pub fn global() -> &'static LifecycleManager {
    &GLOBAL
}

pub fn global_init() -> Result<(), InitError> {
    GLOBAL.global_init()
}

pub fn global_cleanup() {
    GLOBAL.global_cleanup()
}

pub fn request_shutdown() {
    GLOBAL.request_shutdown()
}

pub fn is_shutting_down() -> bool {
    GLOBAL.is_shutting_down()
}

pub fn dup_shutdown_handle() -> Result<ObserverHandle, DuplicationError> {
    GLOBAL.duplicate_observer_handle()
}

pub fn register_dependent(dependent: Arc<dyn Subsystem>) -> Result<(), RegisterError> {
    GLOBAL.register(dependent)
}
