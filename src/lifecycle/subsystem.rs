// Dependent subsystem boundary
// Collaborators initialized once per lifecycle, cleaned up in reverse order

use crate::error::SubsystemError;
use std::fmt;

/// A global collaborator brought up by the lifecycle manager
///
/// `init` runs at most once per lifecycle, in registration order. `cleanup`
/// runs only after a successful `init`, in reverse order. Cleanup errors are
/// logged and otherwise ignored.
pub trait Subsystem: Send + Sync {
    fn name(&self) -> &str;

    fn init(&self) -> Result<(), SubsystemError>;

    fn cleanup(&self) -> Result<(), SubsystemError>;
}

/// Adapts a pair of closures with the classic `init() -> bool` / `cleanup()`
/// contract into a [`Subsystem`]
pub struct FnSubsystem<I, C> {
    name: String,
    init: I,
    cleanup: C,
}

impl<I, C> FnSubsystem<I, C>
where
    I: Fn() -> bool + Send + Sync,
    C: Fn() + Send + Sync,
{
    pub fn new(name: impl Into<String>, init: I, cleanup: C) -> Self {
        Self {
            name: name.into(),
            init,
            cleanup,
        }
    }
}

impl<I, C> Subsystem for FnSubsystem<I, C>
where
    I: Fn() -> bool + Send + Sync,
    C: Fn() + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&self) -> Result<(), SubsystemError> {
        if (self.init)() {
            Ok(())
        } else {
            Err(format!("{} reported initialization failure", self.name).into())
        }
    }

    fn cleanup(&self) -> Result<(), SubsystemError> {
        (self.cleanup)();
        Ok(())
    }
}

impl<I, C> fmt::Debug for FnSubsystem<I, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSubsystem").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_fn_subsystem_maps_bool() {
        let cleanups = AtomicUsize::new(0);
        let ok = FnSubsystem::new("ok", || true, || {
            cleanups.fetch_add(1, Ordering::SeqCst);
        });
        assert!(ok.init().is_ok());
        assert!(ok.cleanup().is_ok());
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);

        let failing = FnSubsystem::new("http", || false, || {});
        let err = failing.init().unwrap_err();
        assert_eq!(err.to_string(), "http reported initialization failure");
    }
}
