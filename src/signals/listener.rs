// Async shutdown listener
// Lets a tokio event loop await the shutdown channel instead of polling it

use crate::channel::handle::ObserverHandle;
use crate::error::DuplicationError;
use crate::lifecycle::LifecycleManager;
use std::future::Future;
use std::io;
use tracing::info;

#[cfg(not(unix))]
const FALLBACK_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(100);

/// Resolve once `observer` reports shutdown. Consumes the observer.
#[cfg(unix)]
pub async fn wait_for_shutdown(observer: ObserverHandle) -> io::Result<()> {
    use tokio::io::unix::AsyncFd;
    use tokio::io::Interest;

    let fd = AsyncFd::with_interest(observer, Interest::READABLE)?;
    loop {
        let mut guard = fd.readable().await?;
        if guard.get_inner().is_signaled() {
            info!("Shutdown requested - observer woke up");
            return Ok(());
        }
        guard.clear_ready();
    }
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown(observer: ObserverHandle) -> io::Result<()> {
    let mut ticker = tokio::time::interval(FALLBACK_POLL_INTERVAL);
    loop {
        ticker.tick().await;
        if observer.is_signaled() {
            info!("Shutdown requested - observer woke up");
            return Ok(());
        }
    }
}

/// Create a future that resolves when `manager` is asked to shut down.
/// The manager must be initialized; the future owns its own observer.
pub fn shutdown_listener(
    manager: &LifecycleManager,
) -> Result<impl Future<Output = io::Result<()>>, DuplicationError> {
    let observer = manager.duplicate_observer_handle()?;
    Ok(wait_for_shutdown(observer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LifecycleConfig;
    use std::time::Duration;

    #[tokio::test]
    async fn test_listener_resolves_after_request() {
        let manager = LifecycleManager::new(LifecycleConfig::without_bridge());
        manager.global_init().unwrap();

        let listener = shutdown_listener(&manager).unwrap();
        tokio::pin!(listener);

        let early = tokio::time::timeout(Duration::from_millis(50), &mut listener).await;
        assert!(early.is_err(), "listener resolved before shutdown");

        manager.request_shutdown();
        tokio::time::timeout(Duration::from_secs(2), listener)
            .await
            .expect("listener did not resolve")
            .unwrap();

        manager.global_cleanup();
    }

    #[tokio::test]
    async fn test_listener_requires_armed_manager() {
        let manager = LifecycleManager::new(LifecycleConfig::without_bridge());
        assert!(matches!(
            shutdown_listener(&manager),
            Err(DuplicationError::NotArmed)
        ));
    }
}
