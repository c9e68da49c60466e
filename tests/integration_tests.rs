// Integration Tests for Lifeline
// Exercise the public boundary: global init/cleanup, shutdown requests, observers

use lifeline::error::{DuplicationError, InitStage};
use lifeline::{
    FnSubsystem, LifecycleConfig, LifecycleManager, ShutdownState, StatusCode, Subsystem,
};
use serial_test::serial;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Stand-in for an HTTP transport's global setup: counts calls, can be told to fail
#[derive(Default)]
struct Transport {
    inits: AtomicUsize,
    cleanups: AtomicUsize,
    refuse: AtomicBool,
}

impl Transport {
    fn subsystem(self: &Arc<Self>, name: &'static str) -> Arc<dyn Subsystem> {
        let (on_init, on_cleanup) = (self.clone(), self.clone());
        Arc::new(FnSubsystem::new(
            name,
            move || {
                on_init.inits.fetch_add(1, Ordering::SeqCst);
                !on_init.refuse.load(Ordering::SeqCst)
            },
            move || {
                on_cleanup.cleanups.fetch_add(1, Ordering::SeqCst);
            },
        ))
    }

    fn counts(&self) -> (usize, usize) {
        (self.inits.load(Ordering::SeqCst), self.cleanups.load(Ordering::SeqCst))
    }
}

#[test]
fn test_init_init_shutdown_cleanup_cleanup() {
    let transport = Arc::new(Transport::default());
    let worker = Arc::new(Transport::default());
    let manager = LifecycleManager::with_dependents(
        LifecycleConfig::without_bridge(),
        vec![transport.subsystem("transport"), worker.subsystem("worker")],
    );

    manager.global_init().unwrap();
    manager.global_init().unwrap();
    assert!(!manager.is_shutting_down());

    manager.request_shutdown();
    assert!(manager.is_shutting_down());

    manager.global_cleanup();
    assert_eq!(transport.counts(), (1, 0));
    assert_eq!(worker.counts(), (1, 0));

    manager.global_cleanup();
    assert_eq!(transport.counts(), (1, 1));
    assert_eq!(worker.counts(), (1, 1));
    assert!(!manager.is_shutting_down());
    assert_eq!(manager.state(), ShutdownState::Unarmed);
}

#[test]
fn test_failure_at_second_stage_then_recovery() {
    let transport = Arc::new(Transport::default());
    let worker = Arc::new(Transport::default());
    worker.refuse.store(true, Ordering::SeqCst);
    let manager = LifecycleManager::with_dependents(
        LifecycleConfig::without_bridge(),
        vec![transport.subsystem("transport"), worker.subsystem("worker")],
    );

    let err = manager.global_init().unwrap_err();
    assert_eq!(err.code(), StatusCode::GlobalInitFailed);
    assert_eq!(err.stage(), InitStage::Dependent { index: 1, name: "worker".to_string() });
    assert_eq!(transport.counts(), (1, 1), "first stage rolled back");
    assert_eq!(worker.counts(), (1, 0), "failed stage is not cleaned up");
    assert_eq!(manager.ref_count(), 0);
    assert!(matches!(
        manager.duplicate_observer_handle(),
        Err(DuplicationError::NotArmed)
    ));

    worker.refuse.store(false, Ordering::SeqCst);
    manager.global_init().unwrap();
    assert_eq!(transport.counts(), (2, 1));
    assert_eq!(worker.counts(), (2, 0));
    assert_eq!(manager.ref_count(), 1);

    manager.global_cleanup();
    assert_eq!(transport.counts(), (2, 2));
    assert_eq!(worker.counts(), (2, 1));
}

#[test]
fn test_concurrent_init_and_cleanup() {
    const CALLERS: usize = 32;
    let transport = Arc::new(Transport::default());
    let manager = LifecycleManager::with_dependents(
        LifecycleConfig::without_bridge(),
        vec![transport.subsystem("transport")],
    );

    std::thread::scope(|s| {
        for _ in 0..CALLERS {
            s.spawn(|| {
                manager.global_init().unwrap();
                assert!(manager.ref_count() >= 1);
            });
        }
    });
    assert_eq!(manager.ref_count(), CALLERS);
    assert_eq!(transport.counts(), (1, 0));

    // Signal and observe concurrently with the remaining references held
    std::thread::scope(|s| {
        s.spawn(|| manager.request_shutdown());
        for _ in 0..4 {
            s.spawn(|| {
                let observer = manager.duplicate_observer_handle().unwrap();
                assert!(observer.wait(Duration::from_secs(2)));
            });
        }
    });

    std::thread::scope(|s| {
        for _ in 0..CALLERS {
            s.spawn(|| manager.global_cleanup());
        }
    });
    assert_eq!(manager.ref_count(), 0);
    assert_eq!(transport.counts(), (1, 1));
}

#[test]
fn test_observer_outlives_close_independently() {
    let manager = LifecycleManager::new(LifecycleConfig::without_bridge());
    manager.global_init().unwrap();

    let first = manager.duplicate_observer_handle().unwrap();
    let second = manager.duplicate_observer_handle().unwrap();
    assert_ne!(first.as_raw(), second.as_raw());

    manager.request_shutdown();
    first.close();
    assert!(second.is_signaled());
    assert!(manager.is_shutting_down());

    manager.global_cleanup();
    second.close();
}

#[test]
#[serial]
fn test_process_wide_manager() {
    lifeline::global()
        .reconfigure(LifecycleConfig::without_bridge())
        .unwrap();

    lifeline::request_shutdown();
    assert!(!lifeline::is_shutting_down());

    lifeline::global_init().unwrap();
    assert!(!lifeline::is_shutting_down());

    let observer = lifeline::dup_shutdown_handle().unwrap();
    lifeline::request_shutdown();
    assert!(lifeline::is_shutting_down());
    assert!(observer.is_signaled());

    lifeline::global_cleanup();
    assert!(!lifeline::is_shutting_down());
    assert!(lifeline::dup_shutdown_handle().is_err());

    // A fresh lifecycle starts unsignaled
    lifeline::global_init().unwrap();
    assert!(!lifeline::is_shutting_down());
    lifeline::global_cleanup();
}

#[tokio::test]
async fn test_async_listener_with_loopback_channel() {
    let config = LifecycleConfig {
        channel: lifeline::config::ChannelChoice::Loopback,
        ..LifecycleConfig::without_bridge()
    };
    let manager = Arc::new(LifecycleManager::new(config));
    manager.global_init().unwrap();

    let listener = lifeline::signals::listener::shutdown_listener(&manager).unwrap();
    let waiter = tokio::spawn(listener);

    let requester = manager.clone();
    tokio::task::spawn_blocking(move || requester.request_shutdown())
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(2), waiter)
        .await
        .expect("listener timed out")
        .unwrap()
        .unwrap();

    manager.global_cleanup();
}
