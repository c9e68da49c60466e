// CLI Command Implementations
// Handles execution of each CLI command with colored output

use super::{error, info, success, warning, Commands};
use anyhow::{Context, Result};
use colored::*;
use lifeline::signals::listener::shutdown_listener;
use lifeline::{ChannelKind, DualEndpointChannel, FnSubsystem, LifecycleManager, LifelineConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info as log_info, Instrument};

/// Execute a CLI command
pub async fn execute(command: Commands) -> Result<()> {
    match command {
        Commands::Watch { config, timeout, blocking } => {
            let span = lifeline::observability::lifecycle_span("watch");
            watch_command(config, timeout, blocking).instrument(span).await
        }
        Commands::Probe => probe_command(),
        Commands::Validate { file } => validate_command(file),
    }
}

/// Initialize, wait for shutdown, clean up
async fn watch_command(config_path: String, timeout: Option<u64>, blocking: bool) -> Result<()> {
    info(&format!("Loading configuration from {}", config_path.bright_white()));
    let config = LifelineConfig::load(&config_path)?;

    let manager = lifeline::global();
    manager.reconfigure(config.lifecycle.clone())?;
    manager.register(Arc::new(FnSubsystem::new(
        "watch-journal",
        || {
            log_info!("watch-journal online");
            true
        },
        || log_info!("watch-journal offline"),
    )))?;

    if config.lifecycle.interrupt_bridge && !cfg!(feature = "interrupt-bridge") {
        warning("Built without the interrupt-bridge feature - Ctrl+C will terminate immediately");
    }

    manager
        .global_init()
        .context("Global initialization failed")?;
    success(&format!(
        "Lifecycle initialized on a {} channel",
        config.lifecycle.channel_kind().to_string().cyan()
    ));

    let timeout = timeout.or(config.watch.timeout_secs).map(Duration::from_secs);
    let result = if blocking {
        wait_blocking(manager, timeout, Duration::from_millis(config.watch.poll_interval_ms))
    } else {
        wait_async(manager, timeout).await
    };

    manager.global_cleanup();
    success("Lifecycle torn down");
    result
}

async fn wait_async(manager: &'static LifecycleManager, timeout: Option<Duration>) -> Result<()> {
    let listener = shutdown_listener(manager)?;
    tokio::pin!(listener);

    match timeout {
        Some(limit) => {
            tokio::select! {
                res = &mut listener => res?,
                _ = tokio::time::sleep(limit) => {
                    info(&format!("Timeout of {}s reached - requesting shutdown", limit.as_secs()));
                    manager.request_shutdown();
                    listener.as_mut().await?;
                }
            }
        }
        None => {
            info("Waiting for shutdown (send the configured interrupt signal)");
            listener.await?;
        }
    }

    success("Shutdown observed");
    Ok(())
}

fn wait_blocking(manager: &LifecycleManager, timeout: Option<Duration>, interval: Duration) -> Result<()> {
    let observer = manager.duplicate_observer_handle()?;
    let started = std::time::Instant::now();

    while !observer.wait(interval) {
        if timeout.is_some_and(|limit| started.elapsed() >= limit) {
            info("Timeout reached - requesting shutdown");
            manager.request_shutdown();
        }
    }

    observer.close();
    success("Shutdown observed");
    Ok(())
}

/// Create, signal and observe every channel kind this platform supports
fn probe_command() -> Result<()> {
    let mut failures = 0;

    for kind in [ChannelKind::Pipe, ChannelKind::Loopback] {
        if !kind.is_supported() {
            warning(&format!("{kind}: not supported on this platform"));
            continue;
        }
        match probe(kind) {
            Ok(()) => success(&format!("{kind}: created, signaled and observed")),
            Err(e) => {
                failures += 1;
                error(&format!("{kind}: {e:#}"));
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} channel kind(s) failed the probe");
    }
    Ok(())
}

fn probe(kind: ChannelKind) -> Result<()> {
    let mut channel = DualEndpointChannel::create_with(kind)?;
    channel.set_nonblocking()?;
    if channel.is_signaled() {
        anyhow::bail!("fresh channel already signaled");
    }

    let observer = channel.duplicate()?;
    channel.signal();
    if !observer.wait(Duration::from_secs(1)) {
        anyhow::bail!("duplicate did not observe the signal");
    }
    observer.close();

    if !channel.is_signaled() {
        anyhow::bail!("closing the duplicate cleared the original");
    }
    channel.close();
    Ok(())
}

/// Validate configuration
fn validate_command(file: String) -> Result<()> {
    info(&format!("Validating {}", file.bright_white()));
    let config = LifelineConfig::load(&file)?;
    config.validate()?;

    success("Configuration is valid");
    println!("  {} {}", "Channel:".bright_white(), config.lifecycle.channel_kind());
    println!(
        "  {} {}",
        "Interrupt bridge:".bright_white(),
        if config.lifecycle.interrupt_bridge { "enabled".green() } else { "disabled".yellow() }
    );
    println!("  {} {}", "Signals:".bright_white(), config.lifecycle.interrupt_signals.join(", "));
    Ok(())
}
