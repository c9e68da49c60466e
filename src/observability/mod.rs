// Observability infrastructure using tracing crate
// The library only emits events; binaries decide where they go

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when RUST_LOG is unset
const DEFAULT_FILTER: &str = "lifeline=info";

/// Initialize the global subscriber
/// Human-readable by default, JSON lines with `json`; `verbose` raises lifeline to debug
pub fn init(json: bool, verbose: bool) -> Result<()> {
    // Example: RUST_LOG=lifeline=debug
    let default = if verbose { "lifeline=debug" } else { DEFAULT_FILTER };
    let filter_layer = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default))?;

    let registry = tracing_subscriber::registry().with(filter_layer);
    if json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()?;
    }

    Ok(())
}

/// Span covering one lifecycle of the demo binary
#[inline]
pub fn lifecycle_span(command: &str) -> tracing::Span {
    tracing::info_span!("lifecycle", command = command, pid = std::process::id())
}
