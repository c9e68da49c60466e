// Configuration Management Module
// Handles lifeline.toml loading, defaults, and validation

use crate::channel::ChannelKind;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Top-level configuration for the lifeline binary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LifelineConfig {
    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    #[serde(default)]
    pub watch: WatchConfig,
}

/// Channel selection for the shutdown channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelChoice {
    /// Pipe where available, loopback sockets otherwise
    #[default]
    Auto,
    Pipe,
    Loopback,
}

impl ChannelChoice {
    pub fn resolve(self) -> ChannelKind {
        match self {
            ChannelChoice::Auto => ChannelKind::platform_default(),
            ChannelChoice::Pipe => ChannelKind::Pipe,
            ChannelChoice::Loopback => ChannelKind::Loopback,
        }
    }
}

/// Settings consumed by the lifecycle manager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    #[serde(default)]
    pub channel: ChannelChoice,

    /// Only honored when built with the `interrupt-bridge` feature
    #[serde(default = "default_true")]
    pub interrupt_bridge: bool,

    #[serde(default = "default_interrupt_signals")]
    pub interrupt_signals: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Request shutdown ourselves after this many seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

// Default value functions
fn default_true() -> bool { true }
fn default_interrupt_signals() -> Vec<String> { vec!["SIGINT".to_string()] }
fn default_poll_interval() -> u64 { 250 }

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            channel: ChannelChoice::default(),
            interrupt_bridge: default_true(),
            interrupt_signals: default_interrupt_signals(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            timeout_secs: None,
        }
    }
}

impl LifecycleConfig {
    /// Defaults with the interrupt bridge switched off
    pub fn without_bridge() -> Self {
        Self {
            interrupt_bridge: false,
            ..Self::default()
        }
    }

    pub fn channel_kind(&self) -> ChannelKind {
        self.channel.resolve()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !self.channel_kind().is_supported() {
            anyhow::bail!("Channel kind `{}` is not supported on this platform", self.channel_kind());
        }

        if self.interrupt_bridge && self.interrupt_signals.is_empty() {
            anyhow::bail!("At least one interrupt signal is required when interrupt_bridge is enabled");
        }

        for name in &self.interrupt_signals {
            let signal = crate::signals::signal_number(name)?;
            #[cfg(unix)]
            if signal_hook::consts::FORBIDDEN.contains(&signal) {
                anyhow::bail!("Signal {} cannot be used for shutdown", name);
            }
            #[cfg(not(unix))]
            let _ = signal;
        }

        Ok(())
    }
}

impl LifelineConfig {
    /// Load configuration from file or use defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let contents = std::fs::read_to_string(path)
                .context("Failed to read configuration file")?;

            let config: LifelineConfig = toml::from_str(&contents)
                .context("Failed to parse configuration file")?;

            config.validate()?;
            Ok(config)
        } else {
            warn!("Configuration file not found, using defaults");
            info!("Create lifeline.toml to customize configuration");
            Ok(Self::default())
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.lifecycle.validate()?;

        if self.watch.poll_interval_ms == 0 {
            anyhow::bail!("Poll interval must be at least 1ms");
        }

        if self.watch.timeout_secs == Some(0) {
            anyhow::bail!("Watch timeout must be at least 1 second");
        }

        Ok(())
    }
}
