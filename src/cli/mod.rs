// Command Line Interface Module
// Small clap front-end exercising the lifecycle from a real process

pub mod commands;

use clap::{Parser, Subcommand};
use colored::*;

/// Lifeline - shutdown channel and global lifecycle demo
#[derive(Parser)]
#[command(name = "lifeline")]
#[command(author = "Lifeline Team")]
#[command(version)]
#[command(about = "Reference-counted global init with a pollable shutdown channel", long_about = None)]
pub struct Cli {
    /// Emit JSON log lines
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the lifecycle and wait until shutdown is requested
    Watch {
        /// Configuration file path
        #[arg(short, long, default_value = "lifeline.toml")]
        config: String,

        /// Request shutdown ourselves after this many seconds
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Poll the observer handle on this thread instead of awaiting it
        #[arg(long)]
        blocking: bool,
    },

    /// Build each supported channel kind and check that it signals
    Probe,

    /// Validate configuration file
    Validate {
        /// Configuration file to validate
        #[arg(short, long, default_value = "lifeline.toml")]
        file: String,
    },
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red().bold(), msg);
}

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue().bold(), msg);
}

/// Print a warning message
pub fn warning(msg: &str) {
    println!("{} {}", "⚠".yellow().bold(), msg);
}
