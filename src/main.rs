// Lifeline - demo binary
// Drives the global lifecycle from the command line

mod cli;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = cli::Cli::parse();

    // Initialize observability with verbosity
    lifeline::observability::init(cli.json, cli.verbose)?;

    if let Err(e) = cli::commands::execute(cli.command).await {
        cli::error(&format!("{e:#}"));
        std::process::exit(1);
    }
    Ok(())
}
