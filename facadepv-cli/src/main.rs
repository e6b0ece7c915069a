//! Binary crate for the `facadepv` command-line tool.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Interactive provider configuration
//! - Human-friendly output formatting (series previews, warnings, the final
//!   kWh figure)

use clap::Parser;

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cmd = cli::Cli::parse();
    cmd.run().await
}
