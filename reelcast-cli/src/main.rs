//! Reelcast CLI
//!
//! Command-line interface for submitting jobs to the Reelcast orchestrator
//! and fetching the resulting videos.

mod commands;
mod config;
mod id_resolver;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "reelcast")]
#[command(about = "Reelcast video rendering CLI", long_about = None)]
struct Cli {
    /// Orchestrator URL
    #[arg(long, env = "REELCAST_URL", default_value = "http://localhost:8080")]
    url: String,

    /// Shared secret used to sign job submissions
    #[arg(long, env = "REELCAST_SECRET", hide_env_values = true)]
    secret: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        orchestrator_url: cli.url,
        secret: cli.secret,
    };

    handle_command(cli.command, &config).await
}
