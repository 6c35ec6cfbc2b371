//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod download;
mod health;
mod job;

pub use job::JobCommands;

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Job management
    Job {
        #[command(subcommand)]
        command: JobCommands,
    },
    /// Download a finished video
    Download {
        /// Job ID (or prefix), or a stored file name ending in .mp4
        target: String,

        /// Where to write the video (defaults to the stored file name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show orchestrator health
    Health,
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Job { command } => job::handle_job_command(command, config).await,
        Commands::Download { target, output } => {
            download::handle_download(&target, output, config).await
        }
        Commands::Health => health::handle_health(config).await,
    }
}
