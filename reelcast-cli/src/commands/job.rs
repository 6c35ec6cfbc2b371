//! Job command handlers
//!
//! Submitting jobs, checking on them and listing them.

use std::str::FromStr;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Subcommand, ValueEnum};
use colored::*;
use reelcast_client::ReelcastClient;
use reelcast_core::domain::job::{JobStatus, Theme};
use reelcast_core::dto::job::{CreateJob, JobStatusResponse};

use crate::config::Config;
use crate::id_resolver::resolve_job_id;

/// Card theme as accepted on the command line
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ThemeArg {
    Light,
    Dark,
}

impl From<ThemeArg> for Theme {
    fn from(arg: ThemeArg) -> Self {
        match arg {
            ThemeArg::Light => Theme::Light,
            ThemeArg::Dark => Theme::Dark,
        }
    }
}

/// Job subcommands
#[derive(Subcommand)]
pub enum JobCommands {
    /// Submit a new rendering job
    Submit {
        /// Post text shown on the card
        #[arg(long)]
        text: String,

        /// Avatar image URL
        #[arg(long)]
        image_url: String,

        /// Author display name
        #[arg(long)]
        display_name: String,

        /// Author handle, with or without a leading @
        #[arg(long)]
        handle: String,

        #[arg(long, value_enum)]
        theme: Option<ThemeArg>,

        /// Wait for the job to finish
        #[arg(short, long)]
        wait: bool,
    },
    /// Show a job's status
    Status {
        /// Job ID or unambiguous prefix
        id: String,

        /// Poll until the job completes or fails
        #[arg(short, long)]
        wait: bool,

        /// Seconds between polls while waiting
        #[arg(long, default_value_t = 2)]
        interval: u64,

        /// Give up waiting after this many seconds
        #[arg(long, default_value_t = 600)]
        timeout: u64,
    },
    /// List jobs
    List {
        /// Only show jobs in this status
        #[arg(long, value_parser = JobStatus::from_str)]
        status: Option<JobStatus>,
    },
}

/// Handle job commands
pub async fn handle_job_command(command: JobCommands, config: &Config) -> Result<()> {
    let client = config.client();

    match command {
        JobCommands::Submit {
            text,
            image_url,
            display_name,
            handle,
            theme,
            wait,
        } => {
            let req = CreateJob {
                text,
                image_url,
                display_name,
                handle,
                theme: theme.map(Theme::from),
            };
            submit_job(&client, &req, wait).await
        }
        JobCommands::Status {
            id,
            wait,
            interval,
            timeout,
        } => {
            let id = resolve_job_id(&client, &id).await?;
            let job = if wait {
                wait_for_job(
                    &client,
                    id,
                    Duration::from_secs(interval.max(1)),
                    Duration::from_secs(timeout),
                )
                .await?
            } else {
                client.get_job(id).await?
            };
            print_job_details(&job);
            Ok(())
        }
        JobCommands::List { status } => list_jobs(&client, status).await,
    }
}

async fn submit_job(client: &ReelcastClient, req: &CreateJob, wait: bool) -> Result<()> {
    let created = client
        .create_job(req)
        .await
        .context("Failed to submit job")?;

    println!("{}", "✓ Job submitted".green().bold());
    println!("  ID:      {}", created.job_id.to_string().cyan());
    println!("  Status:  {}", colorize_status(&created.status));

    if wait {
        println!();
        let job = wait_for_job(
            client,
            created.job_id,
            Duration::from_secs(2),
            Duration::from_secs(600),
        )
        .await?;
        print_job_details(&job);
    }

    Ok(())
}

/// Poll a job until it reaches a terminal state
async fn wait_for_job(
    client: &ReelcastClient,
    id: uuid::Uuid,
    interval: Duration,
    timeout: Duration,
) -> Result<JobStatusResponse> {
    let started = Instant::now();
    let mut last_step = None;

    loop {
        let job = client.get_job(id).await?;
        if job.status.is_terminal() {
            return Ok(job);
        }

        if job.current_step != last_step {
            if let Some(step) = &job.current_step {
                println!(
                    "{} {} ({}%)",
                    "…".dimmed(),
                    step,
                    job.progress.unwrap_or_default()
                );
            }
            last_step = job.current_step.clone();
        }

        if started.elapsed() >= timeout {
            bail!(
                "Timed out after {}s waiting for job {} (still {})",
                timeout.as_secs(),
                id,
                job.status
            );
        }
        tokio::time::sleep(interval).await;
    }
}

async fn list_jobs(client: &ReelcastClient, status: Option<JobStatus>) -> Result<()> {
    let jobs = client.list_jobs(status).await?;

    if jobs.is_empty() {
        println!("{}", "No jobs found.".yellow());
    } else {
        println!("{}", format!("Found {} job(s):", jobs.len()).bold());
        println!();
        for job in &jobs {
            print_job_summary(job);
        }
    }

    Ok(())
}

fn print_job_summary(job: &JobStatusResponse) {
    println!("  {} Job {}", "▸".cyan(), job.job_id.to_string().dimmed());
    println!("    Status:   {}", colorize_status(&job.status));
    println!(
        "    Created:  {}",
        job.created_at
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    );
    println!();
}

fn print_job_details(job: &JobStatusResponse) {
    println!("{}", "Job Details:".bold());
    println!("  ID:          {}", job.job_id.to_string().cyan());
    println!("  Status:      {}", colorize_status(&job.status));
    println!("  Created:     {}", job.created_at.format("%Y-%m-%d %H:%M:%S"));

    if let Some(step) = &job.current_step {
        println!("  Step:        {}", step);
    }
    if let Some(progress) = job.progress {
        println!("  Progress:    {}%", progress);
    }

    if let Some(completed) = job.completed_at {
        println!("  Completed:   {}", completed.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(url) = &job.download_url {
        println!("\n{}", "Video:".bold());
        println!("  URL:         {}", url.cyan());
        if let Some(expires) = job.expires_at {
            println!("  Expires:     {}", expires.format("%Y-%m-%d %H:%M:%S"));
        }
        if let Some(size) = job.file_size {
            println!("  Size:        {} bytes", size);
        }
        if let (Some(duration), Some(resolution)) = (job.duration, &job.resolution) {
            println!("  Format:      {}s, {}", duration, resolution);
        }
    }

    if let Some(error) = &job.error {
        if let Some(failed) = job.failed_at {
            println!("  Failed:      {}", failed.format("%Y-%m-%d %H:%M:%S"));
        }
        println!("\n{}", "Error:".bold());
        println!("{}", error.red());
    }
}

/// Colorize job status for display
fn colorize_status(status: &JobStatus) -> ColoredString {
    let label = status.as_str();
    match status {
        JobStatus::Pending => label.yellow(),
        JobStatus::Processing => label.cyan(),
        JobStatus::Completed => label.green(),
        JobStatus::Failed => label.red(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_theme_arg_maps_to_theme() {
        assert_eq!(Theme::from(ThemeArg::Dark), Theme::Dark);
        assert_eq!(Theme::from(ThemeArg::Light), Theme::Light);
    }
}
