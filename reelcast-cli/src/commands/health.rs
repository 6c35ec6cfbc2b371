//! Health command handler

use anyhow::{Context, Result};
use colored::*;

use crate::config::Config;

/// Print job counts and background task state
pub async fn handle_health(config: &Config) -> Result<()> {
    let health = config
        .client()
        .health()
        .await
        .with_context(|| format!("Failed to reach orchestrator at {}", config.orchestrator_url))?;

    println!("{} {}", "Status:".bold(), health.status.green());

    println!("\n{}", "Jobs:".bold());
    println!("  Pending:     {}", health.jobs.pending.to_string().yellow());
    println!("  Processing:  {}", health.jobs.processing.to_string().cyan());
    println!("  Completed:   {}", health.jobs.completed.to_string().green());
    println!("  Failed:      {}", health.jobs.failed.to_string().red());
    println!("  Total:       {}", health.jobs.total);

    println!("\n{}", "Worker:".bold());
    println!("  Running:     {}", on_off(health.worker.running));
    println!(
        "  Busy slots:  {}/{}",
        health.worker.current_job_count, health.worker.max_concurrent_jobs
    );
    for id in &health.worker.processing_jobs {
        println!("    {} {}", "▸".cyan(), id.to_string().dimmed());
    }

    println!("\n{}", "Sweeper:".bold());
    println!("  Running:     {}", on_off(health.sweeper.running));
    println!("  Interval:    {} min", health.sweeper.interval_minutes);
    println!("  Retention:   {} h", health.sweeper.retention_hours);

    Ok(())
}

fn on_off(running: bool) -> ColoredString {
    if running { "yes".green() } else { "no".red() }
}
