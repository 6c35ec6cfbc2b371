//! Download command handler

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use colored::*;
use reelcast_core::domain::job::JobStatus;

use crate::config::Config;
use crate::id_resolver::resolve_job_id;

/// Fetch a video by job or by stored name and write it to disk
pub async fn handle_download(target: &str, output: Option<PathBuf>, config: &Config) -> Result<()> {
    let client = config.client();

    let name = if target.ends_with(".mp4") {
        target.to_string()
    } else {
        let id = resolve_job_id(&client, target).await?;
        let job = client.get_job(id).await?;
        if job.status != JobStatus::Completed {
            bail!("Job {} is {}, nothing to download yet", id, job.status);
        }
        let url = job
            .download_url
            .context("Completed job has no download URL")?;
        file_name_from_url(&url)
            .context("Download URL has no file name")?
            .to_string()
    };

    let bytes = client
        .download(&name)
        .await
        .with_context(|| format!("Failed to download {}", name))?;

    let path = output.unwrap_or_else(|| PathBuf::from(&name));
    tokio::fs::write(&path, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!(
        "{} Saved {} ({} bytes)",
        "✓".green(),
        path.display().to_string().cyan(),
        bytes.len()
    );
    Ok(())
}

fn file_name_from_url(url: &str) -> Option<&str> {
    url.rsplit('/').next().filter(|s| !s.is_empty())
}
