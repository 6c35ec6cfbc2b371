//! ID resolver module
//!
//! Resolves job id prefixes to full UUIDs so users can type short ids.

use anyhow::{Context, Result, anyhow};
use reelcast_client::ReelcastClient;
use uuid::Uuid;

/// Resolve a job ID or unambiguous prefix to a full UUID
///
/// A full UUID is returned as is; a prefix is matched against every job the
/// orchestrator knows about.
pub async fn resolve_job_id(client: &ReelcastClient, input: &str) -> Result<Uuid> {
    if let Ok(uuid) = Uuid::parse_str(input) {
        return Ok(uuid);
    }

    let jobs = client
        .list_jobs(None)
        .await
        .context("Failed to fetch jobs for ID resolution")?;

    match_prefix(jobs.iter().map(|j| j.job_id), input)
}

fn match_prefix(ids: impl Iterator<Item = Uuid>, input: &str) -> Result<Uuid> {
    let prefix = input.to_lowercase();
    if prefix.is_empty() {
        return Err(anyhow!("Job ID cannot be empty"));
    }

    let matches: Vec<Uuid> = ids
        .filter(|id| id.to_string().starts_with(&prefix))
        .collect();

    match matches.as_slice() {
        [] => Err(anyhow!("No job found with ID starting with '{}'", prefix)),
        [id] => Ok(*id),
        _ => {
            let ids: Vec<String> = matches.iter().map(Uuid::to_string).collect();
            Err(anyhow!(
                "Ambiguous prefix '{}' matches multiple jobs: {}",
                prefix,
                ids.join(", ")
            ))
        }
    }
}
