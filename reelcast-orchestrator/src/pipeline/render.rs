//! Process-backed renderer
//!
//! Invokes an external renderer (a headless-browser wrapper) as
//! `<program> --output <path>` with the job's content descriptor as JSON on
//! stdin.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reelcast_core::domain::job::JobRequest;
use tokio::process::Command;
use tracing::debug;
use uuid::Uuid;

use super::{Renderer, StageError, expect_output, run_command};

pub struct CommandRenderer {
    program: PathBuf,
}

impl CommandRenderer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn output_path(work_dir: &Path, job_id: Uuid) -> PathBuf {
        work_dir.join(format!("card_{}.png", job_id))
    }
}

#[async_trait]
impl Renderer for CommandRenderer {
    async fn render(
        &self,
        job_id: Uuid,
        request: &JobRequest,
        work_dir: &Path,
    ) -> Result<PathBuf, StageError> {
        let output = Self::output_path(work_dir, job_id);
        let input =
            serde_json::to_vec(request).map_err(|e| StageError::InvalidInput(e.to_string()))?;

        debug!(job_id = %job_id, program = %self.program.display(), "Rendering card");

        let mut command = Command::new(&self.program);
        command.arg("--output").arg(&output);
        run_command(&mut command, Some(input)).await?;

        expect_output(output).await
    }
}
