//! Pipeline collaborators
//!
//! A job runs through two external stages:
//! - render: turns the content descriptor into a still image
//! - encode: combines that image with a fixed audio track into a video
//!
//! Both are black boxes reached through the traits below. The production
//! implementations shell out to external programs; tests substitute fakes.

mod encode;
mod render;

pub use encode::FfmpegEncoder;
pub use render::CommandRenderer;

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use reelcast_core::domain::job::JobRequest;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use uuid::Uuid;

/// Failure inside a pipeline stage
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("stage produced no output at {0}")]
    MissingOutput(PathBuf),

    #[error("invalid stage input: {0}")]
    InvalidInput(String),

    #[error("stage io error: {0}")]
    Io(#[from] std::io::Error),
}

/// How the encoder composes the final video
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionOptions {
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
    pub fade_in_secs: f64,
    pub fade_out_secs: f64,
    /// Audio gain, 1.0 = unchanged
    pub volume: f64,
}

impl CompositionOptions {
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

impl Default for CompositionOptions {
    fn default() -> Self {
        Self {
            duration_secs: 10.0,
            width: 1080,
            height: 1920,
            fade_in_secs: 0.5,
            fade_out_secs: 0.5,
            volume: 0.5,
        }
    }
}

#[async_trait]
pub trait Renderer: Send + Sync {
    /// Renders the job's content card and returns the image path.
    async fn render(
        &self,
        job_id: Uuid,
        request: &JobRequest,
        work_dir: &Path,
    ) -> Result<PathBuf, StageError>;
}

#[async_trait]
pub trait Encoder: Send + Sync {
    /// Composes `image` and `audio` into a video and returns its path.
    async fn encode(
        &self,
        job_id: Uuid,
        image: &Path,
        audio: &Path,
        options: &CompositionOptions,
        work_dir: &Path,
    ) -> Result<PathBuf, StageError>;
}

/// Runs an external program to completion, feeding it `stdin` if given.
pub(crate) async fn run_command(
    command: &mut Command,
    stdin: Option<Vec<u8>>,
) -> Result<(), StageError> {
    let program = command.as_std().get_program().to_string_lossy().to_string();

    command
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(|source| StageError::Spawn {
        program: program.clone(),
        source,
    })?;

    if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
        pipe.write_all(&input).await?;
        pipe.shutdown().await?;
    }

    let output = child.wait_with_output().await?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(StageError::Failed {
            program,
            status: output.status.to_string(),
            stderr: tail(&stderr, 2000),
        });
    }

    Ok(())
}

/// Ensures a stage actually left a file behind.
pub(crate) async fn expect_output(path: PathBuf) -> Result<PathBuf, StageError> {
    if tokio::fs::try_exists(&path).await? {
        Ok(path)
    } else {
        Err(StageError::MissingOutput(path))
    }
}

fn tail(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    let count = trimmed.chars().count();
    if count <= max_chars {
        return trimmed.to_string();
    }
    trimmed.chars().skip(count - max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = CompositionOptions::default();
        assert_eq!(options.resolution(), "1080x1920");
        assert_eq!(options.duration_secs, 10.0);
    }

    #[test]
    fn test_tail_keeps_end_of_output() {
        assert_eq!(tail("  short  ", 10), "short");
        assert_eq!(tail("abcdef", 3), "def");
    }

    #[tokio::test]
    async fn test_run_command_reports_spawn_failure() {
        let mut command = Command::new("/definitely/not/a/real/program");
        let err = run_command(&mut command, None).await.unwrap_err();
        assert!(matches!(err, StageError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_expect_output_missing() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = expect_output(dir.path().join("nope.png")).await.unwrap_err();
        assert!(matches!(err, StageError::MissingOutput(_)));
    }
}
