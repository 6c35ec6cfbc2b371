//! ffmpeg-backed encoder
//!
//! Loops the rendered still for the configured duration, lays the audio
//! track underneath, and fades both in and out.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;
use uuid::Uuid;

use super::{CompositionOptions, Encoder, StageError, expect_output, run_command};

pub struct FfmpegEncoder {
    ffmpeg: PathBuf,
}

impl FfmpegEncoder {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }

    pub fn output_path(work_dir: &Path, job_id: Uuid) -> PathBuf {
        work_dir.join(format!("reel_{}.mp4", job_id))
    }
}

/// Builds the ffmpeg argument list for one composition.
pub(crate) fn ffmpeg_args(
    image: &Path,
    audio: &Path,
    options: &CompositionOptions,
    output: &Path,
) -> Vec<OsString> {
    let w = options.width;
    let h = options.height;
    let duration = options.duration_secs;
    let fade_out_start = (duration - options.fade_out_secs).max(0.0);

    let video_filter = format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,\
         pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,\
         fade=t=in:st=0:d={fi},fade=t=out:st={fo_start}:d={fo}",
        fi = options.fade_in_secs,
        fo = options.fade_out_secs,
        fo_start = fade_out_start,
    );
    let audio_filter = format!(
        "volume={vol},afade=t=in:st=0:d={fi},afade=t=out:st={fo_start}:d={fo}",
        vol = options.volume,
        fi = options.fade_in_secs,
        fo = options.fade_out_secs,
        fo_start = fade_out_start,
    );

    let mut args: Vec<OsString> = ["-y", "-loop", "1", "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(image.as_os_str().to_owned());
    args.push(OsString::from("-i"));
    args.push(audio.as_os_str().to_owned());
    args.extend(
        [
            "-t".to_string(),
            duration.to_string(),
            "-vf".to_string(),
            video_filter,
            "-af".to_string(),
            audio_filter,
        ]
        .into_iter()
        .map(OsString::from),
    );
    args.extend(
        [
            "-c:v",
            "libx264",
            "-pix_fmt",
            "yuv420p",
            "-c:a",
            "aac",
            "-shortest",
            "-movflags",
            "+faststart",
        ]
        .into_iter()
        .map(OsString::from),
    );
    args.push(output.as_os_str().to_owned());
    args
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    async fn encode(
        &self,
        job_id: Uuid,
        image: &Path,
        audio: &Path,
        options: &CompositionOptions,
        work_dir: &Path,
    ) -> Result<PathBuf, StageError> {
        if !tokio::fs::try_exists(audio).await? {
            return Err(StageError::InvalidInput(format!(
                "audio asset {} does not exist",
                audio.display()
            )));
        }

        let output = Self::output_path(work_dir, job_id);
        debug!(job_id = %job_id, output = %output.display(), "Encoding video");

        let mut command = Command::new(&self.ffmpeg);
        command.args(ffmpeg_args(image, audio, options, &output));
        run_command(&mut command, None).await?;

        expect_output(output).await
    }
}
