//! Orchestrator configuration
//!
//! Every tunable of the server, the worker pool, the artifact store and the
//! retention sweeper. Values come from environment variables with defaults
//! for everything except the shared HMAC secret.

use std::path::PathBuf;
use std::time::Duration;

use crate::pipeline::CompositionOptions;

/// Upper bound for `artifact_ttl_hours` and `job_retention_hours` (ten years)
pub const MAX_RETENTION_HOURS: u64 = 24 * 365 * 10;

/// Upper bound for `sweep_interval_minutes` (one week)
pub const MAX_SWEEP_INTERVAL_MINUTES: u64 = 60 * 24 * 7;

/// Orchestrator configuration
#[derive(Clone)]
pub struct Config {
    /// Address the HTTP server binds to (e.g., "0.0.0.0:8080")
    pub bind_addr: String,

    /// Public base URL used to build download links
    pub public_url: String,

    /// Shared secret for request signatures
    pub hmac_secret: String,

    /// Maximum number of jobs processed at the same time
    pub max_concurrent_jobs: usize,

    /// How often the worker pool looks for pending jobs
    pub poll_interval: Duration,

    /// Lifetime of a stored artifact
    pub artifact_ttl_hours: u64,

    /// Age after which job records are pruned, whatever their status
    pub job_retention_hours: u64,

    /// Period of the retention sweeper
    pub sweep_interval_minutes: u64,

    /// How long shutdown waits for in-flight jobs
    pub shutdown_grace: Duration,

    /// Directory holding artifacts and their metadata
    pub storage_dir: PathBuf,

    /// Directory for per-job intermediate files
    pub work_dir: PathBuf,

    /// Fixed audio track mixed into every video
    pub audio_asset: PathBuf,

    /// External renderer executable
    pub render_command: PathBuf,

    /// ffmpeg executable
    pub ffmpeg_path: PathBuf,

    pub composition: CompositionOptions,
}

impl Config {
    /// Creates a configuration with defaults and the given secret
    pub fn new(hmac_secret: String) -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            public_url: "http://localhost:8080".to_string(),
            hmac_secret,
            max_concurrent_jobs: 2,
            poll_interval: Duration::from_secs(5),
            artifact_ttl_hours: 24,
            job_retention_hours: 48,
            sweep_interval_minutes: 60,
            shutdown_grace: Duration::from_secs(60),
            storage_dir: PathBuf::from("./data/videos"),
            work_dir: std::env::temp_dir().join("reelcast"),
            audio_asset: PathBuf::from("./assets/audio/background.mp3"),
            render_command: PathBuf::from("reelcast-render"),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            composition: CompositionOptions::default(),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - REELCAST_HMAC_SECRET (required)
    /// - REELCAST_BIND_ADDR (optional, default: 0.0.0.0:8080)
    /// - REELCAST_PUBLIC_URL (optional, default: http://localhost:8080)
    /// - MAX_CONCURRENT_JOBS (optional, default: 2)
    /// - POLL_INTERVAL_SECS (optional, default: 5)
    /// - ARTIFACT_TTL_HOURS (optional, default: 24)
    /// - JOB_RETENTION_HOURS (optional, default: 48)
    /// - SWEEP_INTERVAL_MINUTES (optional, default: 60)
    /// - SHUTDOWN_GRACE_SECS (optional, default: 60)
    /// - REELCAST_STORAGE_DIR, REELCAST_WORK_DIR, REELCAST_AUDIO_ASSET,
    ///   REELCAST_RENDER_COMMAND, REELCAST_FFMPEG_PATH (optional paths)
    pub fn from_env() -> anyhow::Result<Self> {
        let hmac_secret = std::env::var("REELCAST_HMAC_SECRET")
            .map_err(|_| anyhow::anyhow!("REELCAST_HMAC_SECRET environment variable not set"))?;

        let mut config = Self::new(hmac_secret);

        if let Ok(addr) = std::env::var("REELCAST_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(url) = std::env::var("REELCAST_PUBLIC_URL") {
            config.public_url = url.trim_end_matches('/').to_string();
        }

        config.max_concurrent_jobs = env_parse("MAX_CONCURRENT_JOBS").unwrap_or(2);
        config.poll_interval = env_parse("POLL_INTERVAL_SECS")
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(5));
        config.artifact_ttl_hours = env_parse("ARTIFACT_TTL_HOURS").unwrap_or(24);
        config.job_retention_hours = env_parse("JOB_RETENTION_HOURS").unwrap_or(48);
        config.sweep_interval_minutes = env_parse("SWEEP_INTERVAL_MINUTES").unwrap_or(60);
        config.shutdown_grace = env_parse("SHUTDOWN_GRACE_SECS")
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(60));

        if let Some(dir) = env_path("REELCAST_STORAGE_DIR") {
            config.storage_dir = dir;
        }
        if let Some(dir) = env_path("REELCAST_WORK_DIR") {
            config.work_dir = dir;
        }
        if let Some(path) = env_path("REELCAST_AUDIO_ASSET") {
            config.audio_asset = path;
        }
        if let Some(path) = env_path("REELCAST_RENDER_COMMAND") {
            config.render_command = path;
        }
        if let Some(path) = env_path("REELCAST_FFMPEG_PATH") {
            config.ffmpeg_path = path;
        }

        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.hmac_secret.is_empty() {
            anyhow::bail!("hmac_secret cannot be empty");
        }

        if !self.public_url.starts_with("http://") && !self.public_url.starts_with("https://") {
            anyhow::bail!("public_url must start with http:// or https://");
        }

        if self.max_concurrent_jobs == 0 {
            anyhow::bail!("max_concurrent_jobs must be greater than 0");
        }

        if self.poll_interval.is_zero() {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.artifact_ttl_hours == 0 {
            anyhow::bail!("artifact_ttl_hours must be greater than 0");
        }

        if self.artifact_ttl_hours > MAX_RETENTION_HOURS {
            anyhow::bail!("artifact_ttl_hours cannot exceed {}", MAX_RETENTION_HOURS);
        }

        if self.job_retention_hours > MAX_RETENTION_HOURS {
            anyhow::bail!("job_retention_hours cannot exceed {}", MAX_RETENTION_HOURS);
        }

        if self.sweep_interval_minutes == 0 {
            anyhow::bail!("sweep_interval_minutes must be greater than 0");
        }

        if self.sweep_interval_minutes > MAX_SWEEP_INTERVAL_MINUTES {
            anyhow::bail!(
                "sweep_interval_minutes cannot exceed {}",
                MAX_SWEEP_INTERVAL_MINUTES
            );
        }

        if self.composition.duration_secs <= self.composition.fade_out_secs {
            anyhow::bail!("video duration must be longer than the fade out");
        }

        Ok(())
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bind_addr", &self.bind_addr)
            .field("public_url", &self.public_url)
            .field("hmac_secret", &"<redacted>")
            .field("max_concurrent_jobs", &self.max_concurrent_jobs)
            .field("poll_interval", &self.poll_interval)
            .field("artifact_ttl_hours", &self.artifact_ttl_hours)
            .field("job_retention_hours", &self.job_retention_hours)
            .field("sweep_interval_minutes", &self.sweep_interval_minutes)
            .field("storage_dir", &self.storage_dir)
            .field("work_dir", &self.work_dir)
            .finish_non_exhaustive()
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse::<T>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::new("secret".to_string());
        assert_eq!(config.max_concurrent_jobs, 2);
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.artifact_ttl_hours, 24);
        assert_eq!(config.shutdown_grace, Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::new("secret".to_string());

        config.hmac_secret = String::new();
        assert!(config.validate().is_err());
        config.hmac_secret = "secret".to_string();

        config.max_concurrent_jobs = 0;
        assert!(config.validate().is_err());
        config.max_concurrent_jobs = 4;

        config.public_url = "localhost".to_string();
        assert!(config.validate().is_err());
        config.public_url = "https://reels.example.com".to_string();

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_retention_values_are_bounded() {
        let mut config = Config::new("secret".to_string());

        config.artifact_ttl_hours = 10_000_000_000;
        assert!(config.validate().is_err());
        config.artifact_ttl_hours = MAX_RETENTION_HOURS;
        assert!(config.validate().is_ok());

        config.job_retention_hours = u64::MAX;
        assert!(config.validate().is_err());
        config.job_retention_hours = 48;

        config.sweep_interval_minutes = u64::MAX;
        assert!(config.validate().is_err());
        config.sweep_interval_minutes = MAX_SWEEP_INTERVAL_MINUTES;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = Config::new("super-secret".to_string());
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret"));
    }
}
