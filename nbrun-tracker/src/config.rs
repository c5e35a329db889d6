//! Tracker configuration
//!
//! Defines where the processing service lives, the defaults applied to
//! submissions, and the polling and retry intervals used while tracking.

use nbrun_core::domain::naming::{self, DEFAULT_JOB_PREFIX};
use std::time::Duration;

use crate::retry::DEFAULT_THROTTLE_BACKOFF;

/// Tracker configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Processing service base URL (e.g., "http://localhost:8080")
    pub api_url: String,

    /// Bucket that receives output notebooks when no prefix is given
    pub default_bucket: String,

    /// Role used by jobs submitted without an explicit role
    pub execution_role: String,

    /// Instance type used by jobs submitted without an explicit one
    pub instance_type: String,

    /// Name prefix carried by every job this orchestrator submits and tracks
    pub job_prefix: String,

    /// Region used to qualify bare image names
    pub region: Option<String>,

    /// Account used to qualify bare role and image names; queried from the
    /// service when unset
    pub account_id: Option<String>,

    /// How often to poll job status and refresh the tracker
    pub poll_interval: Duration,

    /// Number of recent runs the tracker keeps
    pub max_runs: usize,

    /// Backoff between attempts of a throttled call
    pub throttle_backoff: Duration,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(api_url: String, default_bucket: String, execution_role: String) -> Self {
        Self {
            api_url,
            default_bucket,
            execution_role,
            instance_type: "ml.m5.large".to_string(),
            job_prefix: DEFAULT_JOB_PREFIX.to_string(),
            region: None,
            account_id: None,
            poll_interval: Duration::from_secs(10),
            max_runs: 20,
            throttle_backoff: DEFAULT_THROTTLE_BACKOFF,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - NBRUN_API_URL (required)
    /// - NBRUN_DEFAULT_BUCKET (required)
    /// - NBRUN_EXECUTION_ROLE (required)
    /// - NBRUN_INSTANCE_TYPE (optional, default: ml.m5.large)
    /// - NBRUN_JOB_PREFIX (optional, default: papermill-)
    /// - NBRUN_REGION or AWS_DEFAULT_REGION (optional)
    /// - NBRUN_ACCOUNT_ID (optional)
    /// - NBRUN_POLL_INTERVAL (optional, seconds, default: 10)
    /// - NBRUN_MAX_RUNS (optional, default: 20)
    /// - NBRUN_THROTTLE_BACKOFF_MS (optional, milliseconds, default: 1000)
    pub fn from_env() -> anyhow::Result<Self> {
        let api_url = std::env::var("NBRUN_API_URL")
            .map_err(|_| anyhow::anyhow!("NBRUN_API_URL environment variable not set"))?;

        let default_bucket = std::env::var("NBRUN_DEFAULT_BUCKET")
            .map_err(|_| anyhow::anyhow!("NBRUN_DEFAULT_BUCKET environment variable not set"))?;

        let execution_role = std::env::var("NBRUN_EXECUTION_ROLE")
            .map_err(|_| anyhow::anyhow!("NBRUN_EXECUTION_ROLE environment variable not set"))?;

        let mut config = Self::new(api_url, default_bucket, execution_role);

        if let Ok(instance_type) = std::env::var("NBRUN_INSTANCE_TYPE") {
            config.instance_type = instance_type;
        }

        if let Ok(prefix) = std::env::var("NBRUN_JOB_PREFIX") {
            config.job_prefix = prefix;
        }

        config.region = std::env::var("NBRUN_REGION")
            .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
            .ok()
            .filter(|s| !s.is_empty());

        config.account_id = std::env::var("NBRUN_ACCOUNT_ID")
            .ok()
            .filter(|s| !s.is_empty());

        if let Some(poll_interval) = std::env::var("NBRUN_POLL_INTERVAL")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            config.poll_interval = Duration::from_secs(poll_interval);
        }

        if let Some(max_runs) = std::env::var("NBRUN_MAX_RUNS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
        {
            config.max_runs = max_runs;
        }

        if let Some(backoff) = std::env::var("NBRUN_THROTTLE_BACKOFF_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            config.throttle_backoff = Duration::from_millis(backoff);
        }

        Ok(config)
    }

    /// Output location used when a submission does not name one
    pub fn default_output_prefix(&self) -> String {
        format!("s3://{}/papermill_output", self.default_bucket)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_url.is_empty() {
            anyhow::bail!("api_url cannot be empty");
        }

        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            anyhow::bail!("api_url must start with http:// or https://");
        }

        if self.default_bucket.is_empty() {
            anyhow::bail!("default_bucket cannot be empty");
        }

        if self.execution_role.is_empty() {
            anyhow::bail!("execution_role cannot be empty");
        }

        if self.instance_type.is_empty() {
            anyhow::bail!("instance_type cannot be empty");
        }

        naming::validate_prefix(&self.job_prefix)?;

        if self.poll_interval.is_zero() {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.max_runs == 0 {
            anyhow::bail!("max_runs must be greater than 0");
        }

        Ok(())
    }
}
