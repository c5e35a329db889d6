//! Configuration module
//!
//! Maps command-line flags and their environment variables onto the tracker
//! configuration.

use clap::Args;
use nbrun_core::domain::naming::DEFAULT_JOB_PREFIX;
use nbrun_tracker::Config;
use std::time::Duration;

/// Settings shared by every command
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Processing service URL
    #[arg(
        long,
        global = true,
        env = "NBRUN_API_URL",
        default_value = "http://localhost:8080"
    )]
    pub api_url: String,

    /// Bucket receiving output notebooks when no output prefix is given
    #[arg(long, global = true, env = "NBRUN_DEFAULT_BUCKET")]
    pub default_bucket: Option<String>,

    /// Role for runs submitted without --role
    #[arg(long, global = true, env = "NBRUN_EXECUTION_ROLE")]
    pub execution_role: Option<String>,

    /// Instance type for runs submitted without --instance-type
    #[arg(long, global = true, env = "NBRUN_INSTANCE_TYPE", default_value = "ml.m5.large")]
    pub default_instance_type: String,

    /// Name prefix of the jobs this tool submits and tracks
    #[arg(long, global = true, env = "NBRUN_JOB_PREFIX", default_value = DEFAULT_JOB_PREFIX)]
    pub job_prefix: String,

    /// Region used to qualify bare image names
    #[arg(long, global = true, env = "NBRUN_REGION")]
    pub region: Option<String>,

    /// Account used to qualify bare role and image names
    #[arg(long, global = true, env = "NBRUN_ACCOUNT_ID")]
    pub account_id: Option<String>,

    /// Seconds between status checks
    #[arg(long, global = true, env = "NBRUN_POLL_INTERVAL", default_value_t = 10)]
    pub poll_interval: u64,

    /// Number of recent runs to track
    #[arg(long, global = true, env = "NBRUN_MAX_RUNS", default_value_t = 20)]
    pub max_runs: usize,

    /// Milliseconds to wait before retrying a throttled call
    #[arg(long, global = true, env = "NBRUN_THROTTLE_BACKOFF_MS", default_value_t = 1000)]
    pub throttle_backoff_ms: u64,
}

impl ConfigArgs {
    /// Builds the tracker configuration
    ///
    /// Bucket and role may be missing here; commands that submit runs check
    /// them through [`Config::validate`].
    pub fn into_config(self) -> Config {
        let mut config = Config::new(
            self.api_url,
            self.default_bucket.unwrap_or_default(),
            self.execution_role.unwrap_or_default(),
        );
        config.instance_type = self.default_instance_type;
        config.job_prefix = self.job_prefix;
        config.region = self
            .region
            .or_else(|| std::env::var("AWS_DEFAULT_REGION").ok())
            .filter(|s| !s.is_empty());
        config.account_id = self.account_id.filter(|s| !s.is_empty());
        config.poll_interval = Duration::from_secs(self.poll_interval);
        config.max_runs = self.max_runs;
        config.throttle_backoff = Duration::from_millis(self.throttle_backoff_ms);
        config
    }
}
