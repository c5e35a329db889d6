//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod display;
mod run;
mod runs;

use anyhow::Result;
use clap::Subcommand;
use nbrun_core::domain::run::JobHandle;

use crate::types::{NotebookParam, parse_job};
use nbrun_tracker::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Submit a notebook run
    Run {
        /// Notebook path, as uploaded to the input location
        notebook: String,

        /// Image providing the notebook kernel (bare names are qualified)
        #[arg(long)]
        image: String,

        /// Location the notebook and its sibling files were uploaded to
        #[arg(long)]
        input: String,

        /// Execution role (defaults to the configured role)
        #[arg(long)]
        role: Option<String>,

        /// Instance type (defaults to the configured type)
        #[arg(long)]
        instance_type: Option<String>,

        /// Where the output notebook is written
        #[arg(long)]
        output_prefix: Option<String>,

        /// Notebook parameter as key=value; repeatable
        #[arg(short, long = "param", value_parser = NotebookParam::parse)]
        params: Vec<NotebookParam>,

        /// Wait for the run to finish
        #[arg(short, long)]
        wait: bool,
    },
    /// Show a run's details
    Status {
        /// Job name or ARN
        #[arg(value_parser = parse_job)]
        job: JobHandle,
    },
    /// Wait for a run to finish
    Wait {
        /// Job name or ARN
        #[arg(value_parser = parse_job)]
        job: JobHandle,

        /// Seconds between status checks (defaults to the poll interval)
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Ask the service to stop a run
    Stop {
        /// Job name or ARN
        #[arg(value_parser = parse_job)]
        job: JobHandle,
    },
    /// List recent runs
    List {
        /// Maximum number of runs (0 for all)
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,

        /// Only runs of this notebook
        #[arg(long)]
        notebook: Option<String>,

        /// Only runs triggered by this schedule rule
        #[arg(long)]
        rule: Option<String>,
    },
    /// Follow the most recent runs as they progress
    Watch {
        /// Number of runs to show (defaults to the configured window)
        #[arg(long)]
        max_runs: Option<usize>,

        /// Seconds between refreshes (defaults to the poll interval)
        #[arg(long)]
        interval: Option<u64>,

        /// Refresh once, print and exit
        #[arg(long)]
        once: bool,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
///
/// # Arguments
/// * `command` - The command to execute
/// * `config` - The CLI configuration
///
/// # Returns
/// Result indicating success or failure
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Run {
            notebook,
            image,
            input,
            role,
            instance_type,
            output_prefix,
            params,
            wait,
        } => {
            let request = run::build_request(
                notebook,
                image,
                input,
                role,
                instance_type,
                output_prefix,
                params,
            );
            run::submit_run(config, request, wait).await
        }
        Commands::Status { job } => run::show_status(config, &job).await,
        Commands::Wait { job, interval } => run::wait_for_run(config, &job, interval).await,
        Commands::Stop { job } => run::stop_run(config, &job).await,
        Commands::List {
            limit,
            notebook,
            rule,
        } => runs::list_runs(config, limit, notebook, rule).await,
        Commands::Watch {
            max_runs,
            interval,
            once,
        } => runs::watch_runs(config, max_runs, interval, once).await,
    }
}
