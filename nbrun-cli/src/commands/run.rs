//! Run command handlers
//!
//! Submitting a notebook run, and inspecting, waiting for or stopping a
//! single run.

use anyhow::{Context, Result};
use colored::*;
use nbrun_client::{ProcessingApi, ProcessingClient};
use nbrun_core::domain::run::{JobHandle, RunDescriptor, RunStatus};
use nbrun_tracker::{Config, JobSubmitter, StatusPoller, SubmitRequest};
use std::sync::Arc;
use std::time::Duration;

use super::display::print_run_details;
use crate::types::NotebookParam;

/// Builds a submission from command-line arguments
pub fn build_request(
    notebook: String,
    image: String,
    input: String,
    role: Option<String>,
    instance_type: Option<String>,
    output_prefix: Option<String>,
    params: Vec<NotebookParam>,
) -> SubmitRequest {
    SubmitRequest {
        image,
        input_location: input,
        notebook,
        role,
        instance_type,
        output_prefix,
        parameters: params.into_iter().map(|p| (p.key, p.value)).collect(),
    }
}

pub fn processing_api(config: &Config) -> Arc<dyn ProcessingApi> {
    Arc::new(ProcessingClient::new(config.api_url.clone()))
}

/// Submit a run, optionally waiting for it to finish
///
/// # Arguments
/// * `config` - The CLI configuration
/// * `request` - The notebook run to submit
/// * `wait` - Whether to block until the run settles
pub async fn submit_run(config: &Config, request: SubmitRequest, wait: bool) -> Result<()> {
    config
        .validate()
        .context("Submitting runs needs a default bucket and an execution role")?;

    let api = processing_api(config);
    let submitter = JobSubmitter::new(api.clone(), config);

    let job = submitter
        .submit(&request)
        .await
        .context("Failed to submit run")?;

    println!("{}", "✓ Run submitted".green());
    println!("  Job: {}", job.as_str().cyan());

    if !wait {
        println!();
        println!("Follow it with: nbrun wait {}", job);
        return Ok(());
    }

    println!("{}", "  Waiting for the run to finish...".dimmed());
    println!();

    let poller = StatusPoller::new(api, config.throttle_backoff);
    let run = poller
        .wait_until_terminal(&job, config.poll_interval)
        .await
        .context("Failed while waiting for run")?;

    report_outcome(&run)
}

/// Show a single run
pub async fn show_status(config: &Config, job: &JobHandle) -> Result<()> {
    let poller = StatusPoller::new(processing_api(config), config.throttle_backoff);
    let run = poller
        .describe(job)
        .await
        .with_context(|| format!("Failed to describe job {}", job))?;

    print_run_details(&run);

    Ok(())
}

/// Wait for a run to settle
pub async fn wait_for_run(config: &Config, job: &JobHandle, interval: Option<u64>) -> Result<()> {
    let interval = interval
        .map(Duration::from_secs)
        .unwrap_or(config.poll_interval);
    if interval.is_zero() {
        anyhow::bail!("Poll interval must be greater than 0");
    }

    println!(
        "{}",
        format!("Waiting for job {} (checking every {:?})...", job, interval).dimmed()
    );

    let poller = StatusPoller::new(processing_api(config), config.throttle_backoff);
    let run = poller
        .wait_until_terminal(job, interval)
        .await
        .with_context(|| format!("Failed while waiting for job {}", job))?;

    report_outcome(&run)
}

/// Request a run to stop
pub async fn stop_run(config: &Config, job: &JobHandle) -> Result<()> {
    let poller = StatusPoller::new(processing_api(config), config.throttle_backoff);
    poller
        .stop(job)
        .await
        .with_context(|| format!("Failed to stop job {}", job))?;

    println!("{}", format!("✓ Stop requested for job {}", job).green());

    Ok(())
}

/// Prints the settled run and fails unless it completed
fn report_outcome(run: &RunDescriptor) -> Result<()> {
    print_run_details(run);

    if run.status != RunStatus::Completed {
        anyhow::bail!("Run {} finished with status {}", run.job, run.status);
    }

    Ok(())
}
