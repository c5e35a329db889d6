//! Run listing command handlers
//!
//! One-shot listing of past runs, and a live view of the most recent runs
//! backed by the tracker.

use anyhow::{Context, Result};
use colored::*;
use nbrun_tracker::{
    Config, NewJobDiscoverer, NotebookRunTracker, RunFilter, RunLister, RunView, StatusPoller,
    TrackerService,
};
use std::time::Duration;

use super::display::{format_time, print_run_row, print_run_table};
use super::run::processing_api;

/// List recent runs
///
/// # Arguments
/// * `config` - The CLI configuration
/// * `limit` - Maximum number of runs, 0 for all
/// * `notebook` - Only runs of this notebook
/// * `rule` - Only runs triggered by this rule
pub async fn list_runs(
    config: &Config,
    limit: usize,
    notebook: Option<String>,
    rule: Option<String>,
) -> Result<()> {
    let lister = RunLister::new(
        processing_api(config),
        config.job_prefix.clone(),
        config.throttle_backoff,
    );
    let filter = RunFilter {
        limit,
        notebook,
        rule,
    };

    let runs = lister
        .list_runs(&filter)
        .await
        .context("Failed to list runs")?;

    print_run_table(&runs);

    Ok(())
}

/// Follow the most recent runs
///
/// Prints the window after every refresh until interrupted, or once with `once`.
pub async fn watch_runs(
    config: &Config,
    max_runs: Option<usize>,
    interval: Option<u64>,
    once: bool,
) -> Result<()> {
    let api = processing_api(config);
    let interval = interval
        .map(Duration::from_secs)
        .unwrap_or(config.poll_interval);
    if interval.is_zero() {
        anyhow::bail!("Refresh interval must be greater than 0");
    }

    let tracker = NotebookRunTracker::new(
        StatusPoller::new(api.clone(), config.throttle_backoff),
        NewJobDiscoverer::new(api, config.job_prefix.clone(), config.throttle_backoff),
        max_runs.unwrap_or(config.max_runs),
    );
    let mut handle = TrackerService::spawn(tracker, interval);

    if once {
        let report = handle.refresh().await.context("Failed to refresh runs")?;
        if report.discovery_failed {
            eprintln!("{}", "⚠ Listing new runs failed; showing known runs".yellow());
        }
        print_view(&handle.view());
        handle.shutdown().await;
        return Ok(());
    }

    loop {
        tokio::select! {
            view = handle.changed() => {
                let view = view.context("Tracker stopped unexpectedly")?;
                print_view(&view);
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                println!("{}", "Stopping...".dimmed());
                break;
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}

fn print_view(view: &RunView) {
    let updated = view
        .updated_at
        .map(format_time)
        .unwrap_or_else(|| "never".to_string());

    println!(
        "{}",
        format!(
            "{} run(s), {} active (updated {})",
            view.len(),
            view.active.len(),
            updated
        )
        .bold()
    );

    if view.is_empty() {
        println!("{}", "No runs found.".yellow());
    }
    for run in &view.runs {
        print_run_row(run);
    }
    println!();
}
