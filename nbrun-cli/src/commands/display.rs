//! Terminal rendering of runs

use chrono::{DateTime, TimeDelta, Utc};
use colored::*;
use nbrun_core::domain::failure::{FailureClassifier, LastLineClassifier};
use nbrun_core::domain::run::{RunDescriptor, RunStatus};
use serde_json::{Map, Value};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Print a run as one table row
pub fn print_run_row(run: &RunDescriptor) {
    let elapsed = run.elapsed().map(format_elapsed).unwrap_or_default();
    let notebook = if run.notebook.is_empty() {
        "-"
    } else {
        run.notebook.as_str()
    };

    println!(
        "  {} {:<63} {:<10} {:>9}  {}",
        "▸".cyan(),
        run.job.as_str(),
        colorize_status(run.status),
        elapsed,
        notebook.dimmed()
    );
}

/// Print a list of runs with a heading
pub fn print_run_table(runs: &[RunDescriptor]) {
    if runs.is_empty() {
        println!("{}", "No runs found.".yellow());
        return;
    }

    println!("{}", format!("Found {} run(s):", runs.len()).bold());
    println!();
    for run in runs {
        print_run_row(run);
    }
}

/// Print detailed run information
pub fn print_run_details(run: &RunDescriptor) {
    println!("{}", "Run Details:".bold());
    println!("  Job:         {}", run.job.as_str().cyan());
    println!("  Notebook:    {}", run.notebook);
    if !run.rule.is_empty() {
        println!("  Rule:        {}", run.rule);
    }
    println!("  Status:      {}", colorize_status(run.status));
    println!("  Created:     {}", format_time(run.created));

    if let Some(started) = run.start_time {
        println!("  Started:     {}", format_time(started));
    }
    if let Some(ended) = run.end_time {
        println!("  Ended:       {}", format_time(ended));
    }
    if let Some(elapsed) = run.elapsed() {
        println!("  Duration:    {}", format_elapsed(elapsed));
    }

    println!("  Image:       {}", run.image.dimmed());
    println!("  Instance:    {}", run.instance.dimmed());
    println!("  Role:        {}", run.role.dimmed());
    println!("  Input:       {}", run.input_location.dimmed());

    if let Ok(parameters) = serde_json::from_str::<Map<String, Value>>(&run.parameters) {
        if !parameters.is_empty() {
            println!("\n{}", "Parameters:".bold());
            for (key, value) in &parameters {
                match value {
                    Value::String(s) => println!("  {} = {}", key.cyan(), s),
                    other => println!("  {} = {}", key.cyan(), other),
                }
            }
        }
    }

    if let Some(result) = &run.result_location {
        println!("\n{}", "Result:".bold());
        println!("  {}", result.green());
    }

    if let Some(failure) = LastLineClassifier::new().classify(run) {
        println!("\n{}", "Failure:".bold());
        match &failure.detail {
            Some(detail) => println!("  {}: {}", failure.category.red(), detail),
            None => println!("  {}", failure.category.red()),
        }
        if let Some(reason) = &run.failure_reason {
            println!("\n{}", reason.dimmed());
        }
    }
}

/// Colorize run status for display
pub fn colorize_status(status: RunStatus) -> ColoredString {
    let status_str = status.to_string();
    match status {
        RunStatus::Queued => status_str.yellow(),
        RunStatus::Running => status_str.cyan(),
        RunStatus::Stopping => status_str.yellow(),
        RunStatus::Completed => status_str.green(),
        RunStatus::Failed => status_str.red(),
        RunStatus::Stopped => status_str.dimmed(),
    }
}

pub fn format_time(time: DateTime<Utc>) -> String {
    time.format(TIME_FORMAT).to_string()
}

/// Renders a duration as `45s`, `3m07s` or `2h05m`
pub fn format_elapsed(elapsed: TimeDelta) -> String {
    let seconds = elapsed.num_seconds().max(0);
    if seconds >= 3600 {
        format!("{}h{:02}m", seconds / 3600, (seconds % 3600) / 60)
    } else if seconds >= 60 {
        format!("{}m{:02}s", seconds / 60, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}
