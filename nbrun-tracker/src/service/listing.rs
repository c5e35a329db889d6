//! Run listing
//!
//! One-shot listing of past runs, newest first. Unlike the tracker it keeps no
//! state between calls: every listing walks the remote job listing from the top
//! and describes each candidate.

use nbrun_client::ProcessingApi;
use nbrun_core::domain::run::{JobHandle, RunDescriptor};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::Result;
use crate::scheduler::NewJobDiscoverer;
use crate::service::StatusPoller;

/// Which runs to return
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunFilter {
    /// Maximum number of runs, 0 for no limit
    pub limit: usize,
    /// Only runs of this notebook (matched against the submitted path and its file name)
    pub notebook: Option<String>,
    /// Only runs triggered by this schedule rule
    pub rule: Option<String>,
}

impl RunFilter {
    /// Filter returning at most `limit` runs
    pub fn recent(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    /// Whether a described run passes the notebook and rule filters
    pub fn matches(&self, run: &RunDescriptor) -> bool {
        let notebook_matches = self.notebook.as_deref().is_none_or(|wanted| {
            run.notebook == wanted || run.notebook.rsplit('/').next() == Some(wanted)
        });
        let rule_matches = self.rule.as_deref().is_none_or(|wanted| run.rule == wanted);
        notebook_matches && rule_matches
    }

    fn is_full(&self, count: usize) -> bool {
        self.limit != 0 && count >= self.limit
    }
}

/// Lists past runs submitted under the job prefix
pub struct RunLister {
    api: Arc<dyn ProcessingApi>,
    poller: StatusPoller,
    job_prefix: String,
    throttle_backoff: Duration,
}

impl RunLister {
    /// Creates a new run lister
    ///
    /// # Arguments
    /// * `api` - The processing service
    /// * `job_prefix` - Only jobs with this name prefix are listed
    /// * `throttle_backoff` - Sleep between attempts of a throttled call
    pub fn new(
        api: Arc<dyn ProcessingApi>,
        job_prefix: impl Into<String>,
        throttle_backoff: Duration,
    ) -> Self {
        let poller = StatusPoller::new(api.clone(), throttle_backoff);
        Self {
            api,
            poller,
            job_prefix: job_prefix.into(),
            throttle_backoff,
        }
    }

    /// Returns runs matching `filter`, newest first
    ///
    /// Stops listing as soon as the limit is reached, so a small limit costs a
    /// single listing page.
    pub async fn list_runs(&self, filter: &RunFilter) -> Result<Vec<RunDescriptor>> {
        let mut discoverer =
            NewJobDiscoverer::new(self.api.clone(), self.job_prefix.clone(), self.throttle_backoff);
        let mut scan = discoverer.scan();
        let mut runs = Vec::new();

        while !filter.is_full(runs.len()) {
            let Some(summary) = scan.next().await? else {
                break;
            };

            let run = self
                .poller
                .describe(&JobHandle::new(summary.processing_job_name))
                .await?;

            if filter.matches(&run) {
                runs.push(run);
            } else {
                debug!("Skipping job {} (filtered out)", run.job);
            }
        }

        Ok(runs)
    }
}
