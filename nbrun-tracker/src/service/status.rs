//! Status poller
//!
//! Fetches fresh run descriptions, with every describe call going through the
//! throttling retry, and offers a blocking wait for a run to settle.

use nbrun_client::ProcessingApi;
use nbrun_core::domain::run::{JobHandle, RunDescriptor};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{Result, RunError};
use crate::retry::retry_throttled;

/// Describes, waits for and stops individual runs
#[derive(Clone)]
pub struct StatusPoller {
    api: Arc<dyn ProcessingApi>,
    throttle_backoff: Duration,
}

impl StatusPoller {
    /// Creates a new status poller
    ///
    /// # Arguments
    /// * `api` - The processing service
    /// * `throttle_backoff` - Sleep between attempts of a throttled call
    pub fn new(api: Arc<dyn ProcessingApi>, throttle_backoff: Duration) -> Self {
        Self {
            api,
            throttle_backoff,
        }
    }

    /// Fetches the current description of a run
    pub async fn describe(&self, job: &JobHandle) -> Result<RunDescriptor> {
        debug!("Describing job {}", job);

        let desc = retry_throttled(self.throttle_backoff, job.as_str(), || {
            self.api.describe_processing_job(job.as_str())
        })
        .await
        .map_err(|e| RunError::remote(format!("describe {}", job), e))?;

        Ok(RunDescriptor::from_description(&desc))
    }

    /// Whether the run has not reached a terminal status yet
    pub async fn is_active(&self, job: &JobHandle) -> Result<bool> {
        Ok(self.describe(job).await?.status.is_active())
    }

    /// Polls until the run reaches a terminal status
    ///
    /// Sleeps `poll_interval` after every observation of an active status.
    /// Only the calling task is suspended. A zero interval is rejected before
    /// the first describe.
    pub async fn wait_until_terminal(
        &self,
        job: &JobHandle,
        poll_interval: Duration,
    ) -> Result<RunDescriptor> {
        if poll_interval.is_zero() {
            return Err(RunError::InvalidRequest(
                "poll interval must be greater than 0".to_string(),
            ));
        }

        loop {
            let run = self.describe(job).await?;
            if run.is_terminal() {
                info!("Job {} finished with status {}", job, run.status);
                return Ok(run);
            }

            debug!("Job {} is {}, checking again in {:?}", job, run.status, poll_interval);
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Asks the service to stop a run
    ///
    /// Tracking is unaffected; the next refresh observes the terminal status.
    pub async fn stop(&self, job: &JobHandle) -> Result<()> {
        retry_throttled(self.throttle_backoff, job.as_str(), || {
            self.api.stop_processing_job(job.as_str())
        })
        .await
        .map_err(|e| RunError::remote(format!("stop {}", job), e))?;

        info!("Requested stop of job {}", job);
        Ok(())
    }
}
