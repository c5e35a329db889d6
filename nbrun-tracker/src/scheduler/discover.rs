//! New-job discovery
//!
//! The listing API cannot answer "everything created since job X", so each
//! scan walks the newest-first listing and stops at a watermark: the first job
//! the previous scan saw. Each refresh therefore costs roughly one describe per
//! new job plus one page of listing.
//!
//! The watermark recorded by a scan only takes effect when the next scan
//! starts, so a scan that is abandoned early (the caller stopped pulling)
//! still moves the frontier to its first job.

use nbrun_client::ProcessingApi;
use nbrun_core::domain::run::JobHandle;
use nbrun_core::dto::job::{ListProcessingJobs, ProcessingJobSummary};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::{Result, RunError};
use crate::retry::retry_throttled;

/// Jobs requested per listing page
pub const LIST_PAGE_SIZE: u32 = 30;

/// Finds jobs created since the previous scan
pub struct NewJobDiscoverer {
    api: Arc<dyn ProcessingApi>,
    prefix: String,
    throttle_backoff: Duration,
    last_seen: Option<JobHandle>,
    next_last_seen: Option<JobHandle>,
}

impl NewJobDiscoverer {
    /// Creates a discoverer with no watermark; its first scan walks the whole listing
    ///
    /// # Arguments
    /// * `api` - The processing service
    /// * `prefix` - Only jobs whose names start with this prefix are yielded
    /// * `throttle_backoff` - Sleep between attempts of a throttled listing call
    pub fn new(
        api: Arc<dyn ProcessingApi>,
        prefix: impl Into<String>,
        throttle_backoff: Duration,
    ) -> Self {
        Self {
            api,
            prefix: prefix.into(),
            throttle_backoff,
            last_seen: None,
            next_last_seen: None,
        }
    }

    /// Watermark the current (or next) scan stops at
    pub fn watermark(&self) -> Option<&JobHandle> {
        self.next_last_seen.as_ref().or(self.last_seen.as_ref())
    }

    /// Starts a new scan
    pub fn scan(&mut self) -> Scan<'_> {
        if let Some(next) = self.next_last_seen.take() {
            self.last_seen = Some(next);
        }
        Scan {
            discoverer: self,
            buffered: VecDeque::new(),
            next_token: None,
            finished: false,
        }
    }
}

/// One pass over the listing, newest job first
///
/// Pull jobs with [`Scan::next`]; dropping the scan ends it.
pub struct Scan<'a> {
    discoverer: &'a mut NewJobDiscoverer,
    buffered: VecDeque<ProcessingJobSummary>,
    next_token: Option<String>,
    finished: bool,
}

impl Scan<'_> {
    /// Returns the next new job, or `None` once the watermark or the end of
    /// the listing is reached
    pub async fn next(&mut self) -> Result<Option<ProcessingJobSummary>> {
        loop {
            if let Some(job) = self.buffered.pop_front() {
                let name = job.processing_job_name.as_str();

                if self.discoverer.next_last_seen.is_none() {
                    self.discoverer.next_last_seen = Some(JobHandle::new(name));
                }

                if self
                    .discoverer
                    .last_seen
                    .as_ref()
                    .is_some_and(|seen| seen.as_str() == name)
                {
                    debug!("Reached watermark {}", name);
                    self.buffered.clear();
                    self.finished = true;
                    return Ok(None);
                }

                if !name.starts_with(&self.discoverer.prefix) {
                    continue;
                }

                return Ok(Some(job));
            }

            if self.finished {
                return Ok(None);
            }

            self.fetch_page().await?;
        }
    }

    /// Pulls at most `cap` new jobs
    pub async fn take(mut self, cap: usize) -> Result<Vec<ProcessingJobSummary>> {
        let mut jobs = Vec::new();
        while jobs.len() < cap {
            match self.next().await? {
                Some(job) => jobs.push(job),
                None => break,
            }
        }
        Ok(jobs)
    }

    async fn fetch_page(&mut self) -> Result<()> {
        let query = ListProcessingJobs {
            max_results: LIST_PAGE_SIZE,
            next_token: self.next_token.take(),
            name_contains: Some(self.discoverer.prefix.clone()),
        };

        let api = &self.discoverer.api;
        let page = retry_throttled(self.discoverer.throttle_backoff, "list jobs", || {
            api.list_processing_jobs(&query)
        })
        .await
        .map_err(|e| RunError::remote("list jobs", e))?;

        debug!(
            "Listed {} job(s), more pages: {}",
            page.processing_job_summaries.len(),
            page.next_token.is_some()
        );

        self.next_token = page.next_token.filter(|token| !token.is_empty());
        if self.next_token.is_none() {
            self.finished = true;
        }
        self.buffered.extend(page.processing_job_summaries);

        Ok(())
    }
}
