//! Notebook run tracker
//!
//! Keeps the most recent `max_entries` runs and knows that only active runs
//! can change, so each update describes new jobs once and re-describes only
//! the runs that are still active. Settled runs are never polled again.
//!
//! Runs are stored oldest first so new ones can be appended at the back; every
//! view is newest first.
//!
//! A run that could not be described when discovered is kept from its listing
//! entry and marked incomplete. Incomplete runs are re-described on every
//! update, even when the listing already reported them as finished, until one
//! describe succeeds.

use chrono::{DateTime, Utc};
use nbrun_core::domain::run::{JobHandle, RunDescriptor};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::scheduler::discover::NewJobDiscoverer;
use crate::service::StatusPoller;

/// Outcome of one [`NotebookRunTracker::update`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    /// Runs added to the history
    pub discovered: usize,
    /// Active runs that reached a terminal status
    pub settled: usize,
    /// Runs dropped because the history was full
    pub evicted: usize,
    /// Active runs whose refresh failed; they stay stale until the next update
    pub refresh_failures: usize,
    /// Whether listing new jobs failed
    pub discovery_failed: bool,
}

/// Immutable copy of the tracker's state, newest run first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunView {
    pub runs: Vec<RunDescriptor>,
    pub active: Vec<JobHandle>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl RunView {
    pub fn get(&self, index: usize) -> Option<&RunDescriptor> {
        self.runs.get(index)
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

/// Bounded, incrementally refreshed history of recent runs
pub struct NotebookRunTracker {
    poller: StatusPoller,
    discoverer: NewJobDiscoverer,
    max_entries: usize,
    history: VecDeque<RunDescriptor>,
    /// Sequence number of `history[0]`
    base_seq: u64,
    /// Active runs by handle, pointing at their sequence number in `history`
    active: HashMap<JobHandle, u64>,
    /// Runs built from a listing entry, still waiting for a full describe
    incomplete: HashMap<JobHandle, u64>,
    updated_at: Option<DateTime<Utc>>,
}

impl NotebookRunTracker {
    /// Creates an empty tracker
    ///
    /// # Arguments
    /// * `poller` - Describes individual runs
    /// * `discoverer` - Finds jobs created since the previous update
    /// * `max_entries` - Number of recent runs to keep (at least one)
    pub fn new(poller: StatusPoller, discoverer: NewJobDiscoverer, max_entries: usize) -> Self {
        Self {
            poller,
            discoverer,
            max_entries: max_entries.max(1),
            history: VecDeque::new(),
            base_seq: 0,
            active: HashMap::new(),
            incomplete: HashMap::new(),
            updated_at: None,
        }
    }

    /// Discovers new runs, refreshes active ones, then trims the history
    pub async fn update(&mut self) -> UpdateReport {
        let mut report = UpdateReport::default();

        self.discover(&mut report).await;
        self.refresh(&mut report).await;
        report.evicted = self.evict();
        self.updated_at = Some(Utc::now());

        debug!(
            "Tracker update: {} discovered, {} settled, {} evicted, {} active",
            report.discovered,
            report.settled,
            report.evicted,
            self.active.len()
        );

        report
    }

    /// Starts tracking a freshly submitted run before discovery reaches it
    pub async fn register(&mut self, job: &JobHandle) -> Result<()> {
        if contains(&self.history, job) {
            return Ok(());
        }

        let run = self.poller.describe(job).await?;
        info!("Tracking job {} ({})", job, run.status);
        self.push(run);
        self.evict();

        Ok(())
    }

    // =============================================================================
    // Views
    // =============================================================================

    /// Run at `index`, newest first
    pub fn get(&self, index: usize) -> Option<&RunDescriptor> {
        let len = self.history.len();
        if index >= len {
            return None;
        }
        self.history.get(len - 1 - index)
    }

    /// All tracked runs, newest first
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &RunDescriptor> + ExactSizeIterator {
        self.history.iter().rev()
    }

    /// Up to `n` most recent runs, newest first
    pub fn recent(&self, n: usize) -> Vec<&RunDescriptor> {
        self.iter().take(n).collect()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Whether `job` is tracked and still active
    pub fn is_active(&self, job: &JobHandle) -> bool {
        self.active.contains_key(job)
    }

    /// Handles of the active runs, newest first
    pub fn active_handles(&self) -> Vec<JobHandle> {
        let mut active: Vec<(&JobHandle, u64)> =
            self.active.iter().map(|(job, seq)| (job, *seq)).collect();
        active.sort_by(|a, b| b.1.cmp(&a.1));
        active.into_iter().map(|(job, _)| job.clone()).collect()
    }

    /// Copies the current state
    pub fn snapshot(&self) -> RunView {
        RunView {
            runs: self.iter().cloned().collect(),
            active: self.active_handles(),
            updated_at: self.updated_at,
        }
    }

    // =============================================================================
    // Update phases
    // =============================================================================

    async fn discover(&mut self, report: &mut UpdateReport) {
        // newest first, as the listing returns them
        let mut new_runs: Vec<(RunDescriptor, bool)> = Vec::new();
        let mut scan = self.discoverer.scan();

        while new_runs.len() < self.max_entries {
            let summary = match scan.next().await {
                Ok(Some(summary)) => summary,
                Ok(None) => break,
                Err(e) => {
                    error!("Failed to list new jobs: {}", e);
                    report.discovery_failed = true;
                    break;
                }
            };

            let job = JobHandle::new(summary.processing_job_name.clone());
            if contains(&self.history, &job) || new_runs.iter().any(|(r, _)| r.job == job) {
                debug!("Job {} is already tracked", job);
                continue;
            }

            debug!("Describing new job {}", job);
            let entry = match self.poller.describe(&job).await {
                Ok(run) => (run, true),
                Err(e) => {
                    warn!("Failed to describe new job {}, using listing summary: {}", job, e);
                    (RunDescriptor::from_summary(&summary), false)
                }
            };
            new_runs.push(entry);
        }

        drop(scan);

        report.discovered = new_runs.len();
        for (run, complete) in new_runs.into_iter().rev() {
            let job = run.job.clone();
            let seq = self.push(run);
            if !complete {
                self.incomplete.insert(job, seq);
            }
        }
    }

    async fn refresh(&mut self, report: &mut UpdateReport) {
        let mut due: Vec<(JobHandle, u64)> = self
            .active
            .iter()
            .chain(self.incomplete.iter())
            .map(|(job, seq)| (job.clone(), *seq))
            .collect();
        due.sort_by_key(|(_, seq)| *seq);
        due.dedup_by_key(|(_, seq)| *seq);

        for (job, seq) in due {
            debug!("Describing job {}", job);
            let fresh = match self.poller.describe(&job).await {
                Ok(fresh) => fresh,
                Err(e) => {
                    warn!("Failed to refresh job {}, keeping last known state: {}", job, e);
                    report.refresh_failures += 1;
                    continue;
                }
            };

            let complete = self.incomplete.remove(&job).is_none();
            let status = {
                let Some(run) = self.entry_mut(seq) else {
                    continue;
                };
                if complete {
                    run.refresh_from(fresh);
                } else {
                    debug!("Filled in details of job {}", job);
                    *run = fresh;
                }
                run.status
            };

            if status.is_terminal() && self.active.remove(&job).is_some() {
                info!("Job {} finished with status {}", job, status);
                report.settled += 1;
            } else if status.is_active() {
                self.active.entry(job).or_insert(seq);
            }
        }
    }

    /// Drops the oldest runs beyond `max_entries`; evicted runs keep running remotely
    fn evict(&mut self) -> usize {
        let mut evicted = 0;
        while self.history.len() > self.max_entries {
            let Some(run) = self.history.pop_front() else {
                break;
            };
            self.base_seq += 1;
            evicted += 1;
            self.incomplete.remove(&run.job);

            if self.active.remove(&run.job).is_some() {
                info!("Job {} aged out of the window while {}", run.job, run.status);
            }
        }
        evicted
    }

    fn push(&mut self, run: RunDescriptor) -> u64 {
        let seq = self.base_seq + self.history.len() as u64;
        if run.status.is_active() {
            self.active.insert(run.job.clone(), seq);
        }
        self.history.push_back(run);
        seq
    }

    fn entry_mut(&mut self, seq: u64) -> Option<&mut RunDescriptor> {
        let index = seq.checked_sub(self.base_seq)?;
        self.history.get_mut(index as usize)
    }
}

fn contains(history: &VecDeque<RunDescriptor>, job: &JobHandle) -> bool {
    history.iter().any(|run| &run.job == job)
}
