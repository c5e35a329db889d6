//! nbrun Tracker
//!
//! Submits notebook runs to the remote processing service and keeps a bounded,
//! incrementally refreshed view of the most recent runs.
//!
//! Architecture:
//! - Configuration: settings from the environment or explicit construction
//! - Services: job submission, status polling with throttling retry, run listing
//! - Scheduler: new-job discovery, the run tracker, and its single-owner refresh loop
//!
//! Only jobs that are still active are re-described on each refresh; settled
//! runs are kept as they were last seen until they age out of the window.

pub mod config;
pub mod error;
pub mod retry;
pub mod scheduler;
pub mod service;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use error::{Result, RunError};
pub use scheduler::{
    NewJobDiscoverer, NotebookRunTracker, RunView, TrackerHandle, TrackerService, UpdateReport,
};
pub use service::{JobSubmitter, RunFilter, RunLister, StatusPoller, SubmitRequest};
