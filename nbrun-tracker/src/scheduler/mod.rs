//! Scheduler layer for the tracker
//!
//! This layer keeps the recent-run history current: discovering jobs created
//! since the last refresh, re-describing runs that are still active, and
//! running those refreshes periodically on a single task that owns the
//! tracker.

pub mod discover;
pub mod refresher;
pub mod tracker;

pub use discover::{NewJobDiscoverer, Scan};
pub use refresher::{TrackerHandle, TrackerService};
pub use tracker::{NotebookRunTracker, RunView, UpdateReport};
