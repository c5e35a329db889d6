//! Service layer
//!
//! Services talk to the processing service on behalf of callers: submitting
//! runs, describing and stopping them, and listing past runs. They hold no
//! tracking state; that lives in the scheduler layer.

mod listing;
mod status;
mod submission;

pub use listing::{RunFilter, RunLister};
pub use status::StatusPoller;
pub use submission::{JobSubmitter, SubmitRequest};
