//! Processing service seam
//!
//! Everything the orchestrator needs from the remote service, as a trait so
//! the tracker can run against the HTTP client or an in-memory fake.

use async_trait::async_trait;
use nbrun_core::dto::job::{
    CallerIdentity, CreateProcessingJob, CreateProcessingJobResponse, ListProcessingJobs,
    ProcessingJobDescription, ProcessingJobPage,
};

use crate::error::Result;

/// Remote processing service operations
#[async_trait]
pub trait ProcessingApi: Send + Sync {
    /// Creates a processing job; the job runs asynchronously
    async fn create_processing_job(
        &self,
        req: &CreateProcessingJob,
    ) -> Result<CreateProcessingJobResponse>;

    /// Fetches the current description of a job
    async fn describe_processing_job(&self, name: &str) -> Result<ProcessingJobDescription>;

    /// Lists one page of jobs, newest first
    async fn list_processing_jobs(&self, query: &ListProcessingJobs) -> Result<ProcessingJobPage>;

    /// Asks the service to stop a job
    async fn stop_processing_job(&self, name: &str) -> Result<()>;

    /// Returns the account the client's credentials belong to
    async fn caller_identity(&self) -> Result<CallerIdentity>;
}
