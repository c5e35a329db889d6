//! Processing job endpoints

use async_trait::async_trait;
use nbrun_core::dto::job::{
    CallerIdentity, CreateProcessingJob, CreateProcessingJobResponse, ListProcessingJobs,
    ProcessingJobDescription, ProcessingJobPage,
};
use tracing::debug;

use crate::ProcessingClient;
use crate::api::ProcessingApi;
use crate::error::Result;

#[async_trait]
impl ProcessingApi for ProcessingClient {
    // =============================================================================
    // Job Lifecycle
    // =============================================================================

    async fn create_processing_job(
        &self,
        req: &CreateProcessingJob,
    ) -> Result<CreateProcessingJobResponse> {
        let url = format!("{}/processing-jobs", self.base_url);
        debug!("Creating processing job {}", req.processing_job_name);
        let response = self.client.post(&url).json(req).send().await?;

        self.handle_response(response).await
    }

    async fn stop_processing_job(&self, name: &str) -> Result<()> {
        let url = format!("{}/processing-jobs/{}/stop", self.base_url, name);
        let response = self.client.post(&url).send().await?;

        self.handle_empty_response(response).await
    }

    // =============================================================================
    // Job Queries
    // =============================================================================

    async fn describe_processing_job(&self, name: &str) -> Result<ProcessingJobDescription> {
        let url = format!("{}/processing-jobs/{}", self.base_url, name);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    async fn list_processing_jobs(&self, query: &ListProcessingJobs) -> Result<ProcessingJobPage> {
        let url = format!("{}/processing-jobs", self.base_url);
        let response = self.client.get(&url).query(query).send().await?;

        self.handle_response(response).await
    }

    // =============================================================================
    // Identity
    // =============================================================================

    async fn caller_identity(&self) -> Result<CallerIdentity> {
        let url = format!("{}/caller-identity", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }
}
