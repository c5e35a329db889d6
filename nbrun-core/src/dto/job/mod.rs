//! Processing job DTOs
//!
//! Request and response bodies of the remote processing service. Only the
//! fields the orchestrator reads or writes are modelled; unknown fields in
//! responses are ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Environment keys passed to (and echoed back from) the notebook container
pub mod env {
    pub const PAPERMILL_INPUT: &str = "PAPERMILL_INPUT";
    pub const PAPERMILL_OUTPUT: &str = "PAPERMILL_OUTPUT";
    pub const PAPERMILL_PARAMS: &str = "PAPERMILL_PARAMS";
    pub const PAPERMILL_NOTEBOOK_NAME: &str = "PAPERMILL_NOTEBOOK_NAME";
    pub const AWS_DEFAULT_REGION: &str = "AWS_DEFAULT_REGION";
    /// Set by the scheduler when a run was triggered by a schedule rule
    pub const AWS_EVENTBRIDGE_RULE: &str = "AWS_EVENTBRIDGE_RULE";
}

/// Native job status as reported by the processing service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessingJobStatus {
    #[serde(alias = "Queued")]
    Pending,
    InProgress,
    Stopping,
    Completed,
    Failed,
    Stopped,
}

// =============================================================================
// Create
// =============================================================================

/// Request to create a new processing job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateProcessingJob {
    pub processing_job_name: String,
    pub processing_inputs: Vec<ProcessingInput>,
    pub processing_output_config: ProcessingOutputConfig,
    pub processing_resources: ProcessingResources,
    pub stopping_condition: StoppingCondition,
    pub app_specification: AppSpecification,
    pub role_arn: String,
    pub environment: BTreeMap<String, String>,
}

/// Response to a successful create call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateProcessingJobResponse {
    pub processing_job_arn: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProcessingInput {
    pub input_name: String,
    pub s3_input: S3Input,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct S3Input {
    pub s3_uri: String,
    pub local_path: String,
    #[serde(default)]
    pub s3_data_type: String,
    #[serde(default)]
    pub s3_input_mode: String,
    #[serde(default)]
    pub s3_data_distribution_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProcessingOutputConfig {
    pub outputs: Vec<ProcessingOutput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProcessingOutput {
    pub output_name: String,
    pub s3_output: S3Output,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct S3Output {
    pub s3_uri: String,
    pub local_path: String,
    #[serde(default)]
    pub s3_upload_mode: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProcessingResources {
    pub cluster_config: ClusterConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClusterConfig {
    pub instance_count: u32,
    pub instance_type: String,
    #[serde(rename = "VolumeSizeInGB")]
    pub volume_size_in_gb: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StoppingCondition {
    pub max_runtime_in_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppSpecification {
    pub image_uri: String,
    #[serde(default)]
    pub container_arguments: Vec<String>,
}

// =============================================================================
// Describe
// =============================================================================

/// Full description of one processing job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProcessingJobDescription {
    pub processing_job_name: String,
    pub processing_job_status: ProcessingJobStatus,
    #[serde(default)]
    pub exit_message: Option<String>,
    #[serde(default)]
    pub failure_reason: Option<String>,
    pub creation_time: DateTime<Utc>,
    #[serde(default)]
    pub processing_start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub processing_end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub processing_inputs: Vec<ProcessingInput>,
    #[serde(default)]
    pub processing_output_config: Option<ProcessingOutputConfig>,
    pub processing_resources: ProcessingResources,
    pub app_specification: AppSpecification,
    pub role_arn: String,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

// =============================================================================
// List
// =============================================================================

/// Query parameters of a listing call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListProcessingJobs {
    pub max_results: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_contains: Option<String>,
}

/// One page of a listing, newest job first
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProcessingJobPage {
    #[serde(default)]
    pub processing_job_summaries: Vec<ProcessingJobSummary>,
    #[serde(default)]
    pub next_token: Option<String>,
}

/// Minimal listing entry for one job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProcessingJobSummary {
    pub processing_job_name: String,
    #[serde(default)]
    pub processing_job_arn: Option<String>,
    pub processing_job_status: ProcessingJobStatus,
    pub creation_time: DateTime<Utc>,
    #[serde(default)]
    pub processing_end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub exit_message: Option<String>,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

// =============================================================================
// Identity
// =============================================================================

/// Account context of the credentials the client runs with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CallerIdentity {
    pub account: String,
    #[serde(default)]
    pub arn: Option<String>,
}
