//! Run domain types

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::naming::{abbreviate_image, abbreviate_role};
use crate::dto::job::{ProcessingJobDescription, ProcessingJobStatus, ProcessingJobSummary, env};

/// Name of one remote processing job
///
/// Assigned at submission and never reused, so it keys every later query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Derives the handle from a job ARN by dropping everything up to the last `/`
    pub fn from_arn(arn: &str) -> Self {
        let name = arn.rsplit_once('/').map_or(arn, |(_, name)| name);
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for JobHandle {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for JobHandle {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl From<&str> for JobHandle {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// Lifecycle status of a notebook run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunStatus {
    Queued,
    Running,
    Stopping,
    Completed,
    Failed,
    Stopped,
}

impl RunStatus {
    /// Whether no further transition can happen from this status
    ///
    /// `Queued` is not terminal: a queued job still moves on to run, so it is
    /// tracked and re-described like `Running` and `Stopping`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Stopped
        )
    }

    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }
}

impl From<ProcessingJobStatus> for RunStatus {
    fn from(status: ProcessingJobStatus) -> Self {
        match status {
            ProcessingJobStatus::Pending => RunStatus::Queued,
            ProcessingJobStatus::InProgress => RunStatus::Running,
            ProcessingJobStatus::Stopping => RunStatus::Stopping,
            ProcessingJobStatus::Completed => RunStatus::Completed,
            ProcessingJobStatus::Failed => RunStatus::Failed,
            ProcessingJobStatus::Stopped => RunStatus::Stopped,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Summary of one notebook run
///
/// Built from a single describe call. While the run is active the tracker
/// refreshes its lifecycle fields; once terminal the descriptor never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunDescriptor {
    pub job: JobHandle,
    /// Notebook path the run was submitted for
    pub notebook: String,
    /// Schedule rule that triggered the run, empty for on-demand runs
    pub rule: String,
    /// Notebook parameters as the raw JSON string passed to the container
    pub parameters: String,
    pub status: RunStatus,
    pub failure_reason: Option<String>,
    pub created: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Location of the output notebook, set once the run completed
    pub result_location: Option<String>,
    pub input_location: String,
    pub image: String,
    pub instance: String,
    pub role: String,
}

impl RunDescriptor {
    /// Builds a descriptor from a full job description
    pub fn from_description(desc: &ProcessingJobDescription) -> Self {
        let status = RunStatus::from(desc.processing_job_status);
        let env_value = |key: &str| desc.environment.get(key).cloned().unwrap_or_default();

        let result_location = if status == RunStatus::Completed {
            let prefix = desc
                .processing_output_config
                .as_ref()
                .and_then(|config| config.outputs.first())
                .map(|output| output.s3_output.s3_uri.as_str());
            let output = desc.environment.get(env::PAPERMILL_OUTPUT);
            match (prefix, output) {
                (Some(prefix), Some(output)) => {
                    let name = output.rsplit_once('/').map_or(output.as_str(), |(_, n)| n);
                    Some(format!("{}/{}", prefix.trim_end_matches('/'), name))
                }
                _ => None,
            }
        } else {
            None
        };

        let failure_reason = if status == RunStatus::Failed {
            desc.exit_message
                .clone()
                .or_else(|| desc.failure_reason.clone())
        } else {
            None
        };

        Self {
            job: JobHandle::new(desc.processing_job_name.clone()),
            notebook: env_value(env::PAPERMILL_NOTEBOOK_NAME),
            rule: env_value(env::AWS_EVENTBRIDGE_RULE),
            parameters: env_value(env::PAPERMILL_PARAMS),
            status,
            failure_reason,
            created: desc.creation_time,
            start_time: desc.processing_start_time,
            end_time: desc.processing_end_time,
            result_location,
            input_location: desc
                .processing_inputs
                .first()
                .map(|input| input.s3_input.s3_uri.clone())
                .unwrap_or_default(),
            image: abbreviate_image(&desc.app_specification.image_uri),
            instance: desc.processing_resources.cluster_config.instance_type.clone(),
            role: abbreviate_role(&desc.role_arn),
        }
    }

    /// Builds a partial descriptor from a listing entry
    ///
    /// Used when the job could not be described. The submission fields are left
    /// empty; the tracker replaces the whole descriptor once a describe succeeds,
    /// whatever the status.
    pub fn from_summary(summary: &ProcessingJobSummary) -> Self {
        let status = RunStatus::from(summary.processing_job_status);
        Self {
            job: JobHandle::new(summary.processing_job_name.clone()),
            notebook: String::new(),
            rule: String::new(),
            parameters: String::new(),
            status,
            failure_reason: if status == RunStatus::Failed {
                summary
                    .exit_message
                    .clone()
                    .or_else(|| summary.failure_reason.clone())
            } else {
                None
            },
            created: summary.creation_time,
            start_time: None,
            end_time: summary.processing_end_time,
            result_location: None,
            input_location: String::new(),
            image: String::new(),
            instance: String::new(),
            role: String::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Wall-clock run time, known once both start and end are reported
    pub fn elapsed(&self) -> Option<TimeDelta> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    /// Copies the lifecycle fields of a fresher description of the same job
    ///
    /// Terminal descriptors are left untouched. Returns whether the status changed.
    pub fn refresh_from(&mut self, fresh: RunDescriptor) -> bool {
        if self.is_terminal() {
            return false;
        }
        let changed = self.status != fresh.status;
        self.status = fresh.status;
        self.failure_reason = fresh.failure_reason;
        self.start_time = fresh.start_time;
        self.end_time = fresh.end_time;
        self.result_location = fresh.result_location;
        changed
    }

    /// Renders the parameter JSON as `key=value, key=value`
    ///
    /// Returns an empty string when the parameters are not a JSON object.
    pub fn expanded_parameters(&self) -> String {
        let Ok(map) =
            serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(&self.parameters)
        else {
            return String::new();
        };

        map.iter()
            .map(|(key, value)| match value {
                serde_json::Value::String(s) => format!("{}={}", key, s),
                other => format!("{}={}", key, other),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}
