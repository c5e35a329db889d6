//! In-memory processing service for tests
//!
//! Jobs are kept in creation order and listed newest first. Statuses can be
//! changed between calls, scripted per describe call, and calls can be made to
//! throttle or fail.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use nbrun_client::{ClientError, ProcessingApi, Result};
use nbrun_core::dto::job::{
    AppSpecification, CallerIdentity, ClusterConfig, CreateProcessingJob,
    CreateProcessingJobResponse, ListProcessingJobs, ProcessingInput, ProcessingJobDescription,
    ProcessingJobPage, ProcessingJobStatus, ProcessingJobSummary, ProcessingOutput,
    ProcessingOutputConfig, ProcessingResources, S3Input, S3Output, env,
};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Mutex;

pub(crate) const ACCOUNT: &str = "123456789012";

struct FakeJob {
    name: String,
    status: ProcessingJobStatus,
    scripted: VecDeque<ProcessingJobStatus>,
    exit_message: Option<String>,
    created: DateTime<Utc>,
    environment: BTreeMap<String, String>,
}

#[derive(Default)]
struct FakeState {
    jobs: Vec<FakeJob>,
    throttle_describe: HashMap<String, u32>,
    throttle_list: u32,
    fail_describe: HashSet<String>,
    fail_list: bool,
    fail_create: Option<ClientError>,
    describe_calls: HashMap<String, usize>,
    list_calls: usize,
    identity_calls: usize,
    created: Vec<CreateProcessingJob>,
    stopped: Vec<String>,
}

#[derive(Default)]
pub(crate) struct FakeProcessingApi {
    state: Mutex<FakeState>,
}

impl FakeProcessingApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds a job created after every existing one
    pub(crate) fn add_job(&self, name: &str, status: ProcessingJobStatus) {
        let mut environment = BTreeMap::new();
        environment.insert(
            env::PAPERMILL_NOTEBOOK_NAME.to_string(),
            format!("{}.ipynb", name),
        );
        environment.insert(env::PAPERMILL_OUTPUT.to_string(), format!("/out/{}.ipynb", name));
        environment.insert(env::PAPERMILL_PARAMS.to_string(), "{}".to_string());
        self.push_job(name, status, environment);
    }

    pub(crate) fn add_job_with_env(
        &self,
        name: &str,
        status: ProcessingJobStatus,
        environment: BTreeMap<String, String>,
    ) {
        self.push_job(name, status, environment);
    }

    fn push_job(
        &self,
        name: &str,
        status: ProcessingJobStatus,
        environment: BTreeMap<String, String>,
    ) {
        let mut state = self.state.lock().unwrap();
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
            + Duration::seconds(state.jobs.len() as i64);
        state.jobs.push(FakeJob {
            name: name.to_string(),
            status,
            scripted: VecDeque::new(),
            exit_message: None,
            created,
            environment,
        });
    }

    pub(crate) fn set_status(&self, name: &str, status: ProcessingJobStatus) {
        let mut state = self.state.lock().unwrap();
        let job = state.jobs.iter_mut().find(|j| j.name == name).unwrap();
        job.status = status;
        job.scripted.clear();
    }

    pub(crate) fn set_exit_message(&self, name: &str, message: &str) {
        let mut state = self.state.lock().unwrap();
        let job = state.jobs.iter_mut().find(|j| j.name == name).unwrap();
        job.exit_message = Some(message.to_string());
    }

    /// Statuses returned by successive describe calls; the last one sticks
    pub(crate) fn script_statuses(&self, name: &str, statuses: Vec<ProcessingJobStatus>) {
        let mut state = self.state.lock().unwrap();
        let job = state.jobs.iter_mut().find(|j| j.name == name).unwrap();
        job.scripted = statuses.into();
    }

    pub(crate) fn throttle_describe(&self, name: &str, times: u32) {
        let mut state = self.state.lock().unwrap();
        state.throttle_describe.insert(name.to_string(), times);
    }

    pub(crate) fn throttle_list(&self, times: u32) {
        self.state.lock().unwrap().throttle_list = times;
    }

    pub(crate) fn fail_describe(&self, name: &str, fail: bool) {
        let mut state = self.state.lock().unwrap();
        if fail {
            state.fail_describe.insert(name.to_string());
        } else {
            state.fail_describe.remove(name);
        }
    }

    pub(crate) fn fail_list(&self, fail: bool) {
        self.state.lock().unwrap().fail_list = fail;
    }

    pub(crate) fn fail_create(&self, error: ClientError) {
        self.state.lock().unwrap().fail_create = Some(error);
    }

    pub(crate) fn describe_calls(&self, name: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.describe_calls.get(name).copied().unwrap_or(0)
    }

    pub(crate) fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls
    }

    pub(crate) fn identity_calls(&self) -> usize {
        self.state.lock().unwrap().identity_calls
    }

    pub(crate) fn created(&self) -> Vec<CreateProcessingJob> {
        self.state.lock().unwrap().created.clone()
    }

    pub(crate) fn stopped(&self) -> Vec<String> {
        self.state.lock().unwrap().stopped.clone()
    }
}

#[async_trait]
impl ProcessingApi for FakeProcessingApi {
    async fn create_processing_job(
        &self,
        req: &CreateProcessingJob,
    ) -> Result<CreateProcessingJobResponse> {
        let mut state = self.state.lock().unwrap();
        state.created.push(req.clone());
        if let Some(error) = state.fail_create.take() {
            return Err(error);
        }
        drop(state);

        self.push_job(
            &req.processing_job_name,
            ProcessingJobStatus::InProgress,
            req.environment.clone(),
        );
        Ok(CreateProcessingJobResponse {
            processing_job_arn: format!(
                "arn:aws:sagemaker:us-west-2:{}:processing-job/{}",
                ACCOUNT, req.processing_job_name
            ),
        })
    }

    async fn describe_processing_job(&self, name: &str) -> Result<ProcessingJobDescription> {
        let mut state = self.state.lock().unwrap();
        *state.describe_calls.entry(name.to_string()).or_default() += 1;

        if let Some(remaining) = state.throttle_describe.get_mut(name) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ClientError::Throttled("Rate exceeded".to_string()));
            }
        }
        if state.fail_describe.contains(name) {
            return Err(ClientError::api_error(500, "Internal failure"));
        }

        let Some(job) = state.jobs.iter_mut().find(|j| j.name == name) else {
            return Err(ClientError::NotFound(name.to_string()));
        };
        if let Some(next) = job.scripted.pop_front() {
            job.status = next;
        }

        let terminal = matches!(
            job.status,
            ProcessingJobStatus::Completed
                | ProcessingJobStatus::Failed
                | ProcessingJobStatus::Stopped
        );
        Ok(ProcessingJobDescription {
            processing_job_name: job.name.clone(),
            processing_job_status: job.status,
            exit_message: job.exit_message.clone(),
            failure_reason: None,
            creation_time: job.created,
            processing_start_time: Some(job.created + Duration::seconds(60)),
            processing_end_time: terminal.then(|| job.created + Duration::seconds(120)),
            processing_inputs: vec![ProcessingInput {
                input_name: "notebook".to_string(),
                s3_input: S3Input {
                    s3_uri: "s3://bucket/papermill_input/".to_string(),
                    local_path: "/opt/ml/processing/input/".to_string(),
                    s3_data_type: "S3Prefix".to_string(),
                    s3_input_mode: "File".to_string(),
                    s3_data_distribution_type: "FullyReplicated".to_string(),
                },
            }],
            processing_output_config: Some(ProcessingOutputConfig {
                outputs: vec![ProcessingOutput {
                    output_name: "result".to_string(),
                    s3_output: S3Output {
                        s3_uri: "s3://bucket/papermill_output".to_string(),
                        local_path: "/opt/ml/processing/output/".to_string(),
                        s3_upload_mode: "EndOfJob".to_string(),
                    },
                }],
            }),
            processing_resources: ProcessingResources {
                cluster_config: ClusterConfig {
                    instance_count: 1,
                    instance_type: "ml.m5.large".to_string(),
                    volume_size_in_gb: 40,
                },
            },
            app_specification: AppSpecification {
                image_uri: format!("{}.dkr.ecr.us-west-2.amazonaws.com/runner:latest", ACCOUNT),
                container_arguments: vec!["run_notebook".to_string()],
            },
            role_arn: format!("arn:aws:iam::{}:role/Exec", ACCOUNT),
            environment: job.environment.clone(),
        })
    }

    async fn list_processing_jobs(&self, query: &ListProcessingJobs) -> Result<ProcessingJobPage> {
        let mut state = self.state.lock().unwrap();
        state.list_calls += 1;

        if state.throttle_list > 0 {
            state.throttle_list -= 1;
            return Err(ClientError::Throttled("Rate exceeded".to_string()));
        }
        if state.fail_list {
            return Err(ClientError::api_error(500, "Internal failure"));
        }

        let matching: Vec<&FakeJob> = state
            .jobs
            .iter()
            .rev()
            .filter(|job| {
                query
                    .name_contains
                    .as_deref()
                    .is_none_or(|needle| job.name.contains(needle))
            })
            .collect();

        let start = query
            .next_token
            .as_deref()
            .and_then(|t| t.parse::<usize>().ok())
            .unwrap_or(0);
        let end = (start + query.max_results as usize).min(matching.len());

        let summaries = matching[start.min(end)..end]
            .iter()
            .map(|job| ProcessingJobSummary {
                processing_job_name: job.name.clone(),
                processing_job_arn: None,
                processing_job_status: job.status,
                creation_time: job.created,
                processing_end_time: None,
                exit_message: None,
                failure_reason: None,
            })
            .collect();

        Ok(ProcessingJobPage {
            processing_job_summaries: summaries,
            next_token: (end < matching.len()).then(|| end.to_string()),
        })
    }

    async fn stop_processing_job(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let Some(job) = state.jobs.iter_mut().find(|j| j.name == name) else {
            return Err(ClientError::NotFound(name.to_string()));
        };
        job.status = ProcessingJobStatus::Stopping;
        state.stopped.push(name.to_string());
        Ok(())
    }

    async fn caller_identity(&self) -> Result<CallerIdentity> {
        self.state.lock().unwrap().identity_calls += 1;
        Ok(CallerIdentity {
            account: ACCOUNT.to_string(),
            arn: None,
        })
    }
}
