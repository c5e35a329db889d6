//! Job submitter
//!
//! Turns a notebook run request into one create call:
//! - derives a unique, length-limited job name from the notebook
//! - qualifies bare role and image names with the caller's account and region
//! - fills in the container layout the notebook runner image expects
//!
//! Submissions are not retried; a rejected job never started.

use chrono::{DateTime, Utc};
use nbrun_client::ProcessingApi;
use nbrun_core::domain::naming::{self, derive_job_name, output_notebook_name};
use nbrun_core::domain::run::{JobHandle, RunDescriptor};
use nbrun_core::dto::job::{
    AppSpecification, ClusterConfig, CreateProcessingJob, ProcessingInput, ProcessingOutput,
    ProcessingOutputConfig, ProcessingResources, S3Input, S3Output, StoppingCondition, env,
};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Result, RunError};
use crate::service::status::StatusPoller;

const INPUT_DIR: &str = "/opt/ml/processing/input/";
const OUTPUT_DIR: &str = "/opt/ml/processing/output/";
const VOLUME_SIZE_GB: u32 = 40;
const MAX_RUNTIME_SECS: u64 = 7200;
const RUNNER_COMMAND: &str = "run_notebook";

/// Request to run one notebook
#[derive(Debug, Clone, Default)]
pub struct SubmitRequest {
    /// Image that provides the notebook's kernel; bare names are qualified
    pub image: String,
    /// Location the notebook (and its sibling files) were uploaded to
    pub input_location: String,
    /// Notebook path; its file name names the job and the output notebook
    pub notebook: String,
    /// Execution role; the configured default when unset
    pub role: Option<String>,
    /// Instance type; the configured default when unset
    pub instance_type: Option<String>,
    /// Output location; `s3://<default bucket>/papermill_output` when unset
    pub output_prefix: Option<String>,
    /// Notebook parameters, passed to the run as JSON
    pub parameters: BTreeMap<String, JsonValue>,
}

/// Submits notebook runs to the processing service
pub struct JobSubmitter {
    api: Arc<dyn ProcessingApi>,
    job_prefix: String,
    execution_role: String,
    instance_type: String,
    default_output_prefix: String,
    region: Option<String>,
    account: OnceCell<String>,
}

impl JobSubmitter {
    /// Creates a new submitter using the submission defaults of `config`
    pub fn new(api: Arc<dyn ProcessingApi>, config: &Config) -> Self {
        let account = match &config.account_id {
            Some(account) => OnceCell::new_with(Some(account.clone())),
            None => OnceCell::new(),
        };

        Self {
            api,
            job_prefix: config.job_prefix.clone(),
            execution_role: config.execution_role.clone(),
            instance_type: config.instance_type.clone(),
            default_output_prefix: config.default_output_prefix(),
            region: config.region.clone(),
            account,
        }
    }

    /// Submits a run and returns its handle; the job runs asynchronously
    pub async fn submit(&self, req: &SubmitRequest) -> Result<JobHandle> {
        self.submit_at(req, Utc::now()).await
    }

    /// Submits a run named after time `at`
    pub async fn submit_at(&self, req: &SubmitRequest, at: DateTime<Utc>) -> Result<JobHandle> {
        let job_name = derive_job_name(&self.job_prefix, &req.notebook, at)?;
        let output_name = output_notebook_name(&req.notebook, at)?;
        let role = self.resolve_role(req).await?;
        let image = self.resolve_image(req).await?;

        let parameters = serde_json::to_string(&req.parameters)
            .map_err(|e| RunError::InvalidRequest(format!("parameters are not JSON: {}", e)))?;

        let notebook_file = req.notebook.rsplit('/').next().unwrap_or(&req.notebook);
        let mut environment = BTreeMap::new();
        environment.insert(
            env::PAPERMILL_INPUT.to_string(),
            format!("{}{}", INPUT_DIR, notebook_file),
        );
        environment.insert(
            env::PAPERMILL_OUTPUT.to_string(),
            format!("{}{}", OUTPUT_DIR, output_name),
        );
        environment.insert(env::PAPERMILL_PARAMS.to_string(), parameters);
        environment.insert(
            env::PAPERMILL_NOTEBOOK_NAME.to_string(),
            req.notebook.clone(),
        );
        if let Some(region) = &self.region {
            environment.insert(env::AWS_DEFAULT_REGION.to_string(), region.clone());
        }

        let request = CreateProcessingJob {
            processing_job_name: job_name.clone(),
            processing_inputs: vec![ProcessingInput {
                input_name: "notebook".to_string(),
                s3_input: S3Input {
                    s3_uri: req.input_location.clone(),
                    local_path: INPUT_DIR.to_string(),
                    s3_data_type: "S3Prefix".to_string(),
                    s3_input_mode: "File".to_string(),
                    s3_data_distribution_type: "FullyReplicated".to_string(),
                },
            }],
            processing_output_config: ProcessingOutputConfig {
                outputs: vec![ProcessingOutput {
                    output_name: "result".to_string(),
                    s3_output: S3Output {
                        s3_uri: req
                            .output_prefix
                            .clone()
                            .unwrap_or_else(|| self.default_output_prefix.clone()),
                        local_path: OUTPUT_DIR.to_string(),
                        s3_upload_mode: "EndOfJob".to_string(),
                    },
                }],
            },
            processing_resources: ProcessingResources {
                cluster_config: ClusterConfig {
                    instance_count: 1,
                    instance_type: req
                        .instance_type
                        .clone()
                        .unwrap_or_else(|| self.instance_type.clone()),
                    volume_size_in_gb: VOLUME_SIZE_GB,
                },
            },
            stopping_condition: StoppingCondition {
                max_runtime_in_seconds: MAX_RUNTIME_SECS,
            },
            app_specification: AppSpecification {
                image_uri: image,
                container_arguments: vec![RUNNER_COMMAND.to_string()],
            },
            role_arn: role,
            environment,
        };

        debug!("Creating job {} for notebook {}", job_name, req.notebook);

        let response = self
            .api
            .create_processing_job(&request)
            .await
            .map_err(|source| RunError::Submission {
                notebook: req.notebook.clone(),
                source,
            })?;

        let job = JobHandle::from_arn(&response.processing_job_arn);
        info!("Job {} started for notebook {}", job, req.notebook);

        Ok(job)
    }

    /// Submits a run and waits for it to settle
    pub async fn submit_and_wait(
        &self,
        req: &SubmitRequest,
        poller: &StatusPoller,
        poll_interval: Duration,
    ) -> Result<RunDescriptor> {
        let job = self.submit(req).await?;
        poller.wait_until_terminal(&job, poll_interval).await
    }

    async fn resolve_role(&self, req: &SubmitRequest) -> Result<String> {
        let role = req.role.as_deref().unwrap_or(&self.execution_role);
        if naming::is_qualified(role) {
            return Ok(role.to_string());
        }

        let account = self.account(req).await?;
        Ok(naming::qualify_role(role, account))
    }

    async fn resolve_image(&self, req: &SubmitRequest) -> Result<String> {
        if naming::is_qualified(&req.image) {
            return Ok(req.image.clone());
        }

        let region = self.region.as_deref().ok_or_else(|| {
            RunError::InvalidRequest(format!(
                "image '{}' is not qualified and no region is configured",
                req.image
            ))
        })?;
        let account = self.account(req).await?;
        Ok(naming::qualify_image(&req.image, account, region))
    }

    /// The caller's account, queried once when not configured
    async fn account(&self, req: &SubmitRequest) -> Result<&str> {
        let account = self
            .account
            .get_or_try_init(|| async {
                let identity = self
                    .api
                    .caller_identity()
                    .await
                    .map_err(|source| RunError::Submission {
                        notebook: req.notebook.clone(),
                        source,
                    })?;
                debug!("Resolved caller account {}", identity.account);
                Ok::<_, RunError>(identity.account)
            })
            .await?;

        Ok(account.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ACCOUNT, FakeProcessingApi};
    use chrono::TimeZone;
    use nbrun_client::ClientError;
    use nbrun_core::domain::naming::NamingError;
    use nbrun_core::domain::run::RunStatus;
    use nbrun_core::dto::job::ProcessingJobStatus;

    fn config() -> Config {
        let mut config = Config::new(
            "http://localhost:8080".to_string(),
            "notebook-bucket".to_string(),
            "BasicExecuteNotebookRole".to_string(),
        );
        config.region = Some("us-west-2".to_string());
        config
    }

    fn request() -> SubmitRequest {
        let mut parameters = BTreeMap::new();
        parameters.insert("alpha".to_string(), serde_json::json!(0.5));
        SubmitRequest {
            image: "python-runner".to_string(),
            input_location: "s3://notebook-bucket/papermill_input/2024-03-09-14-05-07/".to_string(),
            notebook: "analysis/Quarterly Report.ipynb".to_string(),
            parameters,
            ..Default::default()
        }
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    #[tokio::test]
    async fn test_submit_builds_request() {
        let api = Arc::new(FakeProcessingApi::new());
        let submitter = JobSubmitter::new(api.clone(), &config());

        let job = submitter.submit_at(&request(), at()).await.unwrap();

        assert_eq!(job.as_str(), "papermill-Quarterly-Report-2024-03-09-14-05-07");

        let created = api.created();
        assert_eq!(created.len(), 1);
        let req = &created[0];
        assert_eq!(req.processing_job_name, job.as_str());
        assert_eq!(
            req.role_arn,
            format!("arn:aws:iam::{}:role/BasicExecuteNotebookRole", ACCOUNT)
        );
        assert_eq!(
            req.app_specification.image_uri,
            format!("{}.dkr.ecr.us-west-2.amazonaws.com/python-runner:latest", ACCOUNT)
        );
        assert_eq!(req.app_specification.container_arguments, vec!["run_notebook"]);
        assert_eq!(
            req.processing_output_config.outputs[0].s3_output.s3_uri,
            "s3://notebook-bucket/papermill_output"
        );
        assert_eq!(req.processing_resources.cluster_config.instance_type, "ml.m5.large");
        assert_eq!(req.stopping_condition.max_runtime_in_seconds, 7200);

        let env_var = |key: &str| req.environment.get(key).map(String::as_str);
        assert_eq!(
            env_var(env::PAPERMILL_INPUT),
            Some("/opt/ml/processing/input/Quarterly Report.ipynb")
        );
        assert_eq!(
            env_var(env::PAPERMILL_OUTPUT),
            Some("/opt/ml/processing/output/Quarterly Report-2024-03-09-14-05-07.ipynb")
        );
        assert_eq!(env_var(env::PAPERMILL_PARAMS), Some(r#"{"alpha":0.5}"#));
        assert_eq!(
            env_var(env::PAPERMILL_NOTEBOOK_NAME),
            Some("analysis/Quarterly Report.ipynb")
        );
        assert_eq!(env_var(env::AWS_DEFAULT_REGION), Some("us-west-2"));
    }

    #[tokio::test]
    async fn test_account_is_queried_once() {
        let api = Arc::new(FakeProcessingApi::new());
        let submitter = JobSubmitter::new(api.clone(), &config());

        submitter.submit_at(&request(), at()).await.unwrap();
        submitter
            .submit_at(&request(), at() + chrono::Duration::seconds(1))
            .await
            .unwrap();

        assert_eq!(api.identity_calls(), 1);
        assert_eq!(api.created().len(), 2);
    }

    #[tokio::test]
    async fn test_qualified_references_skip_identity_lookup() {
        let api = Arc::new(FakeProcessingApi::new());
        let mut config = config();
        config.region = None;
        let submitter = JobSubmitter::new(api.clone(), &config);

        let mut req = request();
        req.image = "registry.example.com/team/runner:3".to_string();
        req.role = Some("arn:aws:iam::999999999999:role/Other".to_string());
        req.instance_type = Some("ml.c5.xlarge".to_string());
        req.output_prefix = Some("s3://elsewhere/out".to_string());

        submitter.submit_at(&req, at()).await.unwrap();

        assert_eq!(api.identity_calls(), 0);
        let created = api.created();
        assert_eq!(created[0].role_arn, "arn:aws:iam::999999999999:role/Other");
        assert_eq!(
            created[0].app_specification.image_uri,
            "registry.example.com/team/runner:3"
        );
        assert_eq!(
            created[0].processing_resources.cluster_config.instance_type,
            "ml.c5.xlarge"
        );
        assert!(!created[0].environment.contains_key(env::AWS_DEFAULT_REGION));
    }

    #[tokio::test]
    async fn test_configured_account_is_used() {
        let api = Arc::new(FakeProcessingApi::new());
        let mut config = config();
        config.account_id = Some("111122223333".to_string());
        let submitter = JobSubmitter::new(api.clone(), &config);

        submitter.submit_at(&request(), at()).await.unwrap();

        assert_eq!(api.identity_calls(), 0);
        assert_eq!(
            api.created()[0].role_arn,
            "arn:aws:iam::111122223333:role/BasicExecuteNotebookRole"
        );
    }

    #[tokio::test]
    async fn test_naming_error_before_remote_call() {
        let api = Arc::new(FakeProcessingApi::new());
        let submitter = JobSubmitter::new(api.clone(), &config());

        let mut req = request();
        req.notebook = "analysis/".to_string();
        let err = submitter.submit_at(&req, at()).await.unwrap_err();

        assert!(matches!(
            err,
            RunError::Naming(NamingError::MissingNotebookName(_))
        ));
        assert!(api.created().is_empty());
        assert_eq!(api.identity_calls(), 0);
    }

    #[tokio::test]
    async fn test_bare_image_without_region_is_rejected() {
        let api = Arc::new(FakeProcessingApi::new());
        let mut config = config();
        config.region = None;
        let submitter = JobSubmitter::new(api.clone(), &config);

        let err = submitter.submit_at(&request(), at()).await.unwrap_err();

        assert!(matches!(err, RunError::InvalidRequest(_)));
        assert!(api.created().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_submission_is_not_retried() {
        let api = Arc::new(FakeProcessingApi::new());
        api.fail_create(ClientError::Throttled("Rate exceeded".to_string()));
        let submitter = JobSubmitter::new(api.clone(), &config());

        let err = submitter.submit_at(&request(), at()).await.unwrap_err();

        assert!(matches!(err, RunError::Submission { ref notebook, .. } if notebook == "analysis/Quarterly Report.ipynb"));
        assert_eq!(api.created().len(), 1);
    }

    #[tokio::test]
    async fn test_submit_and_wait() {
        let api = Arc::new(FakeProcessingApi::new());
        let submitter = JobSubmitter::new(api.clone(), &config());
        let poller = StatusPoller::new(api.clone(), Duration::from_millis(1));

        let req = request();
        let waiter = submitter.submit_and_wait(&req, &poller, Duration::from_millis(1));
        let settle = async {
            loop {
                if let Some(req) = api.created().first() {
                    api.set_status(&req.processing_job_name, ProcessingJobStatus::Completed);
                    break;
                }
                tokio::task::yield_now().await;
            }
        };
        let (run, ()) = tokio::join!(waiter, settle);

        let run = run.unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.notebook, "analysis/Quarterly Report.ipynb");
    }
}
