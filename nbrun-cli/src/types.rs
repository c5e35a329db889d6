//! Common types used across CLI modules

use nbrun_core::domain::run::JobHandle;
use serde_json::Value as JsonValue;

/// Parses a job given either by name or by ARN
pub fn parse_job(input: &str) -> Result<JobHandle, String> {
    let job = JobHandle::from_arn(input.trim());
    if job.as_str().is_empty() {
        return Err("job name cannot be empty".to_string());
    }
    Ok(job)
}

/// Notebook parameter given as `key=value`
///
/// Values that parse as JSON keep their type (`n=3`, `flag=true`,
/// `items=[1,2]`); anything else is passed as a string.
#[derive(Debug, Clone, PartialEq)]
pub struct NotebookParam {
    pub key: String,
    pub value: JsonValue,
}

impl NotebookParam {
    /// Parse a `key=value` argument
    pub fn parse(input: &str) -> Result<Self, String> {
        let Some((key, raw)) = input.split_once('=') else {
            return Err(format!("expected key=value, got '{}'", input));
        };

        let key = key.trim();
        if key.is_empty() {
            return Err(format!("parameter name missing in '{}'", input));
        }

        let value = serde_json::from_str(raw).unwrap_or_else(|_| JsonValue::String(raw.to_string()));

        Ok(Self {
            key: key.to_string(),
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_job_accepts_arn() {
        let job = parse_job("arn:aws:sagemaker:us-west-2:123456789012:processing-job/papermill-a")
            .unwrap();
        assert_eq!(job.as_str(), "papermill-a");
        assert_eq!(parse_job("papermill-b").unwrap().as_str(), "papermill-b");
        assert!(parse_job("  ").is_err());
    }

    #[test]
    fn test_param_values_keep_json_types() {
        assert_eq!(NotebookParam::parse("n=3").unwrap().value, json!(3));
        assert_eq!(NotebookParam::parse("flag=true").unwrap().value, json!(true));
        assert_eq!(NotebookParam::parse("items=[1,2]").unwrap().value, json!([1, 2]));
        assert_eq!(
            NotebookParam::parse("input=s3://bucket/const.txt").unwrap().value,
            json!("s3://bucket/const.txt")
        );
    }

    #[test]
    fn test_param_splits_on_first_equals() {
        let param = NotebookParam::parse("query=a=b").unwrap();
        assert_eq!(param.key, "query");
        assert_eq!(param.value, json!("a=b"));
    }

    #[test]
    fn test_param_requires_key() {
        assert!(NotebookParam::parse("novalue").is_err());
        assert!(NotebookParam::parse("=3").is_err());
    }
}
