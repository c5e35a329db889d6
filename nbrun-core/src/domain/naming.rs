//! Job naming rules
//!
//! Job names double as handles, so they must be unique per submission and
//! satisfy the service's constraints: at most 63 characters from `[-a-zA-Z0-9]`.
//! Names are `<prefix><sanitized notebook stem>-<UTC timestamp>`.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Longest job name the processing service accepts
pub const MAX_JOB_NAME_LEN: usize = 63;

/// Prefix carried by every job this orchestrator submits
pub const DEFAULT_JOB_PREFIX: &str = "papermill-";

/// UTC timestamp appended to job and output notebook names
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

const TIMESTAMP_LEN: usize = 19;

/// Room left for `prefix + stem` once the separator and timestamp are appended
const NAME_BODY_LEN: usize = MAX_JOB_NAME_LEN - 1 - TIMESTAMP_LEN;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NamingError {
    #[error("notebook path '{0}' has no file name")]
    MissingNotebookName(String),

    #[error("job prefix must not be empty")]
    EmptyPrefix,

    #[error("job prefix '{0}' must start with a letter or digit and contain only [-a-zA-Z0-9]")]
    InvalidPrefix(String),

    #[error("job prefix '{prefix}' leaves no room for the notebook name (limit {limit})")]
    PrefixTooLong { prefix: String, limit: usize },
}

/// Checks that a job prefix can be used to build valid names
pub fn validate_prefix(prefix: &str) -> Result<(), NamingError> {
    let Some(first) = prefix.chars().next() else {
        return Err(NamingError::EmptyPrefix);
    };
    if !first.is_ascii_alphanumeric() || !prefix.chars().all(is_name_char) {
        return Err(NamingError::InvalidPrefix(prefix.to_string()));
    }
    if prefix.len() >= NAME_BODY_LEN {
        return Err(NamingError::PrefixTooLong {
            prefix: prefix.to_string(),
            limit: NAME_BODY_LEN - 1,
        });
    }
    Ok(())
}

/// Splits a notebook path into its file stem and extension
///
/// A leading dot belongs to the stem, so `.ipynb` has no extension.
pub fn notebook_stem(notebook: &str) -> Option<(&str, &str)> {
    let base = notebook.rsplit('/').next().unwrap_or(notebook);
    if base.is_empty() {
        return None;
    }
    match base.rfind('.') {
        Some(idx) if base[..idx].chars().any(|c| c != '.') => Some((&base[..idx], &base[idx..])),
        _ => Some((base, "")),
    }
}

/// Replaces every character outside `[-a-zA-Z0-9]` with `-`
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if is_name_char(c) { c } else { '-' })
        .collect()
}

/// Derives the job name for a submission of `notebook` at time `at`
pub fn derive_job_name(
    prefix: &str,
    notebook: &str,
    at: DateTime<Utc>,
) -> Result<String, NamingError> {
    validate_prefix(prefix)?;
    let (stem, _) = notebook_stem(notebook)
        .ok_or_else(|| NamingError::MissingNotebookName(notebook.to_string()))?;

    let mut body = format!("{}{}", prefix, sanitize(stem));
    body.truncate(NAME_BODY_LEN);

    Ok(format!("{}-{}", body, at.format(TIMESTAMP_FORMAT)))
}

/// File name of the output notebook, `<stem>-<timestamp><ext>`
pub fn output_notebook_name(notebook: &str, at: DateTime<Utc>) -> Result<String, NamingError> {
    let (stem, ext) = notebook_stem(notebook)
        .ok_or_else(|| NamingError::MissingNotebookName(notebook.to_string()))?;
    Ok(format!("{}-{}{}", stem, at.format(TIMESTAMP_FORMAT), ext))
}

/// Whether an image or role reference is already fully qualified
pub fn is_qualified(reference: &str) -> bool {
    reference.contains('/')
}

/// Expands a bare role name into a role ARN in `account`
pub fn qualify_role(role: &str, account: &str) -> String {
    if is_qualified(role) {
        role.to_string()
    } else {
        format!("arn:aws:iam::{}:role/{}", account, role)
    }
}

/// Expands a bare image name into a registry URI in `account` and `region`
pub fn qualify_image(image: &str, account: &str, region: &str) -> String {
    if is_qualified(image) {
        image.to_string()
    } else {
        format!("{}.dkr.ecr.{}.amazonaws.com/{}:latest", account, region, image)
    }
}

/// Shortens a private registry URI to `name[:tag]`, dropping a `:latest` tag
///
/// Anything that is not a private registry URI is returned unchanged.
pub fn abbreviate_image(image: &str) -> String {
    let Some((host, path)) = image.split_once('/') else {
        return image.to_string();
    };

    let parts: Vec<&str> = host.split('.').collect();
    let registry_host = matches!(
        parts.as_slice(),
        [account, "dkr", "ecr", region, "amazonaws", "com"]
            if is_account(account) && !region.is_empty()
    );
    if !registry_host || path.contains('/') {
        return image.to_string();
    }

    match path.split_once(':') {
        None if !path.is_empty() => path.to_string(),
        Some((name, tag)) if !name.is_empty() && !tag.is_empty() && !tag.contains(':') => {
            if tag == "latest" {
                name.to_string()
            } else {
                path.to_string()
            }
        }
        _ => image.to_string(),
    }
}

/// Shortens a role ARN to the bare role name
pub fn abbreviate_role(role: &str) -> String {
    let abbreviated = role
        .strip_prefix("arn:aws:iam::")
        .and_then(|rest| rest.split_once(":role/"))
        .filter(|(account, name)| is_account(account) && !name.is_empty() && !name.contains('/'))
        .map(|(_, name)| name.to_string());

    abbreviated.unwrap_or_else(|| role.to_string())
}

fn is_name_char(c: char) -> bool {
    c == '-' || c.is_ascii_alphanumeric()
}

fn is_account(account: &str) -> bool {
    !account.is_empty() && account.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(sec: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, sec).unwrap()
    }

    #[test]
    fn test_short_name() {
        let name = derive_job_name(DEFAULT_JOB_PREFIX, "dir/My Notebook_v2.ipynb", at(7)).unwrap();
        assert_eq!(name, "papermill-My-Notebook-v2-2024-03-09-14-05-07");
    }

    #[test]
    fn test_long_name_fits_limit_and_stays_unique() {
        let notebook = format!("{}.ipynb", "a".repeat(100));
        let first = derive_job_name(DEFAULT_JOB_PREFIX, &notebook, at(7)).unwrap();
        let second = derive_job_name(DEFAULT_JOB_PREFIX, &notebook, at(8)).unwrap();

        assert_eq!(first.len(), MAX_JOB_NAME_LEN);
        assert!(second.len() <= MAX_JOB_NAME_LEN);
        assert_ne!(first, second);
        assert!(first.starts_with("papermill-aaaa"));
        assert!(first.ends_with("-2024-03-09-14-05-07"));
    }

    #[test]
    fn test_non_ascii_is_replaced() {
        let name = derive_job_name(DEFAULT_JOB_PREFIX, "données.ipynb", at(0)).unwrap();
        assert!(name.starts_with("papermill-donn-es-"));
        assert!(name.chars().all(is_name_char));
    }

    #[test]
    fn test_missing_notebook_name() {
        assert_eq!(
            derive_job_name(DEFAULT_JOB_PREFIX, "notebooks/", at(0)),
            Err(NamingError::MissingNotebookName("notebooks/".to_string()))
        );
    }

    #[test]
    fn test_prefix_validation() {
        assert_eq!(validate_prefix(""), Err(NamingError::EmptyPrefix));
        assert!(matches!(
            validate_prefix("nb_run-"),
            Err(NamingError::InvalidPrefix(_))
        ));
        assert!(matches!(
            validate_prefix("-nb"),
            Err(NamingError::InvalidPrefix(_))
        ));
        assert!(matches!(
            validate_prefix(&"p".repeat(43)),
            Err(NamingError::PrefixTooLong { .. })
        ));
        assert!(validate_prefix(&"p".repeat(42)).is_ok());
    }

    #[test]
    fn test_notebook_stem() {
        assert_eq!(notebook_stem("a/b/c.ipynb"), Some(("c", ".ipynb")));
        assert_eq!(notebook_stem("c"), Some(("c", "")));
        assert_eq!(notebook_stem(".ipynb"), Some((".ipynb", "")));
        assert_eq!(notebook_stem("a/"), None);
    }

    #[test]
    fn test_output_notebook_name() {
        assert_eq!(
            output_notebook_name("x/report.ipynb", at(1)).unwrap(),
            "report-2024-03-09-14-05-01.ipynb"
        );
    }

    #[test]
    fn test_qualify_references() {
        assert_eq!(
            qualify_role("Exec", "123456789012"),
            "arn:aws:iam::123456789012:role/Exec"
        );
        assert_eq!(
            qualify_role("arn:aws:iam::1:role/Exec", "123456789012"),
            "arn:aws:iam::1:role/Exec"
        );
        assert_eq!(
            qualify_image("runner", "123456789012", "us-east-1"),
            "123456789012.dkr.ecr.us-east-1.amazonaws.com/runner:latest"
        );
        assert_eq!(
            qualify_image("public.ecr.aws/x/runner:1", "123456789012", "us-east-1"),
            "public.ecr.aws/x/runner:1"
        );
    }

    #[test]
    fn test_abbreviate_image() {
        assert_eq!(
            abbreviate_image("123456789012.dkr.ecr.us-west-2.amazonaws.com/runner:latest"),
            "runner"
        );
        assert_eq!(
            abbreviate_image("123456789012.dkr.ecr.us-west-2.amazonaws.com/runner:v3"),
            "runner:v3"
        );
        assert_eq!(
            abbreviate_image("123456789012.dkr.ecr.us-west-2.amazonaws.com/runner"),
            "runner"
        );
        assert_eq!(abbreviate_image("docker.io/library/python:3"), "docker.io/library/python:3");
    }

    #[test]
    fn test_abbreviate_role() {
        assert_eq!(abbreviate_role("arn:aws:iam::123456789012:role/Exec"), "Exec");
        assert_eq!(
            abbreviate_role("arn:aws:iam::123456789012:role/service/Exec"),
            "arn:aws:iam::123456789012:role/service/Exec"
        );
        assert_eq!(abbreviate_role("Exec"), "Exec");
    }
}
