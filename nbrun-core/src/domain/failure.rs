//! Failure classification
//!
//! Reporting tools group failed runs by a short category derived from the
//! run's exit message. The heuristic is pluggable; the tracker never uses it.

use serde::{Deserialize, Serialize};

use crate::domain::run::{RunDescriptor, RunStatus};

/// Category assigned to a run that did not complete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureClass {
    pub category: String,
    pub detail: Option<String>,
}

impl FailureClass {
    fn new(category: impl Into<String>, detail: Option<String>) -> Self {
        Self {
            category: category.into(),
            detail,
        }
    }
}

/// Maps a run to a failure category
pub trait FailureClassifier: Send + Sync {
    /// Returns `None` for runs that did not fail
    fn classify(&self, run: &RunDescriptor) -> Option<FailureClass>;
}

/// Classifies by the last line of the exit message that names an error type
///
/// - stopped runs hit the runtime limit and are `TimedOut`
/// - a dead kernel is `KernelDied`
/// - `SomeError: detail` on the last matching line yields `SomeError`
/// - anything else is `Uncategorized`
#[derive(Debug, Clone)]
pub struct LastLineClassifier {
    markers: Vec<String>,
}

impl LastLineClassifier {
    pub fn new() -> Self {
        Self::with_markers(["Exception:", "Error:", "InvalidArn:", "NotFound:", "InUse:"])
    }

    pub fn with_markers<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            markers: markers.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for LastLineClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl FailureClassifier for LastLineClassifier {
    fn classify(&self, run: &RunDescriptor) -> Option<FailureClass> {
        match run.status {
            RunStatus::Stopped => return Some(FailureClass::new("TimedOut", None)),
            RunStatus::Failed => {}
            _ => return None,
        }

        let Some(message) = run.failure_reason.as_deref() else {
            return Some(FailureClass::new("Uncategorized", None));
        };

        if message.trim() == "Kernel died" {
            return Some(FailureClass::new("KernelDied", None));
        }

        let matched = message
            .lines()
            .rev()
            .find(|line| self.markers.iter().any(|marker| line.contains(marker.as_str())));

        match matched.and_then(|line| line.split_once(':')) {
            Some((category, detail)) => Some(FailureClass::new(
                category.trim(),
                Some(detail.trim().to_string()).filter(|d| !d.is_empty()),
            )),
            None => Some(FailureClass::new("Uncategorized", None)),
        }
    }
}
