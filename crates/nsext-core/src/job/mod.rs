//! Extension jobs.
//!
//! A job is one long running unit of work built from an [`ExtensionRequest`].
//! Jobs run synchronously on a blocking thread (see [`executor`]); within a
//! job, recursion over dependencies and documents is depth first.
//!
//! | Job type     | Job                      | Output                      |
//! |--------------|--------------------------|-----------------------------|
//! | `repairxar`  | [`repair::RepairJob`]    | installed repository state  |
//! | `diffXar`    | [`diff::DiffJob`]        | [`diff::DiffJobStatus`]     |
//! | `install`    | [`install::InstallJob`]  | installed state + handlers  |
//! | `uninstall`  | [`install::UninstallJob`]| installed state + handlers  |

pub mod diff;
pub mod executor;
pub mod install;
pub mod progress;
pub mod repair;

pub use diff::{DiffJob, DiffJobStatus};
pub use executor::{JobExecutor, JobHandle};
pub use install::{InstallJob, UninstallJob};
pub use progress::{JobProgress, LevelGuard};
pub use repair::RepairJob;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::ExtensionRequest;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    #[default]
    Waiting,
    Running,
    Finished,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waiting => write!(f, "Waiting"),
            Self::Running => write!(f, "Running"),
            Self::Finished => write!(f, "Finished"),
        }
    }
}

/// Status owned by the job that created it.
#[derive(Debug, Clone)]
pub struct JobStatus {
    pub id: Uuid,
    pub job_type: String,
    pub request: ExtensionRequest,
    pub state: JobState,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// Logged failures, in the order they happened
    pub errors: Vec<String>,
    pub progress: JobProgress,
}

impl JobStatus {
    pub fn new(job_type: impl Into<String>, request: ExtensionRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_type: job_type.into(),
            request,
            state: JobState::Waiting,
            start_date: None,
            end_date: None,
            errors: Vec::new(),
            progress: JobProgress::new(),
        }
    }

    pub fn start(&mut self) {
        self.state = JobState::Running;
        self.start_date = Some(Utc::now());
    }

    pub fn finish(&mut self) {
        self.state = JobState::Finished;
        self.end_date = Some(Utc::now());
        self.progress.finish();
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Access to the common status of any job output.
pub trait HasJobStatus {
    fn job_status(&self) -> &JobStatus;
}

impl HasJobStatus for JobStatus {
    fn job_status(&self) -> &JobStatus {
        self
    }
}

/// A unit of work driven by an [`ExtensionRequest`].
pub trait Job: Send + 'static {
    /// Final status produced by [`Job::run`].
    type Output: HasJobStatus + Send + 'static;

    fn job_type(&self) -> &'static str;

    fn request(&self) -> &ExtensionRequest;

    /// Progress handle, observable while the job runs.
    fn progress(&self) -> JobProgress;

    /// Run the job to completion. Failures are logged and collected in the
    /// status rather than returned.
    fn run(self) -> Self::Output;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_lifecycle() {
        let mut status = JobStatus::new("repairxar", ExtensionRequest::default());
        assert_eq!(status.state, JobState::Waiting);

        status.start();
        assert_eq!(status.state, JobState::Running);
        assert!(status.start_date.is_some());

        status.record_error("boom");
        status.finish();
        assert_eq!(status.state, JobState::Finished);
        assert!(status.has_errors());
        assert!(status.progress.is_finished());
    }

    #[test]
    fn test_job_state_display() {
        assert_eq!(JobState::Running.to_string(), "Running");
        assert_eq!(
            serde_json::to_string(&JobState::Finished).unwrap(),
            "\"finished\""
        );
    }
}
