//! Job executor.
//!
//! Each job runs as one blocking unit on the tokio blocking pool. When it
//! completes, a [`LifecycleEvent::JobFinished`] carrying the job's request is
//! published on the event bus.

use tokio::task::JoinHandle;
use tracing::{debug, error};

use super::{HasJobStatus, Job, JobProgress};
use crate::error::{ExtensionError, Result};
use crate::event::LifecycleEvent;
use crate::eventbus::EventBus;

/// Handle on a running job.
pub struct JobHandle<O> {
    job_type: &'static str,
    progress: JobProgress,
    join: JoinHandle<Result<O>>,
}

impl<O> JobHandle<O> {
    pub fn job_type(&self) -> &'static str {
        self.job_type
    }

    /// Live progress of the job.
    pub fn progress(&self) -> &JobProgress {
        &self.progress
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the job and return its final status.
    pub async fn wait(self) -> Result<O> {
        self.join
            .await
            .map_err(|e| ExtensionError::JobFailed(e.to_string()))?
    }
}

/// Runs jobs and announces their completion.
#[derive(Clone)]
pub struct JobExecutor {
    bus: EventBus,
}

impl JobExecutor {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Start `job`. Must be called from within a tokio runtime.
    pub fn execute<J: Job>(&self, job: J) -> JobHandle<J::Output> {
        let job_type = job.job_type();
        let request = job.request().clone();
        let progress = job.progress();
        let bus = self.bus.clone();

        debug!(job_type, extensions = request.extensions.len(), "Starting job");

        let join = tokio::spawn(async move {
            let output = tokio::task::spawn_blocking(move || job.run())
                .await
                .map_err(|e| {
                    error!(job_type, error = %e, "Job did not complete");
                    ExtensionError::JobFailed(format!("{}: {}", job_type, e))
                })?;

            let errors = output.job_status().errors.len();
            debug!(job_type, errors, "Job finished");
            bus.publish_with_source(
                LifecycleEvent::JobFinished {
                    job_type: job_type.to_string(),
                    request,
                    errors,
                },
                "job-executor",
            )
            .await;
            Ok(output)
        });

        JobHandle {
            job_type,
            progress,
            join,
        }
    }
}
