//! Job processor: drives one job from `queued` to a terminal status.

use std::sync::Arc;

use cardwall_core::error::ErrorKind;
use cardwall_core::result::AppResult;
use cardwall_core::types::JobId;
use cardwall_database::JobStore;
use cardwall_entity::job::{ErrorEntry, Job, JobMutation, JobPayload, JobResult, JobStatus};
use cardwall_storage::TempFileArea;

use crate::context::JobContext;
use crate::handler::{HandlerRegistry, JobExecutionError};

/// Fatal message for jobs found `running` at startup.
pub const INTERRUPTED_MESSAGE: &str = "Processing was interrupted";

/// Runs jobs through their handlers and records the outcome.
#[derive(Debug, Clone)]
pub struct JobProcessor {
    store: Arc<dyn JobStore>,
    files: TempFileArea,
    handlers: Arc<HandlerRegistry>,
}

impl JobProcessor {
    /// Create a processor.
    pub fn new(store: Arc<dyn JobStore>, files: TempFileArea, handlers: HandlerRegistry) -> Self {
        Self {
            store,
            files,
            handlers: Arc::new(handlers),
        }
    }

    /// Process a queued job to completion.
    ///
    /// Only the first call for a job does any work: later calls find it no
    /// longer queued and return. Handler failures end up in the job record;
    /// the returned error is reserved for store failures.
    pub async fn process(&self, job_id: JobId) -> AppResult<()> {
        let job = match self
            .store
            .update(
                job_id,
                &[JobMutation::Transition {
                    status: JobStatus::Running,
                }],
            )
            .await
        {
            Ok(job) => job,
            Err(e) if e.kind == ErrorKind::InvalidTransition => {
                tracing::info!(job_id = %job_id, "Job already claimed, skipping");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        tracing::info!(job_id = %job.id, kind = %job.kind, owner = %job.owner, "Processing job");

        let outcome = self.run_handler(&job).await;
        let result = self.finish(&job, outcome).await;
        self.release_input(&job).await;
        result
    }

    /// Fail every job left `running` by a previous process.
    ///
    /// Nothing resumes such a job, so it gets one fatal entry and its input
    /// is released. Returns how many jobs were failed.
    pub async fn recover_interrupted(&self) -> AppResult<usize> {
        let interrupted = self.store.list_by_status(JobStatus::Running).await?;
        let mut failed = 0;
        for job in interrupted {
            match self.fail(job.id, INTERRUPTED_MESSAGE.to_string()).await {
                Ok(()) => failed += 1,
                // Finished between the listing and the update.
                Err(e) if e.kind == ErrorKind::InvalidTransition => continue,
                Err(e) => return Err(e),
            }
            tracing::warn!(job_id = %job.id, kind = %job.kind, "Failed interrupted job");
            self.release_input(&job).await;
        }
        Ok(failed)
    }

    async fn run_handler(&self, job: &Job) -> Result<JobResult, JobExecutionError> {
        let payload: JobPayload = serde_json::from_value(job.payload.clone()).map_err(|e| {
            JobExecutionError::Fatal(format!("Job parameters could not be read: {e}"))
        })?;
        let handler = self.handlers.get(job.kind).ok_or_else(|| {
            JobExecutionError::Fatal(format!("No handler registered for job kind '{}'", job.kind))
        })?;

        let ctx = JobContext::new(job.clone(), self.store.clone(), self.files.clone());
        handler.execute(&ctx, &payload).await
    }

    async fn finish(
        &self,
        job: &Job,
        outcome: Result<JobResult, JobExecutionError>,
    ) -> AppResult<()> {
        match outcome {
            Ok(result) => {
                let current = self.store.find(job.id).await?.unwrap_or_else(|| job.clone());
                let unit_errors = current.unit_error_count();
                let status = if unit_errors == 0 {
                    JobStatus::CompletedSuccessfully
                } else {
                    JobStatus::CompletedWithErrors
                };
                let completed = self
                    .store
                    .update(
                        job.id,
                        &[
                            JobMutation::SetResult { result },
                            JobMutation::Transition { status },
                        ],
                    )
                    .await;
                match completed {
                    Ok(job) => {
                        tracing::info!(
                            job_id = %job.id,
                            status = %job.status,
                            completed = job.completed,
                            unit_errors,
                            "Job completed"
                        );
                        Ok(())
                    }
                    Err(e) => {
                        tracing::error!(job_id = %job.id, error = %e, "Failed to record job completion");
                        self.fail(job.id, "The job result could not be recorded".to_string())
                            .await
                    }
                }
            }
            Err(JobExecutionError::Internal(err)) => {
                tracing::error!(job_id = %job.id, error = %err, "Job failed with an internal error");
                let message = JobExecutionError::Internal(err).fatal_message();
                self.fail(job.id, message).await
            }
            Err(JobExecutionError::Fatal(message)) => {
                tracing::warn!(job_id = %job.id, error = %message, "Job failed");
                self.fail(job.id, message).await
            }
        }
    }

    async fn fail(&self, id: JobId, message: String) -> AppResult<()> {
        self.store
            .update(
                id,
                &[
                    JobMutation::AppendError {
                        entry: ErrorEntry::fatal(message),
                    },
                    JobMutation::Transition {
                        status: JobStatus::Failed,
                    },
                ],
            )
            .await?;
        Ok(())
    }

    async fn release_input(&self, job: &Job) {
        if let Some(key) = &job.temp_file {
            if let Err(e) = self.files.delete(key).await {
                tracing::warn!(job_id = %job.id, key = %key, error = %e, "Failed to delete job input");
            }
        }
    }
}
