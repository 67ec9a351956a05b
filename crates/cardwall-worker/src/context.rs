//! Per-execution handle given to job handlers.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;

use cardwall_core::error::ErrorKind;
use cardwall_core::result::AppResult;
use cardwall_core::types::JobId;
use cardwall_database::JobStore;
use cardwall_entity::job::{ErrorEntry, Job, JobMutation};
use cardwall_storage::TempFileArea;

use crate::handler::JobExecutionError;
use crate::progress::ProgressTracker;

/// What a handler may do with the job it is processing.
#[derive(Debug)]
pub struct JobContext {
    job: Job,
    store: Arc<dyn JobStore>,
    tracker: ProgressTracker,
    files: TempFileArea,
    unit_errors: AtomicUsize,
}

impl JobContext {
    /// Create a context for a claimed job.
    pub fn new(job: Job, store: Arc<dyn JobStore>, files: TempFileArea) -> Self {
        let unit_errors = AtomicUsize::new(job.unit_error_count());
        Self {
            tracker: ProgressTracker::new(store.clone()),
            job,
            store,
            files,
            unit_errors,
        }
    }

    /// The job as it was when claimed.
    pub fn job(&self) -> &Job {
        &self.job
    }

    /// The job's id.
    pub fn job_id(&self) -> JobId {
        self.job.id
    }

    /// Read the uploaded input. A missing or unreadable input is fatal.
    pub async fn read_input(&self) -> Result<Bytes, JobExecutionError> {
        let key = self.job.temp_file.as_deref().ok_or_else(|| {
            JobExecutionError::Fatal("No input was stored for this job".to_string())
        })?;
        self.files.read(key).await.map_err(|e| match e.kind {
            ErrorKind::NotFound => JobExecutionError::Fatal(format!(
                "Uploaded file {} is no longer available",
                TempFileArea::file_name_of(key)
            )),
            _ => JobExecutionError::Fatal(format!(
                "Uploaded file {} could not be read",
                TempFileArea::file_name_of(key)
            )),
        })
    }

    /// Record the number of units to process.
    pub async fn set_total(&self, total: u64) -> AppResult<()> {
        self.tracker.set_total(self.job.id, total).await
    }

    /// Count processed units.
    pub async fn advance(&self, delta: u64) -> AppResult<()> {
        self.tracker.advance(self.job.id, delta).await
    }

    /// Replace the phase label.
    pub async fn set_phase(&self, label: impl Into<String>) -> AppResult<()> {
        self.tracker.set_phase(self.job.id, label).await
    }

    /// Record a failed unit; processing continues.
    pub async fn unit_error(&self, entry: ErrorEntry) -> AppResult<()> {
        tracing::debug!(job_id = %self.job.id, name = %entry.name, "Unit error");
        self.store
            .update(self.job.id, &[JobMutation::AppendError { entry }])
            .await?;
        self.unit_errors.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Unit errors recorded so far.
    pub fn unit_error_count(&self) -> usize {
        self.unit_errors.load(Ordering::SeqCst)
    }

    /// Store a generated file and return its key.
    pub async fn write_artifact(&self, file_name: &str, data: Bytes) -> AppResult<String> {
        self.files.write_artifact(self.job.id, file_name, data).await
    }
}
