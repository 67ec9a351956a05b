//! Response DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cardwall_core::types::JobId;
use cardwall_entity::job::{ErrorEntry, Job, JobKind, JobResult, JobStatus, ProgressSummary};
use cardwall_service::JobStatusView;

/// Standard success response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    /// Whether the request was successful.
    pub success: bool,
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Creates a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// A job record as shown to its owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResponse {
    /// Job id.
    pub id: JobId,
    /// Operation.
    pub kind: JobKind,
    /// Project or program acted on.
    pub project: Option<String>,
    /// Lifecycle status.
    pub status: JobStatus,
    /// Progress summary.
    pub progress: ProgressSummary,
    /// Errors in recording order.
    pub errors: Vec<ErrorEntry>,
    /// Result payload once terminal.
    pub result: Option<JobResult>,
    /// Created at.
    pub created_at: DateTime<Utc>,
    /// Last update.
    pub updated_at: DateTime<Utc>,
    /// When processing started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        let progress = job.summary();
        Self {
            id: job.id,
            kind: job.kind,
            project: job.project,
            status: job.status,
            progress,
            errors: job.errors,
            result: job.result,
            created_at: job.created_at,
            updated_at: job.updated_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
        }
    }
}

/// Response to a job submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmittedJobResponse {
    /// The recorded job.
    pub job: JobResponse,
    /// What a poll would currently show.
    pub view: JobStatusView,
}

/// Liveness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `ok`.
    pub status: String,
    /// Crate version.
    pub version: String,
    /// Seconds since start.
    pub uptime_seconds: u64,
    /// `inline` or `queued`.
    pub execution_mode: String,
}
