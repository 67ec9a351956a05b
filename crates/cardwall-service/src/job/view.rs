//! What a poller sees of a job.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};

use cardwall_core::types::JobId;
use cardwall_entity::job::{ErrorEntry, Job, JobResult, JobStatus, ProgressSummary};

/// Query-value escape set: unreserved characters pass through.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Result of polling a job.
///
/// Only `InProgress` asks the caller to poll again. Once a job is terminal
/// every poll yields the same final view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatusView {
    /// Still queued or running.
    InProgress {
        /// Job id.
        job_id: JobId,
        /// `queued` or `running`.
        status: JobStatus,
        /// Progress so far.
        progress: ProgressSummary,
        /// Where to poll next.
        poll_url: String,
    },
    /// Finished cleanly; send the caller on.
    Redirect {
        /// Job id.
        job_id: JobId,
        /// Redirect target.
        location: String,
        /// Success notice to flash.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        notice: Option<String>,
    },
    /// Finished; show a result page.
    Report {
        /// Job id.
        job_id: JobId,
        /// Terminal status.
        status: JobStatus,
        /// Errors in recording order.
        errors: Vec<ErrorEntry>,
        /// Result payload. Never carries a notice when errors exist.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<JobResult>,
    },
    /// The job failed as a whole.
    Failed {
        /// Job id.
        job_id: JobId,
        /// The single top-level error.
        error: ErrorEntry,
    },
}

impl JobStatusView {
    /// Build the view for the job's current state.
    pub fn from_job(job: &Job) -> Self {
        match job.status {
            JobStatus::Queued | JobStatus::Running => Self::InProgress {
                job_id: job.id,
                status: job.status,
                progress: job.summary(),
                poll_url: poll_url(job),
            },
            JobStatus::CompletedSuccessfully => match &job.result {
                Some(JobResult {
                    redirect_to: Some(location),
                    notice,
                    ..
                }) => Self::Redirect {
                    job_id: job.id,
                    location: location.clone(),
                    notice: notice.clone(),
                },
                result => Self::Report {
                    job_id: job.id,
                    status: job.status,
                    errors: Vec::new(),
                    result: result.clone(),
                },
            },
            JobStatus::CompletedWithErrors => Self::Report {
                job_id: job.id,
                status: job.status,
                errors: job.errors.clone(),
                result: job.result.clone().map(|result| JobResult {
                    notice: None,
                    ..result
                }),
            },
            JobStatus::Failed => Self::Failed {
                job_id: job.id,
                error: job
                    .fatal_error()
                    .cloned()
                    .unwrap_or_else(|| ErrorEntry::fatal("The job failed")),
            },
        }
    }

    /// Whether the caller should stop polling.
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::InProgress { .. })
    }
}

/// `/api/jobs/progress/<id>`, carrying the project so the caller can keep
/// its navigation context.
pub fn poll_url(job: &Job) -> String {
    match &job.project {
        Some(project) => format!(
            "/api/jobs/progress/{}?project={}",
            job.id,
            utf8_percent_encode(project, QUERY_VALUE)
        ),
        None => format!("/api/jobs/progress/{}", job.id),
    }
}
