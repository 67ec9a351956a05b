//! Job status enumeration and its forward-only ordering.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Status of a background job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created and waiting for the processor.
    Queued,
    /// Claimed by the processor.
    Running,
    /// Finished with no unit errors.
    CompletedSuccessfully,
    /// Finished, but at least one unit could not be applied.
    CompletedWithErrors,
    /// Stopped by a fatal error; no partial result is exposed.
    Failed,
}

impl JobStatus {
    /// Position in the lifecycle. Terminal statuses share the last rank.
    fn rank(&self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Running => 1,
            Self::CompletedSuccessfully | Self::CompletedWithErrors | Self::Failed => 2,
        }
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.rank() == 2
    }

    /// Whether moving from `self` to `next` is a forward step.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }

    /// Return the status as a snake_case string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::CompletedSuccessfully => "completed_successfully",
            Self::CompletedWithErrors => "completed_with_errors",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "running" => Ok(Self::Running),
            "completed_successfully" => Ok(Self::CompletedSuccessfully),
            "completed_with_errors" => Ok(Self::CompletedWithErrors),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown job status '{other}'")),
        }
    }
}
