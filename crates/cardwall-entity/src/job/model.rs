//! Job entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cardwall_core::error::AppError;
use cardwall_core::result::AppResult;
use cardwall_core::types::{JobId, UserId};

use super::error_entry::{ErrorEntry, ErrorSeverity};
use super::kind::JobKind;
use super::mutation::JobMutation;
use super::progress::ProgressSummary;
use super::status::JobStatus;

/// Outcome payload of a finished job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    /// Where the caller should be sent once the job is done.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<String>,
    /// Key of a generated file in the file-holding area.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
    /// Success notice, e.g. "3 cards imported".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

/// A long-running request tracked by the job record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier.
    pub id: JobId,
    /// Submitting user.
    pub owner: UserId,
    /// Operation performed.
    pub kind: JobKind,
    /// Project or program the job acts on.
    pub project: Option<String>,
    /// Current status.
    pub status: JobStatus,
    /// Units expected; unset until the processor knows.
    pub total: Option<u64>,
    /// Units processed.
    pub completed: u64,
    /// Errors in the order they were recorded.
    pub errors: Vec<ErrorEntry>,
    /// Terminal result payload.
    pub result: Option<JobResult>,
    /// Key of the owned input in the file-holding area.
    pub temp_file: Option<String>,
    /// Serialized [`JobPayload`](super::payload::JobPayload).
    pub payload: serde_json::Value,
    /// Last phase label set by the processor.
    pub progress_message: Option<String>,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
    /// When the job was last updated.
    pub updated_at: DateTime<Utc>,
    /// When the processor claimed the job.
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
}

/// Data required to create a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewJob {
    /// Pre-allocated id, so inputs can be stored under it before creation.
    pub id: JobId,
    /// Submitting user.
    pub owner: UserId,
    /// Operation performed.
    pub kind: JobKind,
    /// Project or program the job acts on.
    pub project: Option<String>,
    /// Serialized payload.
    pub payload: serde_json::Value,
    /// Key of the stored input.
    pub temp_file: Option<String>,
}

impl Job {
    /// Build a queued job from creation data.
    pub fn from_new(data: NewJob, now: DateTime<Utc>) -> Self {
        Self {
            id: data.id,
            owner: data.owner,
            kind: data.kind,
            project: data.project,
            status: JobStatus::Queued,
            total: None,
            completed: 0,
            errors: Vec::new(),
            result: None,
            temp_file: data.temp_file,
            payload: data.payload,
            progress_message: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    /// Number of unit errors recorded.
    pub fn unit_error_count(&self) -> usize {
        self.errors.iter().filter(|e| e.is_unit()).count()
    }

    /// The fatal error of a failed job.
    pub fn fatal_error(&self) -> Option<&ErrorEntry> {
        self.errors
            .iter()
            .rev()
            .find(|e| e.severity == ErrorSeverity::Fatal)
    }

    /// Apply a group of mutations all-or-nothing.
    ///
    /// On error `self` is left untouched.
    pub fn apply_all(&mut self, mutations: &[JobMutation], now: DateTime<Utc>) -> AppResult<()> {
        let mut next = self.clone();
        for mutation in mutations {
            next.apply(mutation, now)?;
        }
        next.updated_at = now;
        *self = next;
        Ok(())
    }

    fn apply(&mut self, mutation: &JobMutation, now: DateTime<Utc>) -> AppResult<()> {
        match mutation {
            JobMutation::Transition { status } => self.transition(*status, now),
            JobMutation::SetTotal { total } => {
                self.ensure_active("set total")?;
                if self.completed > 0 {
                    if self.total == Some(*total) {
                        return Ok(());
                    }
                    return Err(AppError::invalid_transition(format!(
                        "Job {} already processed {} units; total cannot change to {}",
                        self.id, self.completed, total
                    )));
                }
                self.total = Some(*total);
                Ok(())
            }
            JobMutation::Advance { delta } => {
                self.ensure_active("advance")?;
                let wanted = self.completed.saturating_add(*delta);
                self.completed = match self.total {
                    Some(total) if wanted > total => {
                        tracing::warn!(
                            job_id = %self.id,
                            completed = self.completed,
                            delta,
                            total,
                            "Progress would exceed total; clamping"
                        );
                        total
                    }
                    _ => wanted,
                };
                Ok(())
            }
            JobMutation::AppendError { entry } => {
                self.ensure_active("append error")?;
                self.errors.push(entry.clone());
                Ok(())
            }
            JobMutation::ResolveError {
                index,
                raising_card,
            } => {
                let entry = self.errors.get_mut(*index).ok_or_else(|| {
                    AppError::validation(format!("Job has no error at position {index}"))
                })?;
                if !entry.is_resolvable() {
                    return Err(AppError::validation(format!(
                        "Error at position {index} ('{}') does not take a raising card",
                        entry.name
                    )));
                }
                entry.raising_card = Some(raising_card.clone());
                Ok(())
            }
            JobMutation::SetResult { result } => {
                self.ensure_active("set result")?;
                self.result = Some(result.clone());
                Ok(())
            }
            JobMutation::SetProgressMessage { message } => {
                self.ensure_active("set progress message")?;
                self.progress_message = Some(message.clone());
                Ok(())
            }
        }
    }

    fn transition(&mut self, next: JobStatus, now: DateTime<Utc>) -> AppResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::invalid_transition(format!(
                "Job {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        let unit_errors = self.unit_error_count();
        match next {
            JobStatus::CompletedSuccessfully if unit_errors > 0 => {
                return Err(AppError::invalid_transition(format!(
                    "Job {} has {unit_errors} unit errors and cannot complete successfully",
                    self.id
                )));
            }
            JobStatus::CompletedWithErrors if unit_errors == 0 => {
                return Err(AppError::invalid_transition(format!(
                    "Job {} has no unit errors to complete with",
                    self.id
                )));
            }
            _ => {}
        }
        if next == JobStatus::Running {
            self.started_at = Some(now);
        }
        if next.is_terminal() {
            self.completed_at = Some(now);
        }
        self.status = next;
        Ok(())
    }

    fn ensure_active(&self, action: &str) -> AppResult<()> {
        if self.status.is_terminal() {
            return Err(AppError::invalid_transition(format!(
                "Cannot {action} on job {} in terminal status {}",
                self.id, self.status
            )));
        }
        Ok(())
    }

    /// Progress projection for pollers.
    pub fn summary(&self) -> ProgressSummary {
        let percent = match (self.status, self.total) {
            (JobStatus::CompletedSuccessfully | JobStatus::CompletedWithErrors, _) => 100,
            (_, Some(0)) => 0,
            (_, Some(total)) => ((self.completed.min(total) * 100) / total) as u8,
            (_, None) => 0,
        };
        let label = match self.status {
            JobStatus::Queued => "Waiting to start".to_string(),
            JobStatus::Running => match (&self.progress_message, self.total) {
                (Some(message), _) => message.clone(),
                (None, None) => "Preparing".to_string(),
                (None, Some(_)) => self.kind.working_label().to_string(),
            },
            JobStatus::CompletedSuccessfully | JobStatus::CompletedWithErrors => {
                "Completed".to_string()
            }
            JobStatus::Failed => "Failed".to_string(),
        };
        ProgressSummary {
            completed: self.completed,
            total: self.total,
            percent,
            label,
        }
    }
}

#[cfg(test)]
mod tests {
    use cardwall_core::error::ErrorKind;
    use cardwall_core::types::CardRef;

    use super::*;
    use crate::job::error_entry::PENDING_RAISING_CARD;

    fn queued_job() -> Job {
        Job::from_new(
            NewJob {
                id: JobId::new(),
                owner: UserId::new(),
                kind: JobKind::ImportCards,
                project: Some("alpha".to_string()),
                payload: serde_json::json!({}),
                temp_file: None,
            },
            Utc::now(),
        )
    }

    fn running_job() -> Job {
        let mut job = queued_job();
        job.apply_all(
            &[JobMutation::Transition {
                status: JobStatus::Running,
            }],
            Utc::now(),
        )
        .expect("start");
        job
    }

    #[test]
    fn test_new_job_is_queued_and_empty() {
        let job = queued_job();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.completed, 0);
        assert_eq!(job.total, None);
        assert!(job.errors.is_empty());
    }

    #[test]
    fn test_advance_clamps_to_total() {
        let mut job = running_job();
        job.apply_all(
            &[
                JobMutation::SetTotal { total: 3 },
                JobMutation::Advance { delta: 2 },
                JobMutation::Advance { delta: 5 },
            ],
            Utc::now(),
        )
        .expect("apply");
        assert_eq!(job.completed, 3);
        assert_eq!(job.summary().percent, 100);
    }

    #[test]
    fn test_set_total_after_progress_only_accepts_same_value() {
        let mut job = running_job();
        job.apply_all(
            &[
                JobMutation::SetTotal { total: 4 },
                JobMutation::Advance { delta: 1 },
            ],
            Utc::now(),
        )
        .expect("apply");

        job.apply_all(&[JobMutation::SetTotal { total: 4 }], Utc::now())
            .expect("same total is a no-op");
        let err = job
            .apply_all(&[JobMutation::SetTotal { total: 9 }], Utc::now())
            .expect_err("different total rejected");
        assert_eq!(err.kind, ErrorKind::InvalidTransition);
        assert_eq!(job.total, Some(4));
    }

    #[test]
    fn test_set_total_may_be_overwritten_before_progress() {
        let mut job = running_job();
        job.apply_all(
            &[
                JobMutation::SetTotal { total: 10 },
                JobMutation::SetTotal { total: 12 },
            ],
            Utc::now(),
        )
        .expect("overwrite");
        assert_eq!(job.total, Some(12));
    }

    #[test]
    fn test_apply_all_is_atomic() {
        let mut job = running_job();
        let before = job.clone();
        let err = job
            .apply_all(
                &[
                    JobMutation::Advance { delta: 1 },
                    JobMutation::Transition {
                        status: JobStatus::Queued,
                    },
                ],
                Utc::now(),
            )
            .expect_err("regression rejected");
        assert_eq!(err.kind, ErrorKind::InvalidTransition);
        assert_eq!(job, before);
    }

    #[test]
    fn test_terminal_status_matches_unit_errors() {
        let mut job = running_job();
        let err = job
            .apply_all(
                &[JobMutation::Transition {
                    status: JobStatus::CompletedWithErrors,
                }],
                Utc::now(),
            )
            .expect_err("no errors to complete with");
        assert_eq!(err.kind, ErrorKind::InvalidTransition);

        job.apply_all(
            &[
                JobMutation::AppendError {
                    entry: ErrorEntry::unit("blank_name", "Row 1: Name can't be blank."),
                },
                JobMutation::Transition {
                    status: JobStatus::CompletedWithErrors,
                },
            ],
            Utc::now(),
        )
        .expect("complete with errors");
        assert!(job.completed_at.is_some());
        assert_eq!(job.summary().label, "Completed");
    }

    #[test]
    fn test_terminal_job_rejects_progress() {
        let mut job = running_job();
        job.apply_all(
            &[JobMutation::Transition {
                status: JobStatus::CompletedSuccessfully,
            }],
            Utc::now(),
        )
        .expect("complete");
        let err = job
            .apply_all(&[JobMutation::Advance { delta: 1 }], Utc::now())
            .expect_err("terminal");
        assert_eq!(err.kind, ErrorKind::InvalidTransition);
    }

    #[test]
    fn test_resolve_error_after_completion() {
        let mut job = running_job();
        let pending = ErrorEntry::unit(PENDING_RAISING_CARD, "Dependency #4 has no raising card");
        job.apply_all(
            &[
                JobMutation::AppendError {
                    entry: pending.clone(),
                },
                JobMutation::AppendError {
                    entry: ErrorEntry::unit("duplicate_name", "dup"),
                },
                JobMutation::Transition {
                    status: JobStatus::CompletedWithErrors,
                },
            ],
            Utc::now(),
        )
        .expect("complete");

        job.apply_all(
            &[JobMutation::ResolveError {
                index: 0,
                raising_card: CardRef::new("alpha", 12),
            }],
            Utc::now(),
        )
        .expect("resolve");
        assert_eq!(job.errors[0].raising_card, Some(CardRef::new("alpha", 12)));

        let err = job
            .apply_all(
                &[JobMutation::ResolveError {
                    index: 1,
                    raising_card: CardRef::new("alpha", 1),
                }],
                Utc::now(),
            )
            .expect_err("not resolvable");
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[test]
    fn test_summary_labels() {
        let mut job = queued_job();
        assert_eq!(job.summary().label, "Waiting to start");
        job.apply_all(
            &[JobMutation::Transition {
                status: JobStatus::Running,
            }],
            Utc::now(),
        )
        .expect("start");
        assert_eq!(job.summary().label, "Preparing");
        job.apply_all(
            &[
                JobMutation::SetTotal { total: 4 },
                JobMutation::Advance { delta: 1 },
            ],
            Utc::now(),
        )
        .expect("progress");
        let summary = job.summary();
        assert_eq!(summary.label, "Importing cards");
        assert_eq!(summary.percent, 25);
    }
}
