//! The job record store contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use cardwall_core::result::AppResult;
use cardwall_core::types::pagination::{PageRequest, PageResponse};
use cardwall_core::types::{JobId, UserId};
use cardwall_entity::job::{Job, JobMutation, JobStatus, NewJob};

/// Durable, single source of truth for job records.
///
/// `update` must apply its mutations atomically: a concurrent `find` sees
/// either none or all of them.
#[async_trait]
pub trait JobStore: Send + Sync + std::fmt::Debug + 'static {
    /// Create a queued job.
    async fn create(&self, data: NewJob) -> AppResult<Job>;

    /// Find a job by id.
    async fn find(&self, id: JobId) -> AppResult<Option<Job>>;

    /// Apply a group of mutations and return the updated job.
    ///
    /// Fails with `NotFound` for unknown ids and `InvalidTransition` when a
    /// mutation breaks the forward-only rules; nothing is written then.
    async fn update(&self, id: JobId, mutations: &[JobMutation]) -> AppResult<Job>;

    /// List a user's jobs, newest first.
    async fn list_by_owner(&self, owner: UserId, page: &PageRequest)
    -> AppResult<PageResponse<Job>>;

    /// List all jobs currently in a status, oldest first.
    async fn list_by_status(&self, status: JobStatus) -> AppResult<Vec<Job>>;

    /// Delete terminal jobs last updated before `cutoff`, returning them.
    async fn delete_terminal_before(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<Job>>;
}
