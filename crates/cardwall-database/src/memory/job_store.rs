//! In-memory job record store.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use cardwall_core::error::AppError;
use cardwall_core::result::AppResult;
use cardwall_core::types::pagination::{PageRequest, PageResponse};
use cardwall_core::types::{JobId, UserId};
use cardwall_entity::job::{Job, JobMutation, JobStatus, NewJob};

use crate::store::JobStore;

/// Job store keeping records in a shared concurrent map.
///
/// Each update holds the entry's shard lock while the mutation group is
/// applied, so readers never see a half-applied group. Clones share the
/// same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryJobStore {
    jobs: Arc<DashMap<JobId, Job>>,
}

impl MemoryJobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored jobs.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, data: NewJob) -> AppResult<Job> {
        let job = Job::from_new(data, Utc::now());
        match self.jobs.entry(job.id) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(AppError::conflict(format!("Job {} already exists", job.id)))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(job.clone());
                tracing::debug!(job_id = %job.id, kind = %job.kind, "Created job");
                Ok(job)
            }
        }
    }

    async fn find(&self, id: JobId) -> AppResult<Option<Job>> {
        Ok(self.jobs.get(&id).map(|entry| entry.value().clone()))
    }

    async fn update(&self, id: JobId, mutations: &[JobMutation]) -> AppResult<Job> {
        let mut entry = self
            .jobs
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("Job {id} not found")))?;
        entry.apply_all(mutations, Utc::now())?;
        Ok(entry.value().clone())
    }

    async fn list_by_owner(
        &self,
        owner: UserId,
        page: &PageRequest,
    ) -> AppResult<PageResponse<Job>> {
        let mut jobs: Vec<Job> = self
            .jobs
            .iter()
            .filter(|entry| entry.owner == owner)
            .map(|entry| entry.value().clone())
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = jobs.len() as u64;
        let items = jobs
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(page.limit()).unwrap_or(usize::MAX))
            .collect();
        Ok(PageResponse::new(items, page.page, page.page_size, total))
    }

    async fn list_by_status(&self, status: JobStatus) -> AppResult<Vec<Job>> {
        let mut jobs: Vec<Job> = self
            .jobs
            .iter()
            .filter(|entry| entry.status == status)
            .map(|entry| entry.value().clone())
            .collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(jobs)
    }

    async fn delete_terminal_before(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<Job>> {
        let expired: Vec<JobId> = self
            .jobs
            .iter()
            .filter(|entry| entry.status.is_terminal() && entry.updated_at < cutoff)
            .map(|entry| *entry.key())
            .collect();

        let mut removed = Vec::with_capacity(expired.len());
        for id in expired {
            if let Some((_, job)) = self
                .jobs
                .remove_if(&id, |_, job| job.status.is_terminal() && job.updated_at < cutoff)
            {
                removed.push(job);
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use cardwall_core::error::ErrorKind;
    use cardwall_entity::job::{ErrorEntry, JobKind};

    use super::*;

    fn new_job(owner: UserId) -> NewJob {
        NewJob {
            id: JobId::new(),
            owner,
            kind: JobKind::ExportProject,
            project: Some("alpha".to_string()),
            payload: serde_json::json!({"kind": "export_project", "project": "alpha"}),
            temp_file: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let store = MemoryJobStore::new();
        let job = store.create(new_job(UserId::new())).await.expect("create");

        let found = store.find(job.id).await.expect("find").expect("present");
        assert_eq!(found.status, JobStatus::Queued);
        assert_eq!(found.completed, 0);
        assert!(store.find(JobId::new()).await.expect("find").is_none());
    }

    #[tokio::test]
    async fn test_duplicate_id_conflicts() {
        let store = MemoryJobStore::new();
        let data = new_job(UserId::new());
        store.create(data.clone()).await.expect("create");
        let err = store.create(data).await.expect_err("duplicate");
        assert_eq!(err.kind, ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_update_unknown_job() {
        let store = MemoryJobStore::new();
        let err = store
            .update(JobId::new(), &[JobMutation::Advance { delta: 1 }])
            .await
            .expect_err("missing");
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_rejected_group_leaves_record_unchanged() {
        let store = MemoryJobStore::new();
        let job = store.create(new_job(UserId::new())).await.expect("create");

        let err = store
            .update(
                job.id,
                &[
                    JobMutation::AppendError {
                        entry: ErrorEntry::unit("x", "y"),
                    },
                    JobMutation::Transition {
                        status: JobStatus::Queued,
                    },
                ],
            )
            .await
            .expect_err("regression");
        assert_eq!(err.kind, ErrorKind::InvalidTransition);

        let stored = store.find(job.id).await.expect("find").expect("present");
        assert!(stored.errors.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_advances_are_not_lost() {
        let store = MemoryJobStore::new();
        let job = store.create(new_job(UserId::new())).await.expect("create");
        store
            .update(
                job.id,
                &[
                    JobMutation::Transition {
                        status: JobStatus::Running,
                    },
                    JobMutation::SetTotal { total: 100 },
                ],
            )
            .await
            .expect("start");

        let mut handles = Vec::new();
        for _ in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..10 {
                    store
                        .update(job.id, &[JobMutation::Advance { delta: 1 }])
                        .await
                        .expect("advance");
                }
            }));
        }
        for handle in handles {
            handle.await.expect("join");
        }

        let stored = store.find(job.id).await.expect("find").expect("present");
        assert_eq!(stored.completed, 100);
    }

    #[tokio::test]
    async fn test_list_by_owner_paginates() {
        let store = MemoryJobStore::new();
        let owner = UserId::new();
        for _ in 0..3 {
            store.create(new_job(owner)).await.expect("create");
        }
        store.create(new_job(UserId::new())).await.expect("create");

        let page = store
            .list_by_owner(owner, &PageRequest::new(1, 2))
            .await
            .expect("list");
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total_items, 3);
        assert!(page.has_next);
    }

    #[tokio::test]
    async fn test_delete_terminal_before() {
        let store = MemoryJobStore::new();
        let owner = UserId::new();
        let done = store.create(new_job(owner)).await.expect("create");
        let pending = store.create(new_job(owner)).await.expect("create");
        store
            .update(
                done.id,
                &[JobMutation::Transition {
                    status: JobStatus::CompletedSuccessfully,
                }],
            )
            .await
            .expect("complete");

        let removed = store
            .delete_terminal_before(Utc::now() + chrono::Duration::seconds(1))
            .await
            .expect("sweep");
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id, done.id);
        assert!(store.find(pending.id).await.expect("find").is_some());
        assert_eq!(store.len(), 1);
    }
}
