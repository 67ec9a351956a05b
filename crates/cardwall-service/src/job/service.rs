//! Job façade: submit, poll, resolve, list, download.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{info, warn};
use validator::Validate;

use cardwall_core::config::JobsConfig;
use cardwall_core::error::{AppError, ErrorKind};
use cardwall_core::result::AppResult;
use cardwall_core::traits::catalog::CardCatalog;
use cardwall_core::types::JobId;
use cardwall_core::types::pagination::{PageRequest, PageResponse};
use cardwall_database::JobStore;
use cardwall_entity::job::{ErrorEntry, Job, JobKind, JobMutation, JobPayload, JobStatus, NewJob};
use cardwall_storage::TempFileArea;
use cardwall_worker::Executor;

use super::request::{ErrorResolution, SubmitJob, Upload};
use super::view::JobStatusView;
use crate::context::RequestContext;

/// File name used when import text is pasted rather than uploaded.
const PASTED_TEXT_FILE: &str = "cards.txt";

/// Submits jobs and reports on them.
#[derive(Debug, Clone)]
pub struct JobService {
    store: Arc<dyn JobStore>,
    catalog: Arc<dyn CardCatalog>,
    files: TempFileArea,
    executor: Arc<dyn Executor>,
    config: JobsConfig,
    max_upload_size_bytes: u64,
}

impl JobService {
    /// Creates a new job service.
    pub fn new(
        store: Arc<dyn JobStore>,
        catalog: Arc<dyn CardCatalog>,
        files: TempFileArea,
        executor: Arc<dyn Executor>,
        config: JobsConfig,
        max_upload_size_bytes: u64,
    ) -> Self {
        Self {
            store,
            catalog,
            files,
            executor,
            config,
            max_upload_size_bytes,
        }
    }

    /// Validate, record, and dispatch a job.
    ///
    /// Structural problems fail with `Validation` before anything is
    /// stored. With the inline executor the returned job is already
    /// terminal.
    pub async fn submit(&self, ctx: &RequestContext, req: SubmitJob) -> AppResult<Job> {
        req.validate().map_err(|errors| {
            AppError::validation("Invalid job parameters").with_details(
                serde_json::to_value(&errors).unwrap_or(serde_json::Value::Null),
            )
        })?;
        let kind = req
            .kind
            .ok_or_else(|| AppError::validation("Job kind is required"))?;
        let scope = req.project.trim().to_string();

        let input = self.validate_input(kind, &req)?;
        self.validate_scope(kind, &scope).await?;

        let id = JobId::new();
        let payload = match kind {
            JobKind::ImportCards => JobPayload::ImportCards {
                project: scope.clone(),
                file_name: req.upload.as_ref().map(|u| u.file_name.clone()),
            },
            JobKind::ExportProject => JobPayload::ExportProject {
                project: scope.clone(),
            },
            JobKind::ExportProgram => JobPayload::ExportProgram {
                program: scope.clone(),
            },
            JobKind::ImportProgram => JobPayload::ImportProgram {
                program: scope.clone(),
                file_name: input_name(&req),
            },
            JobKind::ImportDependencies => JobPayload::ImportDependencies {
                project: scope.clone(),
                file_name: input_name(&req),
            },
        };

        let payload = serde_json::to_value(&payload)?;
        let temp_file = match input {
            Some((file_name, data)) => Some(self.files.store_input(id, &file_name, data).await?),
            None => None,
        };

        let has_input = temp_file.is_some();
        let created = self
            .store
            .create(NewJob {
                id,
                owner: ctx.user_id,
                kind,
                project: Some(scope),
                payload,
                temp_file,
            })
            .await;
        let job = match created {
            Ok(job) => job,
            Err(e) => {
                if has_input {
                    if let Err(purge) = self.files.purge_job(id).await {
                        warn!(job_id = %id, error = %purge, "Failed to delete input of unrecorded job");
                    }
                }
                return Err(e);
            }
        };

        info!(
            user_id = %ctx.user_id,
            job_id = %job.id,
            kind = %job.kind,
            mode = ?self.executor.mode(),
            "Job submitted"
        );

        if let Err(e) = self.executor.dispatch(&job).await {
            warn!(job_id = %job.id, error = %e, "Failed to dispatch job");
            self.abandon(&job).await;
            return Err(e);
        }

        Ok(self.store.find(job.id).await?.unwrap_or(job))
    }

    /// Current view of a job.
    pub async fn poll(&self, ctx: &RequestContext, id: JobId) -> AppResult<JobStatusView> {
        let job = self.get(ctx, id).await?;
        Ok(JobStatusView::from_job(&job))
    }

    /// Fetch a job owned by the current user.
    pub async fn get(&self, ctx: &RequestContext, id: JobId) -> AppResult<Job> {
        self.store
            .find(id)
            .await?
            .filter(|job| job.owner == ctx.user_id)
            .ok_or_else(|| AppError::not_found(format!("Job {id} not found")))
    }

    /// The current user's jobs, newest first.
    pub async fn list(&self, ctx: &RequestContext, page: PageRequest) -> AppResult<PageResponse<Job>> {
        self.store.list_by_owner(ctx.user_id, &page).await
    }

    /// Attach raising cards to pending dependency errors.
    ///
    /// All resolutions are applied together or not at all. Each raising
    /// card must exist in the catalog.
    pub async fn resolve_errors(
        &self,
        ctx: &RequestContext,
        id: JobId,
        resolutions: Vec<ErrorResolution>,
    ) -> AppResult<Job> {
        if resolutions.is_empty() {
            return Err(AppError::validation("At least one resolution is required"));
        }
        let job = self.get(ctx, id).await?;
        if job.kind != JobKind::ImportDependencies {
            return Err(AppError::validation(format!(
                "Errors of {} jobs cannot be resolved",
                job.kind
            )));
        }

        let mut mutations = Vec::with_capacity(resolutions.len());
        for resolution in resolutions {
            let card = &resolution.raising_card;
            let known = match self.catalog.find_card(&card.project, card.number).await {
                Ok(found) => found.is_some(),
                Err(e) if e.is_input_error() => false,
                Err(e) => return Err(e),
            };
            if !known {
                return Err(AppError::validation(format!("Card {card} not found")));
            }
            mutations.push(JobMutation::ResolveError {
                index: resolution.index,
                raising_card: resolution.raising_card,
            });
        }

        let job = self.store.update(id, &mutations).await?;
        info!(user_id = %ctx.user_id, job_id = %id, resolved = mutations.len(), "Resolved job errors");
        Ok(job)
    }

    /// The generated file of a finished job: `(file name, contents)`.
    pub async fn artifact(&self, ctx: &RequestContext, id: JobId) -> AppResult<(String, Bytes)> {
        let job = self.get(ctx, id).await?;
        let key = job
            .result
            .as_ref()
            .and_then(|result| result.artifact.as_deref())
            .ok_or_else(|| AppError::not_found(format!("Job {id} has no artifact")))?;
        let data = self.files.read(key).await?;
        Ok((TempFileArea::file_name_of(key).to_string(), data))
    }

    fn validate_input(&self, kind: JobKind, req: &SubmitJob) -> AppResult<Option<(String, Bytes)>> {
        if let Some(upload) = &req.upload {
            if kind == JobKind::ExportProject || kind == JobKind::ExportProgram {
                return Err(AppError::validation(format!("{kind} jobs take no file")));
            }
            self.validate_upload(kind, upload)?;
            return Ok(Some((upload.file_name.clone(), upload.data.clone())));
        }

        match kind {
            JobKind::ImportCards => {
                let text = req.text.as_deref().unwrap_or_default();
                if text.trim().is_empty() {
                    return Err(AppError::validation("Import text can't be blank")
                        .with_details(serde_json::json!({ "field": "text" })));
                }
                Ok(Some((PASTED_TEXT_FILE.to_string(), Bytes::from(text.to_string()))))
            }
            JobKind::ImportProgram | JobKind::ImportDependencies => {
                Err(AppError::validation("Please select a file to import")
                    .with_details(serde_json::json!({ "field": "file" })))
            }
            JobKind::ExportProject | JobKind::ExportProgram => Ok(None),
        }
    }

    fn validate_upload(&self, kind: JobKind, upload: &Upload) -> AppResult<()> {
        if upload.data.is_empty() {
            return Err(AppError::validation(format!(
                "{} is empty",
                upload.file_name
            )));
        }
        if upload.data.len() as u64 > self.max_upload_size_bytes {
            return Err(AppError::validation(format!(
                "{} exceeds the maximum upload size of {} bytes",
                upload.file_name, self.max_upload_size_bytes
            )));
        }

        let allowed = self.config.extensions_for(kind.as_str());
        let accepted = upload
            .extension()
            .is_some_and(|ext| allowed.iter().any(|a| a.eq_ignore_ascii_case(&ext)));
        if !accepted {
            return Err(AppError::validation(format!(
                "{} is not a supported file; expected one of: {}",
                upload.file_name,
                allowed.join(", ")
            ))
            .with_details(serde_json::json!({ "field": "file", "allowed": allowed })));
        }
        Ok(())
    }

    async fn validate_scope(&self, kind: JobKind, scope: &str) -> AppResult<()> {
        let exists = match kind {
            JobKind::ImportCards | JobKind::ExportProject | JobKind::ImportDependencies => {
                self.catalog.project_exists(scope).await?
            }
            JobKind::ExportProgram => match self.catalog.program_projects(scope).await {
                Ok(_) => true,
                Err(e) if e.kind == ErrorKind::NotFound => false,
                Err(e) => return Err(e),
            },
            JobKind::ImportProgram => true,
        };
        if !exists {
            return Err(AppError::validation(format!("'{scope}' does not exist"))
                .with_details(serde_json::json!({ "field": "project" })));
        }
        Ok(())
    }

    /// Fail a job whose dispatch failed so it does not linger as queued.
    async fn abandon(&self, job: &Job) {
        let result = self
            .store
            .update(
                job.id,
                &[
                    JobMutation::AppendError {
                        entry: ErrorEntry::fatal("The job could not be started"),
                    },
                    JobMutation::Transition {
                        status: JobStatus::Failed,
                    },
                ],
            )
            .await;
        if let Err(e) = result {
            warn!(job_id = %job.id, error = %e, "Failed to mark undispatched job as failed");
        }
        if let Err(e) = self.files.purge_job(job.id).await {
            warn!(job_id = %job.id, error = %e, "Failed to delete undispatched job input");
        }
    }
}

fn input_name(req: &SubmitJob) -> String {
    req.upload
        .as_ref()
        .map(|u| u.file_name.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use cardwall_core::types::{CardDraft, CardRef, DependencyDraft, UserId};
    use cardwall_database::{MemoryCardCatalog, MemoryJobStore};
    use cardwall_storage::LocalStorageProvider;
    use cardwall_worker::jobs::default_registry;
    use cardwall_worker::queue::QueueReceiver;
    use cardwall_worker::{InlineExecutor, JobProcessor, JobQueue, QueuedExecutor};

    use super::*;

    struct Fixture {
        _dir: tempfile::TempDir,
        store: Arc<MemoryJobStore>,
        catalog: Arc<MemoryCardCatalog>,
        service: JobService,
        _receivers: Vec<(String, QueueReceiver)>,
    }

    async fn fixture(inline: bool) -> Fixture {
        fixture_with_capacity(inline, 16).await
    }

    async fn fixture_with_capacity(inline: bool, capacity: usize) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let provider = LocalStorageProvider::new(dir.path()).await.unwrap();
        let files = TempFileArea::new(Arc::new(provider));
        let store = Arc::new(MemoryJobStore::new());
        let catalog = Arc::new(MemoryCardCatalog::new());
        catalog.add_project("alpha");
        catalog.add_project("beta");

        let mut receivers = Vec::new();
        let executor: Arc<dyn Executor> = if inline {
            let processor = JobProcessor::new(
                store.clone(),
                files.clone(),
                default_registry(catalog.clone()),
            );
            Arc::new(InlineExecutor::new(Arc::new(processor)))
        } else {
            let queue = Arc::new(JobQueue::new(capacity));
            receivers = queue.take_receivers().await.unwrap();
            Arc::new(QueuedExecutor::new(queue))
        };

        let service = JobService::new(
            store.clone(),
            catalog.clone(),
            files,
            executor,
            JobsConfig::default(),
            1024 * 1024,
        );
        Fixture {
            _dir: dir,
            store,
            catalog,
            service,
            _receivers: receivers,
        }
    }

    fn import_text(text: &str) -> SubmitJob {
        SubmitJob {
            kind: Some(JobKind::ImportCards),
            project: "alpha".to_string(),
            text: Some(text.to_string()),
            upload: None,
        }
    }

    #[tokio::test]
    async fn test_submit_creates_one_queued_job() {
        let fx = fixture(false).await;
        let ctx = RequestContext::new(UserId::new());

        let job = fx
            .service
            .submit(&ctx, import_text("Name\nLogin\n"))
            .await
            .unwrap();

        assert_eq!(fx.store.len(), 1);
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.completed, 0);
        assert!(matches!(
            fx.service.poll(&ctx, job.id).await.unwrap(),
            JobStatusView::InProgress { .. }
        ));
    }

    #[tokio::test]
    async fn test_missing_file_creates_no_job() {
        let fx = fixture(false).await;
        let ctx = RequestContext::new(UserId::new());

        let err = fx
            .service
            .submit(
                &ctx,
                SubmitJob {
                    kind: Some(JobKind::ImportProgram),
                    project: "release".to_string(),
                    ..SubmitJob::default()
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(fx.store.is_empty());
    }

    #[tokio::test]
    async fn test_bad_extension_creates_no_job() {
        let fx = fixture(false).await;
        let ctx = RequestContext::new(UserId::new());

        let err = fx
            .service
            .submit(
                &ctx,
                SubmitJob {
                    kind: Some(JobKind::ImportDependencies),
                    project: "alpha".to_string(),
                    text: None,
                    upload: Some(Upload {
                        file_name: "deps.exe".to_string(),
                        data: Bytes::from("[]"),
                    }),
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(fx.store.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_project_and_blank_text_are_rejected() {
        let fx = fixture(false).await;
        let ctx = RequestContext::new(UserId::new());

        let mut request = import_text("Name\nLogin\n");
        request.project = "ghost".to_string();
        assert_eq!(
            fx.service.submit(&ctx, request).await.unwrap_err().kind,
            ErrorKind::Validation
        );
        assert_eq!(
            fx.service.submit(&ctx, import_text("  \n")).await.unwrap_err().kind,
            ErrorKind::Validation
        );
        assert!(fx.store.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_number_reports_errors_without_notice() {
        let fx = fixture(true).await;
        let ctx = RequestContext::new(UserId::new());

        let job = fx
            .service
            .submit(&ctx, import_text("Number\tName\n1\tLogin\n1.456\tLogout\n"))
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::CompletedWithErrors);
        let view = fx.service.poll(&ctx, job.id).await.unwrap();
        let JobStatusView::Report { errors, result, .. } = view else {
            panic!("expected report view");
        };
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].context.as_ref().unwrap()["value"], "1.456");
        assert!(result.unwrap().notice.is_none());
    }

    #[tokio::test]
    async fn test_poll_after_completion_redirects_every_time() {
        let fx = fixture(true).await;
        let ctx = RequestContext::new(UserId::new());

        let job = fx
            .service
            .submit(&ctx, import_text("Name\nLogin\nSignup\n"))
            .await
            .unwrap();

        let first = fx.service.poll(&ctx, job.id).await.unwrap();
        let second = fx.service.poll(&ctx, job.id).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first,
            JobStatusView::Redirect {
                job_id: job.id,
                location: "/projects/alpha/cards".to_string(),
                notice: Some("2 cards imported".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_other_users_cannot_see_job() {
        let fx = fixture(false).await;
        let owner = RequestContext::new(UserId::new());
        let job = fx
            .service
            .submit(&owner, import_text("Name\nLogin\n"))
            .await
            .unwrap();

        let stranger = RequestContext::new(UserId::new());
        let err = fx.service.poll(&stranger, job.id).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_resolve_two_of_three_pending_errors() {
        let fx = fixture(true).await;
        let ctx = RequestContext::new(UserId::new());
        for name in ["first", "second"] {
            fx.catalog
                .create_card(
                    "alpha",
                    &CardDraft {
                        name: name.to_string(),
                        ..CardDraft::default()
                    },
                )
                .await
                .unwrap();
        }

        let drafts: Vec<DependencyDraft> = (1..=3)
            .map(|number| DependencyDraft {
                number,
                name: format!("needs {number}"),
                raising_card: None,
                resolving_project: "beta".to_string(),
                resolving_cards: vec![],
            })
            .collect();
        let job = fx
            .service
            .submit(
                &ctx,
                SubmitJob {
                    kind: Some(JobKind::ImportDependencies),
                    project: "alpha".to_string(),
                    text: None,
                    upload: Some(Upload {
                        file_name: "deps.json".to_string(),
                        data: Bytes::from(serde_json::to_vec(&drafts).unwrap()),
                    }),
                },
            )
            .await
            .unwrap();
        assert_eq!(job.errors.len(), 3);

        let resolved = fx
            .service
            .resolve_errors(
                &ctx,
                job.id,
                vec![
                    ErrorResolution {
                        index: 0,
                        raising_card: CardRef::new("alpha", 1),
                    },
                    ErrorResolution {
                        index: 2,
                        raising_card: CardRef::new("alpha", 2),
                    },
                ],
            )
            .await
            .unwrap();

        let attached = resolved
            .errors
            .iter()
            .filter(|e| e.raising_card.is_some())
            .count();
        assert_eq!(attached, 2);
        assert!(resolved.errors[1].raising_card.is_none());
        assert_eq!(resolved.status, JobStatus::CompletedWithErrors);

        let err = fx
            .service
            .resolve_errors(
                &ctx,
                job.id,
                vec![ErrorResolution {
                    index: 1,
                    raising_card: CardRef::new("alpha", 99),
                }],
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_export_artifact_download() {
        let fx = fixture(true).await;
        let ctx = RequestContext::new(UserId::new());

        let job = fx
            .service
            .submit(
                &ctx,
                SubmitJob {
                    kind: Some(JobKind::ExportProject),
                    project: "alpha".to_string(),
                    ..SubmitJob::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::CompletedSuccessfully);

        let (name, data) = fx.service.artifact(&ctx, job.id).await.unwrap();
        assert_eq!(name, "alpha.json");
        assert!(!data.is_empty());
    }

    #[tokio::test]
    async fn test_full_queue_fails_job_instead_of_waiting() {
        let fx = fixture_with_capacity(false, 1).await;
        let ctx = RequestContext::new(UserId::new());

        let first = fx
            .service
            .submit(&ctx, import_text("Name\nLogin\n"))
            .await
            .unwrap();
        assert_eq!(first.status, JobStatus::Queued);

        let err = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            fx.service.submit(&ctx, import_text("Name\nLogout\n")),
        )
        .await
        .expect("submit must not wait for queue room")
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ServiceUnavailable);

        let page = fx
            .service
            .list(&ctx, PageRequest::new(1, 10))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 2);
        let rejected = page
            .items
            .iter()
            .find(|job| job.id != first.id)
            .unwrap();
        assert_eq!(rejected.status, JobStatus::Failed);
        assert_eq!(
            rejected.fatal_error().unwrap().message,
            "The job could not be started"
        );
    }

    #[derive(Debug)]
    struct RejectingStore;

    #[async_trait::async_trait]
    impl JobStore for RejectingStore {
        async fn create(&self, _data: NewJob) -> AppResult<Job> {
            Err(AppError::database("jobs table unavailable"))
        }

        async fn find(&self, _id: JobId) -> AppResult<Option<Job>> {
            Ok(None)
        }

        async fn update(&self, id: JobId, _mutations: &[JobMutation]) -> AppResult<Job> {
            Err(AppError::not_found(format!("Job {id} not found")))
        }

        async fn list_by_owner(
            &self,
            _owner: UserId,
            page: &PageRequest,
        ) -> AppResult<PageResponse<Job>> {
            Ok(PageResponse::new(Vec::new(), page.page, page.page_size, 0))
        }

        async fn list_by_status(&self, _status: JobStatus) -> AppResult<Vec<Job>> {
            Ok(Vec::new())
        }

        async fn delete_terminal_before(
            &self,
            _cutoff: chrono::DateTime<chrono::Utc>,
        ) -> AppResult<Vec<Job>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_store_failure_removes_uploaded_input() {
        let dir = tempfile::tempdir().unwrap();
        let provider = LocalStorageProvider::new(dir.path()).await.unwrap();
        let files = TempFileArea::new(Arc::new(provider));
        let catalog = Arc::new(MemoryCardCatalog::new());
        catalog.add_project("alpha");
        let queue = Arc::new(JobQueue::new(4));
        let _receivers = queue.take_receivers().await.unwrap();
        let service = JobService::new(
            Arc::new(RejectingStore),
            catalog,
            files,
            Arc::new(QueuedExecutor::new(queue)),
            JobsConfig::default(),
            1024 * 1024,
        );
        let ctx = RequestContext::new(UserId::new());

        let err = service
            .submit(&ctx, import_text("Name\nLogin\n"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Database);

        let jobs_dir = dir.path().join("jobs");
        let leftover = match std::fs::read_dir(&jobs_dir) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        };
        assert_eq!(leftover, 0);
    }
}
