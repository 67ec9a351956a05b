//! PostgreSQL job repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};

use cardwall_core::error::{AppError, ErrorKind};
use cardwall_core::result::AppResult;
use cardwall_core::types::pagination::{PageRequest, PageResponse};
use cardwall_core::types::{JobId, UserId};
use cardwall_entity::job::{ErrorEntry, Job, JobKind, JobMutation, JobResult, JobStatus, NewJob};

use crate::store::JobStore;

/// Row shape of the `jobs` table.
#[derive(Debug, FromRow)]
struct JobRow {
    id: JobId,
    owner_id: UserId,
    kind: JobKind,
    project: Option<String>,
    status: JobStatus,
    total: Option<i64>,
    completed: i64,
    errors: Json<Vec<ErrorEntry>>,
    result: Option<Json<JobResult>>,
    temp_file: Option<String>,
    payload: serde_json::Value,
    progress_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl From<JobRow> for Job {
    fn from(row: JobRow) -> Self {
        Self {
            id: row.id,
            owner: row.owner_id,
            kind: row.kind,
            project: row.project,
            status: row.status,
            total: row.total.map(|t| t.max(0) as u64),
            completed: row.completed.max(0) as u64,
            errors: row.errors.0,
            result: row.result.map(|r| r.0),
            temp_file: row.temp_file,
            payload: row.payload,
            progress_message: row.progress_message,
            created_at: row.created_at,
            updated_at: row.updated_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
        }
    }
}

fn db_error(message: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| AppError::with_source(ErrorKind::Database, message, e)
}

/// Job record store backed by the `jobs` table.
#[derive(Debug, Clone)]
pub struct PgJobRepository {
    pool: PgPool,
}

impl PgJobRepository {
    /// Create a new job repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobRepository {
    async fn create(&self, data: NewJob) -> AppResult<Job> {
        let row = sqlx::query_as::<_, JobRow>(
            "INSERT INTO jobs (id, owner_id, kind, project, payload, temp_file) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
        )
        .bind(data.id)
        .bind(data.owner)
        .bind(data.kind)
        .bind(&data.project)
        .bind(&data.payload)
        .bind(&data.temp_file)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Failed to create job"))?;

        tracing::debug!(job_id = %row.id, kind = %row.kind, "Created job");
        Ok(row.into())
    }

    async fn find(&self, id: JobId) -> AppResult<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to find job"))?;
        Ok(row.map(Job::from))
    }

    async fn update(&self, id: JobId, mutations: &[JobMutation]) -> AppResult<Job> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin job update"))?;

        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error("Failed to lock job"))?
            .ok_or_else(|| AppError::not_found(format!("Job {id} not found")))?;

        let mut job = Job::from(row);
        job.apply_all(mutations, Utc::now())?;

        sqlx::query(
            "UPDATE jobs SET status = $2, total = $3, completed = $4, errors = $5, result = $6, \
             progress_message = $7, updated_at = $8, started_at = $9, completed_at = $10 \
             WHERE id = $1",
        )
        .bind(job.id)
        .bind(job.status)
        .bind(job.total.map(|t| t as i64))
        .bind(job.completed as i64)
        .bind(Json(&job.errors))
        .bind(job.result.as_ref().map(Json))
        .bind(&job.progress_message)
        .bind(job.updated_at)
        .bind(job.started_at)
        .bind(job.completed_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to update job"))?;

        tx.commit()
            .await
            .map_err(db_error("Failed to commit job update"))?;

        Ok(job)
    }

    async fn list_by_owner(
        &self,
        owner: UserId,
        page: &PageRequest,
    ) -> AppResult<PageResponse<Job>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE owner_id = $1")
            .bind(owner)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("Failed to count jobs"))?;

        let rows = sqlx::query_as::<_, JobRow>(
            "SELECT * FROM jobs WHERE owner_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(owner)
        .bind(i64::try_from(page.limit()).unwrap_or(i64::MAX))
        .bind(i64::try_from(page.offset()).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list jobs"))?;

        Ok(PageResponse::new(
            rows.into_iter().map(Job::from).collect(),
            page.page,
            page.page_size,
            total as u64,
        ))
    }

    async fn list_by_status(&self, status: JobStatus) -> AppResult<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(
            "SELECT * FROM jobs WHERE status = $1 ORDER BY created_at ASC",
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list jobs by status"))?;
        Ok(rows.into_iter().map(Job::from).collect())
    }

    async fn delete_terminal_before(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(
            "DELETE FROM jobs \
             WHERE status IN ('completed_successfully', 'completed_with_errors', 'failed') \
             AND updated_at < $1 RETURNING *",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to delete expired jobs"))?;
        Ok(rows.into_iter().map(Job::from).collect())
    }
}
