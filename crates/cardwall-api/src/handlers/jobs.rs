//! Job handlers: submission, polling, resolution and download.

use axum::Json;
use axum::body::Body;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::Response;
use bytes::Bytes;
use uuid::Uuid;

use cardwall_core::error::AppError;
use cardwall_core::types::JobId;
use cardwall_core::types::pagination::PageResponse;
use cardwall_entity::job::JobKind;
use cardwall_service::{JobStatusView, SubmitJob, Upload};

use crate::dto::request::ResolveErrorsRequest;
use crate::dto::response::{ApiResponse, JobResponse, SubmittedJobResponse};
use crate::error::ApiError;
use crate::extractors::{CurrentUser, PaginationParams};
use crate::state::AppState;

type Submitted = (StatusCode, Json<ApiResponse<SubmittedJobResponse>>);

async fn submit(state: &AppState, user: &CurrentUser, req: SubmitJob) -> Result<Submitted, ApiError> {
    let job = state.job_service.submit(user, req).await?;
    let view = JobStatusView::from_job(&job);
    // Inline jobs are already finished when they come back.
    let status = if view.is_final() {
        StatusCode::OK
    } else {
        StatusCode::ACCEPTED
    };
    Ok((
        status,
        Json(ApiResponse::ok(SubmittedJobResponse {
            job: job.into(),
            view,
        })),
    ))
}

/// POST /api/jobs
pub async fn submit_job(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<SubmitJob>,
) -> Result<Submitted, ApiError> {
    submit(&state, &user, req).await
}

/// POST /api/jobs/upload
///
/// Multipart fields: `kind`, `project`, optional `text`, optional `file`.
pub async fn upload_job(
    State(state): State<AppState>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> Result<Submitted, ApiError> {
    let mut req = SubmitJob::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::validation(format!("Multipart error: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "kind" => {
                let text = read_text(field).await?;
                let kind = text
                    .trim()
                    .parse::<JobKind>()
                    .map_err(AppError::validation)?;
                req.kind = Some(kind);
            }
            "project" => req.project = read_text(field).await?,
            "text" => req.text = Some(read_text(field).await?),
            "file" => {
                let file_name = field.file_name().unwrap_or("").to_string();
                let data: Bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::validation(format!("Read error: {e}")))?;
                // Browsers send an empty part when no file was chosen.
                if !file_name.is_empty() || !data.is_empty() {
                    req.upload = Some(Upload { file_name, data });
                }
            }
            _ => {}
        }
    }

    submit(&state, &user, req).await
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::validation(format!("Read error: {e}")))
}

/// GET /api/jobs/progress/{id}
///
/// The `project` query parameter is navigation context for the caller and
/// is not needed to find the job.
pub async fn poll_job(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<JobStatusView>>, ApiError> {
    let view = state
        .job_service
        .poll(&user, JobId::from_uuid(id))
        .await?;
    Ok(Json(ApiResponse::ok(view)))
}

/// GET /api/jobs
pub async fn list_jobs(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(params): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PageResponse<JobResponse>>>, ApiError> {
    let page = state
        .job_service
        .list(&user, params.into_page_request())
        .await?;
    let items = page.items.into_iter().map(JobResponse::from).collect();
    Ok(Json(ApiResponse::ok(PageResponse::new(
        items,
        page.page,
        page.page_size,
        page.total_items,
    ))))
}

/// GET /api/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<JobResponse>>, ApiError> {
    let job = state.job_service.get(&user, JobId::from_uuid(id)).await?;
    Ok(Json(ApiResponse::ok(job.into())))
}

/// POST /api/jobs/{id}/errors/resolve
pub async fn resolve_errors(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ResolveErrorsRequest>,
) -> Result<Json<ApiResponse<JobResponse>>, ApiError> {
    let job = state
        .job_service
        .resolve_errors(&user, JobId::from_uuid(id), req.resolutions)
        .await?;
    Ok(Json(ApiResponse::ok(job.into())))
}

/// GET /api/jobs/{id}/artifact
pub async fn download_artifact(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let (file_name, data) = state
        .job_service
        .artifact(&user, JobId::from_uuid(id))
        .await?;

    let content_type = if file_name.ends_with(".json") {
        "application/json"
    } else {
        "application/octet-stream"
    };

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{file_name}\""),
        )
        .header(header::CONTENT_LENGTH, data.len())
        .body(Body::from(data))
        .map_err(|e| AppError::internal(format!("Response build failed: {e}")))?;

    Ok(response)
}
