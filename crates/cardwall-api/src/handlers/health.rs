//! Health check handler.

use axum::Json;
use axum::extract::State;

use cardwall_core::config::ExecutionMode;

use crate::dto::response::{ApiResponse, HealthResponse};
use crate::state::AppState;

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    let execution_mode = match state.config.worker.execution_mode {
        ExecutionMode::Inline => "inline",
        ExecutionMode::Queued => "queued",
    };
    Json(ApiResponse::ok(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        execution_mode: execution_mode.to_string(),
    }))
}
