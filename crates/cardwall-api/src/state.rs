//! Application state shared across all handlers and middleware.

use std::sync::Arc;
use std::time::Instant;

use cardwall_core::config::AppConfig;
use cardwall_service::JobService;

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,
    /// Job façade
    pub job_service: Arc<JobService>,
    /// Process start, for uptime reporting
    pub started_at: Instant,
}

impl AppState {
    /// Creates the state for a freshly started server.
    pub fn new(config: Arc<AppConfig>, job_service: Arc<JobService>) -> Self {
        Self {
            config,
            job_service,
            started_at: Instant::now(),
        }
    }
}
