//! Request DTOs.

use serde::{Deserialize, Serialize};

use cardwall_service::ErrorResolution;

/// Body of `POST /api/jobs/{id}/errors/resolve`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveErrorsRequest {
    /// Raising cards to attach, by error position.
    pub resolutions: Vec<ErrorResolution>,
}
