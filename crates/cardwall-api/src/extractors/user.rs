//! `CurrentUser` extractor: resolves the acting user from a request header.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use cardwall_core::error::AppError;
use cardwall_core::types::UserId;
use cardwall_service::RequestContext;

use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the acting user's id, set by the fronting application.
pub const USER_HEADER: &str = "x-cardwall-user";

/// The user a request acts for.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub RequestContext);

impl std::ops::Deref for CurrentUser {
    type Target = RequestContext;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::unauthorized(format!("Missing {USER_HEADER} header")))?;

        let user_id: UserId = raw
            .trim()
            .parse()
            .map_err(|_| AppError::unauthorized(format!("Invalid {USER_HEADER} header")))?;

        Ok(CurrentUser(RequestContext::new(user_id)))
    }
}
