//! Request context carrying the user a request acts for.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cardwall_core::types::UserId;

/// Context for the current request.
///
/// Built by the HTTP layer and passed into service methods so that every
/// operation knows *who* is acting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// The acting user's ID.
    pub user_id: UserId,
    /// When the request was received.
    pub request_time: DateTime<Utc>,
}

impl RequestContext {
    /// Creates a new request context.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            request_time: Utc::now(),
        }
    }
}
