//! Progress tracking on top of the job record store.

use std::sync::Arc;

use cardwall_core::error::AppError;
use cardwall_core::result::AppResult;
use cardwall_core::types::JobId;
use cardwall_database::JobStore;
use cardwall_entity::job::{JobMutation, ProgressSummary};

/// Translates "N of M units processed" into job record updates.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    store: Arc<dyn JobStore>,
}

impl ProgressTracker {
    /// Create a tracker writing to the given store.
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Record the number of units the job will process.
    ///
    /// May be overwritten until the first unit is processed; afterwards only
    /// the same value is accepted.
    pub async fn set_total(&self, id: JobId, total: u64) -> AppResult<()> {
        self.store
            .update(id, &[JobMutation::SetTotal { total }])
            .await?;
        Ok(())
    }

    /// Count `delta` more processed units, clamped to the total.
    pub async fn advance(&self, id: JobId, delta: u64) -> AppResult<()> {
        if delta == 0 {
            return Ok(());
        }
        self.store
            .update(id, &[JobMutation::Advance { delta }])
            .await?;
        Ok(())
    }

    /// Replace the phase label shown to pollers.
    pub async fn set_phase(&self, id: JobId, label: impl Into<String>) -> AppResult<()> {
        self.store
            .update(
                id,
                &[JobMutation::SetProgressMessage {
                    message: label.into(),
                }],
            )
            .await?;
        Ok(())
    }

    /// Current progress of a job.
    pub async fn summary(&self, id: JobId) -> AppResult<ProgressSummary> {
        self.store
            .find(id)
            .await?
            .map(|job| job.summary())
            .ok_or_else(|| AppError::not_found(format!("Job {id} not found")))
    }
}
