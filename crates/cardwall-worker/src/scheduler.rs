//! Cron scheduler for the job retention sweep.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio_cron_scheduler::{Job as CronJob, JobScheduler};

use cardwall_core::config::JobsConfig;
use cardwall_core::error::AppError;
use cardwall_core::result::AppResult;
use cardwall_database::JobStore;
use cardwall_storage::TempFileArea;

/// Cron-based scheduler for periodic maintenance
pub struct CronScheduler {
    scheduler: JobScheduler,
    store: Arc<dyn JobStore>,
    files: TempFileArea,
    config: JobsConfig,
}

impl std::fmt::Debug for CronScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronScheduler")
            .field("cleanup_cron", &self.config.cleanup_cron)
            .finish()
    }
}

impl CronScheduler {
    /// Create a new cron scheduler
    pub async fn new(
        store: Arc<dyn JobStore>,
        files: TempFileArea,
        config: JobsConfig,
    ) -> AppResult<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {e}")))?;

        Ok(Self {
            scheduler,
            store,
            files,
            config,
        })
    }

    /// Register all scheduled tasks
    pub async fn register_default_tasks(&self) -> AppResult<()> {
        self.register_retention_sweep().await?;
        tracing::info!("All scheduled tasks registered");
        Ok(())
    }

    /// Start the scheduler
    pub async fn start(&self) -> AppResult<()> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {e}")))?;

        tracing::info!("Cron scheduler started");
        Ok(())
    }

    /// Shutdown the scheduler
    pub async fn shutdown(&mut self) -> AppResult<()> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shutdown scheduler: {e}")))?;

        tracing::info!("Cron scheduler shut down");
        Ok(())
    }

    async fn register_retention_sweep(&self) -> AppResult<()> {
        let store = Arc::clone(&self.store);
        let files = self.files.clone();
        let retention_days = self.config.retention_days;

        let job = CronJob::new_async(self.config.cleanup_cron.as_str(), move |_uuid, _lock| {
            let store = Arc::clone(&store);
            let files = files.clone();
            Box::pin(async move {
                if let Err(e) = sweep_expired_jobs(store.as_ref(), &files, retention_days).await {
                    tracing::error!(error = %e, "Retention sweep failed");
                }
            })
        })
        .map_err(|e| {
            AppError::configuration(format!(
                "Invalid retention sweep schedule '{}': {e}",
                self.config.cleanup_cron
            ))
        })?;

        self.scheduler.add(job).await.map_err(|e| {
            AppError::internal(format!("Failed to add retention sweep schedule: {e}"))
        })?;

        tracing::info!(
            cron = %self.config.cleanup_cron,
            retention_days,
            "Registered: retention_sweep"
        );
        Ok(())
    }
}

/// Delete terminal jobs older than the retention window, with their files.
///
/// Returns the number of jobs removed.
pub async fn sweep_expired_jobs(
    store: &dyn JobStore,
    files: &TempFileArea,
    retention_days: u32,
) -> AppResult<usize> {
    let cutoff = Utc::now() - Duration::days(i64::from(retention_days));
    let removed = store.delete_terminal_before(cutoff).await?;

    for job in &removed {
        if let Err(e) = files.purge_job(job.id).await {
            tracing::warn!(job_id = %job.id, error = %e, "Failed to delete files of expired job");
        }
    }

    if !removed.is_empty() {
        tracing::info!(count = removed.len(), %cutoff, "Removed expired jobs");
    }
    Ok(removed.len())
}
