//! Opening the configured job record store.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

use cardwall_core::config::{DatabaseBackend, DatabaseConfig};
use cardwall_core::error::{AppError, ErrorKind};
use cardwall_core::result::AppResult;

use crate::memory::MemoryJobStore;
use crate::repositories::PgJobRepository;
use crate::store::JobStore;

/// Schema of the `jobs` table.
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// A job store together with whatever must be closed on shutdown.
#[derive(Debug)]
pub struct OpenedStore {
    store: Arc<dyn JobStore>,
    pool: Option<PgPool>,
}

impl OpenedStore {
    /// The store itself.
    pub fn store(&self) -> Arc<dyn JobStore> {
        Arc::clone(&self.store)
    }

    /// Whether records survive a restart.
    pub fn is_durable(&self) -> bool {
        self.pool.is_some()
    }

    /// Release database connections, if any.
    pub async fn close(self) {
        if let Some(pool) = self.pool {
            pool.close().await;
            tracing::info!("Job store connections closed");
        }
    }
}

/// Open the store selected by `database.backend`.
///
/// The PostgreSQL backend connects and brings the schema up to date before
/// returning.
pub async fn open_job_store(config: &DatabaseConfig) -> AppResult<OpenedStore> {
    match config.backend {
        DatabaseBackend::Memory => {
            tracing::warn!("Using the in-memory job store; jobs do not survive a restart");
            Ok(OpenedStore {
                store: Arc::new(MemoryJobStore::new()),
                pool: None,
            })
        }
        DatabaseBackend::Postgres => {
            let pool = connect(config).await?;
            migrate(&pool).await?;
            Ok(OpenedStore {
                store: Arc::new(PgJobRepository::new(pool.clone())),
                pool: Some(pool),
            })
        }
    }
}

fn connect_options(config: &DatabaseConfig) -> AppResult<PgConnectOptions> {
    if config.url.trim().is_empty() {
        return Err(AppError::validation(
            "database.url is required for the postgres backend",
        ));
    }
    config.url.parse::<PgConnectOptions>().map_err(|e| {
        AppError::with_source(ErrorKind::Validation, "database.url is not a valid PostgreSQL URL", e)
    })
}

async fn connect(config: &DatabaseConfig) -> AppResult<PgPool> {
    let options = connect_options(config)?;
    // Log the parsed target rather than the URL, which may carry a password.
    tracing::info!(
        host = options.get_host(),
        port = options.get_port(),
        database = options.get_database().unwrap_or_default(),
        max_connections = config.max_connections,
        "Connecting job store to PostgreSQL"
    );

    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
        .connect_with(options)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to connect to PostgreSQL", e))
}

async fn migrate(pool: &PgPool) -> AppResult<()> {
    MIGRATOR.run(pool).await.map_err(|e| {
        AppError::with_source(ErrorKind::Database, "Failed to migrate the jobs schema", e)
    })?;
    tracing::info!(migrations = MIGRATOR.iter().count(), "Jobs schema is up to date");
    Ok(())
}
