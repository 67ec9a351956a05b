//! Cardwall job server
//!
//! Main entry point that wires the crates together and starts the server.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt};

use cardwall_api::{AppState, build_app};
use cardwall_core::config::{AppConfig, ExecutionMode};
use cardwall_core::error::AppError;
use cardwall_core::traits::catalog::CardCatalog;
use cardwall_database::{JobStore, MemoryCardCatalog, open_job_store};
use cardwall_service::JobService;
use cardwall_storage::{LocalStorageProvider, TempFileArea};
use cardwall_worker::jobs::default_registry;
use cardwall_worker::{
    CronScheduler, Executor, InlineExecutor, JobProcessor, JobQueue, QueuedExecutor, WorkerRunner,
};

#[tokio::main]
async fn main() {
    let env = std::env::var("CARDWALL_ENV").unwrap_or_else(|_| "development".to_string());
    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);
    tracing::info!(env = %env, "Configuration loaded");

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting Cardwall v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Job record store ─────────────────────────────────
    let opened = open_job_store(&config.database).await?;
    let store: Arc<dyn JobStore> = opened.store();
    tracing::info!(durable = opened.is_durable(), "Job store ready");

    // ── Step 2: File-holding area and catalog ────────────────────
    let provider = LocalStorageProvider::new(&config.storage.data_root).await?;
    let files = TempFileArea::new(Arc::new(provider));
    let catalog: Arc<dyn CardCatalog> = Arc::new(MemoryCardCatalog::new());

    // ── Step 3: Processor and executor ───────────────────────────
    let processor = Arc::new(JobProcessor::new(
        Arc::clone(&store),
        files.clone(),
        default_registry(Arc::clone(&catalog)),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut worker_handle = None;
    let executor: Arc<dyn Executor> = match config.worker.execution_mode {
        ExecutionMode::Inline => {
            let failed = processor.recover_interrupted().await?;
            if failed > 0 {
                tracing::warn!(count = failed, "Failed jobs interrupted by a restart");
            }
            Arc::new(InlineExecutor::new(Arc::clone(&processor)))
        }
        ExecutionMode::Queued => {
            let queue = Arc::new(JobQueue::new(config.worker.queue_capacity));
            if config.worker.enabled {
                let worker_id = format!("worker-{}", &uuid::Uuid::new_v4().simple().to_string()[..8]);
                let runner = WorkerRunner::new(
                    Arc::clone(&queue),
                    Arc::clone(&processor),
                    Arc::clone(&store),
                    config.worker.clone(),
                    worker_id,
                );
                let cancel = shutdown_rx.clone();
                worker_handle = Some(tokio::spawn(async move {
                    if let Err(e) = runner.run(cancel).await {
                        tracing::error!(error = %e, "Worker stopped with an error");
                    }
                }));
            } else {
                tracing::warn!("Queued execution with the worker disabled; jobs will wait");
            }
            Arc::new(QueuedExecutor::new(queue))
        }
    };

    // ── Step 4: Retention sweep ──────────────────────────────────
    let mut scheduler =
        CronScheduler::new(Arc::clone(&store), files.clone(), config.jobs.clone()).await?;
    scheduler.register_default_tasks().await?;
    scheduler.start().await?;

    // ── Step 5: HTTP server ──────────────────────────────────────
    let job_service = Arc::new(JobService::new(
        Arc::clone(&store),
        catalog,
        files,
        executor,
        config.jobs.clone(),
        config.storage.max_upload_size_bytes,
    ));
    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let app = build_app(AppState::new(Arc::new(config), job_service));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;
    tracing::info!("Cardwall server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received, starting graceful shutdown...");
            let _ = shutdown_tx.send(true);
        })
        .await
        .map_err(|e| AppError::internal(format!("Server error: {e}")))?;

    // ── Step 6: Wait for background tasks ────────────────────────
    if let Some(handle) = worker_handle {
        if tokio::time::timeout(grace, handle).await.is_err() {
            tracing::warn!("Worker did not stop within the grace period");
        }
    }
    if let Err(e) = scheduler.shutdown().await {
        tracing::warn!(error = %e, "Scheduler shutdown failed");
    }
    opened.close().await;

    tracing::info!("Cardwall server shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
