//! Worker runner: consumes the named queues and processes jobs.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use futures::stream::{self, BoxStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, watch};

use cardwall_core::config::WorkerConfig;
use cardwall_core::result::AppResult;
use cardwall_core::types::JobId;
use cardwall_database::JobStore;
use cardwall_entity::job::JobStatus;

use crate::processor::JobProcessor;
use crate::queue::{JobQueue, QueueMessage, QueueReceiver};

/// Main worker runner that consumes queues and processes jobs
#[derive(Debug)]
pub struct WorkerRunner {
    queue: Arc<JobQueue>,
    processor: Arc<JobProcessor>,
    store: Arc<dyn JobStore>,
    config: WorkerConfig,
    worker_id: String,
}

impl WorkerRunner {
    /// Create a new worker runner
    pub fn new(
        queue: Arc<JobQueue>,
        processor: Arc<JobProcessor>,
        store: Arc<dyn JobStore>,
        config: WorkerConfig,
        worker_id: String,
    ) -> Self {
        Self {
            queue,
            processor,
            store,
            config,
            worker_id,
        }
    }

    /// Run until the cancel signal is received or every queue closes.
    ///
    /// Jobs left `running` by a previous process are failed, and jobs still
    /// `queued` are picked up first, since their messages did not survive.
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) -> AppResult<()> {
        let receivers = self.queue.take_receivers().await?;
        let queue_names: Vec<&str> = receivers.iter().map(|(name, _)| name.as_str()).collect();
        tracing::info!(
            worker_id = %self.worker_id,
            concurrency = self.config.concurrency,
            queues = ?queue_names,
            "Worker started"
        );

        match self.processor.recover_interrupted().await {
            Ok(0) => {}
            Ok(count) => tracing::info!(count, "Failed jobs interrupted by a restart"),
            Err(e) => tracing::error!(error = %e, "Failed to recover interrupted jobs"),
        }

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        self.recover_queued(&semaphore).await;

        let mut messages = merge(receivers);
        loop {
            tokio::select! {
                changed = cancel.changed() => {
                    // A dropped sender counts as shutdown.
                    if changed.is_err() || *cancel.borrow() {
                        tracing::info!(worker_id = %self.worker_id, "Worker received shutdown signal");
                        break;
                    }
                }
                next = messages.next() => {
                    let Some(message) = next else {
                        tracing::info!(worker_id = %self.worker_id, "All queues closed");
                        break;
                    };
                    tracing::debug!(queue = %message.queue, job_id = %message.body.job_id, "Received job message");
                    let Ok(permit) = semaphore.clone().acquire_owned().await else {
                        break;
                    };
                    self.spawn_process(message.body.job_id, permit);
                }
            }
        }

        tracing::info!(worker_id = %self.worker_id, "Waiting for in-flight jobs to complete");
        let permits = u32::try_from(self.config.concurrency.max(1)).unwrap_or(u32::MAX);
        let drain = Duration::from_secs(self.config.drain_timeout_seconds);
        if tokio::time::timeout(drain, semaphore.acquire_many(permits))
            .await
            .is_err()
        {
            tracing::warn!(worker_id = %self.worker_id, "Drain timeout elapsed with jobs still running");
        }

        tracing::info!(worker_id = %self.worker_id, "Worker shut down");
        Ok(())
    }

    async fn recover_queued(&self, semaphore: &Arc<Semaphore>) {
        let orphaned = match self.store.list_by_status(JobStatus::Queued).await {
            Ok(jobs) => jobs,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list queued jobs for recovery");
                return;
            }
        };
        if orphaned.is_empty() {
            return;
        }

        tracing::info!(count = orphaned.len(), "Recovering queued jobs");
        for job in orphaned {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                return;
            };
            self.spawn_process(job.id, permit);
        }
    }

    fn spawn_process(&self, job_id: JobId, permit: OwnedSemaphorePermit) {
        let processor = Arc::clone(&self.processor);
        tokio::spawn(async move {
            let _permit = permit;
            if let Err(e) = processor.process(job_id).await {
                tracing::error!(job_id = %job_id, error = %e, "Job processing failed");
            }
        });
    }
}

fn merge(receivers: Vec<(String, QueueReceiver)>) -> BoxStream<'static, QueueMessage> {
    let streams = receivers.into_iter().map(|(_, rx)| {
        stream::unfold(rx, |mut rx| async move {
            let message = rx.recv().await?;
            Some((message, rx))
        })
        .boxed()
    });
    stream::select_all(streams).boxed()
}
