//! Executors decide where a submitted job's processing happens.

use std::sync::Arc;

use async_trait::async_trait;

use cardwall_core::config::ExecutionMode;
use cardwall_core::result::AppResult;
use cardwall_entity::job::Job;

use crate::processor::JobProcessor;
use crate::queue::{JobQueue, QueueMessage};

/// Hands a freshly created job to whatever will process it.
#[async_trait]
pub trait Executor: Send + Sync + std::fmt::Debug {
    /// The mode this executor implements.
    fn mode(&self) -> ExecutionMode;

    /// Start processing of a queued job.
    async fn dispatch(&self, job: &Job) -> AppResult<()>;
}

/// Processes the job before `dispatch` returns.
#[derive(Debug, Clone)]
pub struct InlineExecutor {
    processor: Arc<JobProcessor>,
}

impl InlineExecutor {
    /// Create an inline executor.
    pub fn new(processor: Arc<JobProcessor>) -> Self {
        Self { processor }
    }
}

#[async_trait]
impl Executor for InlineExecutor {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Inline
    }

    async fn dispatch(&self, job: &Job) -> AppResult<()> {
        tracing::debug!(job_id = %job.id, "Processing job inline");
        self.processor.process(job.id).await
    }
}

/// Publishes the job to its kind's queue for the worker runner.
#[derive(Debug, Clone)]
pub struct QueuedExecutor {
    queue: Arc<JobQueue>,
}

impl QueuedExecutor {
    /// Create a queued executor.
    pub fn new(queue: Arc<JobQueue>) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl Executor for QueuedExecutor {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Queued
    }

    async fn dispatch(&self, job: &Job) -> AppResult<()> {
        self.queue.publish(QueueMessage::for_job(job)).await
    }
}
