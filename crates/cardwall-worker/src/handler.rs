//! Job handlers and the registry dispatching to them by kind.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use cardwall_core::error::AppError;
use cardwall_entity::job::{JobKind, JobPayload, JobResult};

use crate::context::JobContext;

/// Trait for job handler implementations
#[async_trait]
pub trait JobHandler: Send + Sync + std::fmt::Debug {
    /// The job kind this handler processes
    fn kind(&self) -> JobKind;

    /// Process the job's units, reporting through `ctx`.
    ///
    /// Unit failures are recorded with [`JobContext::unit_error`] and do not
    /// end processing. Returning an error fails the whole job.
    async fn execute(
        &self,
        ctx: &JobContext,
        payload: &JobPayload,
    ) -> Result<JobResult, JobExecutionError>;
}

/// Error ending a job's processing
#[derive(Debug, thiserror::Error)]
pub enum JobExecutionError {
    /// Input is unusable as a whole (unreadable file, malformed header)
    #[error("{0}")]
    Fatal(String),

    /// Infrastructure failure
    #[error("Internal error: {0}")]
    Internal(#[from] AppError),
}

impl JobExecutionError {
    /// Message recorded as the job's single fatal error.
    pub fn fatal_message(&self) -> String {
        match self {
            Self::Fatal(message) => message.clone(),
            Self::Internal(err) => format!("The job could not be completed: {}", err.message),
        }
    }
}

/// Registered job handlers keyed by kind
#[derive(Debug, Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<JobKind, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job handler, replacing any previous one for its kind
    pub fn register(&mut self, handler: Arc<dyn JobHandler>) {
        let kind = handler.kind();
        tracing::info!(kind = %kind, "Registered job handler");
        self.handlers.insert(kind, handler);
    }

    /// Handler for a kind
    pub fn get(&self, kind: JobKind) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(&kind).cloned()
    }
}
