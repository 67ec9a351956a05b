//! Named in-process queues carrying job dispatch messages.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, mpsc};

use cardwall_core::error::AppError;
use cardwall_core::result::AppResult;
use cardwall_core::types::{JobId, UserId};
use cardwall_entity::job::{Job, JobKind};

/// Body of a dispatch message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueBody {
    /// Job to process.
    pub job_id: JobId,
    /// Kind of the job.
    pub kind: JobKind,
    /// Submitting user.
    pub owner: UserId,
}

/// A message published to a named queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMessage {
    /// Queue name, e.g. `cardwall.import_cards`.
    pub queue: String,
    /// Message body.
    pub body: QueueBody,
}

impl QueueMessage {
    /// Dispatch message for a job, addressed to its kind's queue.
    pub fn for_job(job: &Job) -> Self {
        Self {
            queue: job.kind.queue_name(),
            body: QueueBody {
                job_id: job.id,
                kind: job.kind,
                owner: job.owner,
            },
        }
    }
}

/// Receiving end of one named queue.
pub type QueueReceiver = mpsc::Receiver<QueueMessage>;

/// One bounded queue per job kind.
///
/// Publishing never waits: a full queue is reported to the caller. The
/// receivers are handed out once, to the worker runner.
#[derive(Debug)]
pub struct JobQueue {
    senders: HashMap<String, mpsc::Sender<QueueMessage>>,
    receivers: Mutex<Option<Vec<(String, QueueReceiver)>>>,
}

impl JobQueue {
    /// Create a queue per job kind with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let mut senders = HashMap::new();
        let mut receivers = Vec::new();
        for kind in JobKind::ALL {
            let (tx, rx) = mpsc::channel(capacity.max(1));
            senders.insert(kind.queue_name(), tx);
            receivers.push((kind.queue_name(), rx));
        }
        Self {
            senders,
            receivers: Mutex::new(Some(receivers)),
        }
    }

    /// Publish a message to its queue without waiting.
    ///
    /// A full or unconsumed queue fails with `ServiceUnavailable` so the
    /// submitting request never blocks on the worker.
    pub async fn publish(&self, message: QueueMessage) -> AppResult<()> {
        let sender = self
            .senders
            .get(&message.queue)
            .ok_or_else(|| AppError::internal(format!("Unknown queue '{}'", message.queue)))?;

        let queue = message.queue.clone();
        let job_id = message.body.job_id;
        sender.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => {
                tracing::warn!(queue = %queue, job_id = %job_id, "Queue is full");
                AppError::service_unavailable(format!("Queue '{queue}' is full"))
            }
            TrySendError::Closed(_) => {
                AppError::service_unavailable(format!("Queue '{queue}' is no longer consumed"))
            }
        })?;

        tracing::debug!(queue = %queue, job_id = %job_id, "Published job message");
        Ok(())
    }

    /// Take the receiving ends. Only the first call gets them.
    pub async fn take_receivers(&self) -> AppResult<Vec<(String, QueueReceiver)>> {
        self.receivers
            .lock()
            .await
            .take()
            .ok_or_else(|| AppError::internal("Queue receivers were already taken"))
    }
}
