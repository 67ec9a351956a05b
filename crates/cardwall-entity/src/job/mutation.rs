//! Mutations applied to a job record as one atomic group.

use serde::{Deserialize, Serialize};

use cardwall_core::types::CardRef;

use super::error_entry::ErrorEntry;
use super::model::JobResult;
use super::status::JobStatus;

/// A single monotonic change to a job record.
///
/// Stores apply a slice of mutations all-or-nothing through
/// [`Job::apply_all`](super::model::Job::apply_all).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum JobMutation {
    /// Move the job forward in its lifecycle.
    Transition {
        /// Target status.
        status: JobStatus,
    },
    /// Record the expected number of units.
    SetTotal {
        /// Unit count.
        total: u64,
    },
    /// Count processed units.
    Advance {
        /// Units processed since the last advance.
        delta: u64,
    },
    /// Record an error.
    AppendError {
        /// The error.
        entry: ErrorEntry,
    },
    /// Attach a raising card to a pending dependency error.
    ResolveError {
        /// Position in the error list.
        index: usize,
        /// Raising card.
        raising_card: CardRef,
    },
    /// Attach the terminal result payload.
    SetResult {
        /// The result.
        result: JobResult,
    },
    /// Update the human-readable phase label.
    SetProgressMessage {
        /// The label.
        message: String,
    },
}
