//! Read-only progress projection.

use serde::{Deserialize, Serialize};

/// Progress of a job as shown to pollers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSummary {
    /// Units processed.
    pub completed: u64,
    /// Units expected, if known.
    pub total: Option<u64>,
    /// Whole-number percentage in `0..=100`.
    pub percent: u8,
    /// Phase label, e.g. "Importing cards".
    pub label: String,
}
