//! JSON archive format shared by the export and program import handlers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cardwall_core::types::CardRecord;

/// Version written into every archive.
pub const ARCHIVE_FORMAT_VERSION: u32 = 1;

/// One project and its cards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectArchive {
    /// Project identifier.
    pub project: String,
    /// Cards ordered by number.
    pub cards: Vec<CardRecord>,
}

/// Archive produced by an export and consumed by a program import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Archive {
    /// Format version.
    pub format_version: u32,
    /// Program the projects belong to, if the export covered one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    /// When the archive was written.
    pub exported_at: DateTime<Utc>,
    /// Exported projects.
    pub projects: Vec<ProjectArchive>,
}

impl Archive {
    /// Total number of cards across all projects.
    pub fn card_count(&self) -> usize {
        self.projects.iter().map(|p| p.cards.len()).sum()
    }
}
