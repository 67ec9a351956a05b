//! Kinds of long-running requests.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The operation a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "job_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Create or update cards from tab-separated text.
    ImportCards,
    /// Write a project's cards to an archive.
    ExportProject,
    /// Write every project of a program to one archive.
    ExportProgram,
    /// Recreate projects and cards from an uploaded archive.
    ImportProgram,
    /// Create cross-project dependencies from an uploaded export.
    ImportDependencies,
}

impl JobKind {
    /// All kinds, in declaration order.
    pub const ALL: [JobKind; 5] = [
        Self::ImportCards,
        Self::ExportProject,
        Self::ExportProgram,
        Self::ImportProgram,
        Self::ImportDependencies,
    ];

    /// Return the kind as a snake_case string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ImportCards => "import_cards",
            Self::ExportProject => "export_project",
            Self::ExportProgram => "export_program",
            Self::ImportProgram => "import_program",
            Self::ImportDependencies => "import_dependencies",
        }
    }

    /// Name of the queue messages for this kind are published to.
    pub fn queue_name(&self) -> String {
        format!("cardwall.{}", self.as_str())
    }

    /// Whether the input must arrive as an uploaded file.
    pub fn requires_upload(&self) -> bool {
        matches!(self, Self::ImportProgram | Self::ImportDependencies)
    }

    /// Progress label shown while units are being processed.
    pub fn working_label(&self) -> &'static str {
        match self {
            Self::ImportCards => "Importing cards",
            Self::ExportProject => "Exporting project",
            Self::ExportProgram => "Exporting program",
            Self::ImportProgram => "Importing program",
            Self::ImportDependencies => "Importing dependencies",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown job kind '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_name() {
        assert_eq!(JobKind::ImportCards.queue_name(), "cardwall.import_cards");
    }

    #[test]
    fn test_from_str() {
        assert_eq!("export_program".parse(), Ok(JobKind::ExportProgram));
        assert!("delete_everything".parse::<JobKind>().is_err());
    }
}
