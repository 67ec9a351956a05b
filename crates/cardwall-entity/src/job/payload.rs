//! Typed job payload definitions.

use serde::{Deserialize, Serialize};

use super::kind::JobKind;

/// Parameters a job needs to execute, persisted as the record's message payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobPayload {
    /// Import tab-separated card rows into a project.
    ImportCards {
        /// Target project.
        project: String,
        /// Original file name when the rows were uploaded.
        #[serde(default)]
        file_name: Option<String>,
    },
    /// Export a single project.
    ExportProject {
        /// Source project.
        project: String,
    },
    /// Export all projects of a program.
    ExportProgram {
        /// Source program.
        program: String,
    },
    /// Import an archive as a program.
    ImportProgram {
        /// Program the imported projects join.
        program: String,
        /// Uploaded archive name.
        file_name: String,
    },
    /// Import dependencies raised from a project.
    ImportDependencies {
        /// Project the dependencies are imported into.
        project: String,
        /// Uploaded export name.
        file_name: String,
    },
}

impl JobPayload {
    /// The kind this payload belongs to.
    pub fn kind(&self) -> JobKind {
        match self {
            Self::ImportCards { .. } => JobKind::ImportCards,
            Self::ExportProject { .. } => JobKind::ExportProject,
            Self::ExportProgram { .. } => JobKind::ExportProgram,
            Self::ImportProgram { .. } => JobKind::ImportProgram,
            Self::ImportDependencies { .. } => JobKind::ImportDependencies,
        }
    }

    /// Identifier of the project or program the job acts on.
    pub fn scope(&self) -> &str {
        match self {
            Self::ImportCards { project, .. }
            | Self::ExportProject { project }
            | Self::ImportDependencies { project, .. } => project,
            Self::ExportProgram { program } | Self::ImportProgram { program, .. } => program,
        }
    }

    /// Name of the uploaded input, if any.
    pub fn file_name(&self) -> Option<&str> {
        match self {
            Self::ImportCards { file_name, .. } => file_name.as_deref(),
            Self::ImportProgram { file_name, .. } | Self::ImportDependencies { file_name, .. } => {
                Some(file_name)
            }
            Self::ExportProject { .. } | Self::ExportProgram { .. } => None,
        }
    }
}
