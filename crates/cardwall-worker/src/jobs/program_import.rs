//! Program import from an uploaded archive.

use std::sync::Arc;

use async_trait::async_trait;

use cardwall_core::traits::catalog::CardCatalog;
use cardwall_core::types::CardDraft;
use cardwall_entity::job::{ErrorEntry, JobKind, JobPayload, JobResult};

use super::archive::{ARCHIVE_FORMAT_VERSION, Archive};
use super::pluralize;
use crate::context::JobContext;
use crate::handler::{JobExecutionError, JobHandler};

/// Recreates an archive's projects and cards; one unit per card.
#[derive(Debug)]
pub struct ProgramImportHandler {
    catalog: Arc<dyn CardCatalog>,
}

impl ProgramImportHandler {
    /// Create a new program import handler.
    pub fn new(catalog: Arc<dyn CardCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl JobHandler for ProgramImportHandler {
    fn kind(&self) -> JobKind {
        JobKind::ImportProgram
    }

    async fn execute(
        &self,
        ctx: &JobContext,
        payload: &JobPayload,
    ) -> Result<JobResult, JobExecutionError> {
        let JobPayload::ImportProgram { program, .. } = payload else {
            return Err(JobExecutionError::Fatal(format!(
                "Unexpected parameters for {}",
                self.kind()
            )));
        };

        ctx.set_phase("Reading archive").await?;
        let input = ctx.read_input().await?;
        let archive: Archive = serde_json::from_slice(&input).map_err(|e| {
            JobExecutionError::Fatal(format!("The uploaded archive could not be read: {e}"))
        })?;
        if archive.format_version > ARCHIVE_FORMAT_VERSION {
            return Err(JobExecutionError::Fatal(format!(
                "Archive format version {} is not supported",
                archive.format_version
            )));
        }
        ctx.set_total(archive.card_count() as u64).await?;

        let mut imported_cards = 0usize;
        for project in &archive.projects {
            ctx.set_phase(format!("Importing {}", project.project)).await?;
            if self.catalog.ensure_project(&project.project).await? {
                tracing::info!(job_id = %ctx.job_id(), project = %project.project, "Created project");
            }
            self.catalog
                .add_project_to_program(program, &project.project)
                .await?;

            for card in &project.cards {
                let draft = CardDraft {
                    number: Some(card.number),
                    name: card.name.clone(),
                    card_type: card.card_type.clone(),
                    description: card.description.clone(),
                    properties: card.properties.clone(),
                };
                match self.catalog.create_card(&project.project, &draft).await {
                    Ok(_) => imported_cards += 1,
                    Err(e) if e.is_input_error() => {
                        ctx.unit_error(
                            ErrorEntry::unit(
                                "card_not_imported",
                                format!("{} #{}: {}.", project.project, card.number, e.message),
                            )
                            .with_view_hint(format!("card:{}/{}", project.project, card.number))
                            .with_context(serde_json::json!({
                                "project": project.project,
                                "number": card.number,
                                "name": card.name,
                            })),
                        )
                        .await?;
                    }
                    Err(e) => return Err(JobExecutionError::Internal(e)),
                }
                ctx.advance(1).await?;
            }
        }

        tracing::info!(
            job_id = %ctx.job_id(),
            program = %program,
            projects = archive.projects.len(),
            cards = imported_cards,
            "Program import finished"
        );

        let notice = (ctx.unit_error_count() == 0).then(|| {
            format!(
                "{} imported",
                pluralize(archive.projects.len(), "project", "projects")
            )
        });
        Ok(JobResult {
            redirect_to: Some(format!("/programs/{program}")),
            artifact: None,
            notice,
        })
    }
}
