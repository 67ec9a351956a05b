//! Project and program export to JSON archives.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;

use cardwall_core::error::AppError;
use cardwall_core::traits::catalog::CardCatalog;
use cardwall_entity::job::{ErrorEntry, JobKind, JobPayload, JobResult};

use super::archive::{ARCHIVE_FORMAT_VERSION, Archive, ProjectArchive};
use super::scope_error;
use crate::context::JobContext;
use crate::handler::{JobExecutionError, JobHandler};

async fn write_archive(
    ctx: &JobContext,
    file_name: &str,
    archive: &Archive,
) -> Result<String, JobExecutionError> {
    let data = serde_json::to_vec_pretty(archive).map_err(AppError::from)?;
    let key = ctx.write_artifact(file_name, Bytes::from(data)).await?;
    Ok(key)
}

fn download_result(ctx: &JobContext, key: String, notice: String) -> JobResult {
    JobResult {
        redirect_to: Some(format!("/api/jobs/{}/artifact", ctx.job_id())),
        artifact: Some(key),
        notice: Some(notice),
    }
}

/// Exports one project's cards; one unit per card.
#[derive(Debug)]
pub struct ProjectExportHandler {
    catalog: Arc<dyn CardCatalog>,
}

impl ProjectExportHandler {
    /// Create a new project export handler.
    pub fn new(catalog: Arc<dyn CardCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl JobHandler for ProjectExportHandler {
    fn kind(&self) -> JobKind {
        JobKind::ExportProject
    }

    async fn execute(
        &self,
        ctx: &JobContext,
        payload: &JobPayload,
    ) -> Result<JobResult, JobExecutionError> {
        let JobPayload::ExportProject { project } = payload else {
            return Err(JobExecutionError::Fatal(format!(
                "Unexpected parameters for {}",
                self.kind()
            )));
        };

        let cards = self.catalog.list_cards(project).await.map_err(scope_error)?;
        ctx.set_total(cards.len() as u64).await?;

        let mut exported = Vec::with_capacity(cards.len());
        for card in cards {
            exported.push(card);
            ctx.advance(1).await?;
        }

        let archive = Archive {
            format_version: ARCHIVE_FORMAT_VERSION,
            program: None,
            exported_at: Utc::now(),
            projects: vec![ProjectArchive {
                project: project.clone(),
                cards: exported,
            }],
        };
        let key = write_archive(ctx, &format!("{project}.json"), &archive).await?;

        tracing::info!(job_id = %ctx.job_id(), project = %project, cards = archive.card_count(), "Project exported");
        Ok(download_result(ctx, key, format!("Export of {project} is ready")))
    }
}

/// Exports every project of a program; one unit per project.
#[derive(Debug)]
pub struct ProgramExportHandler {
    catalog: Arc<dyn CardCatalog>,
}

impl ProgramExportHandler {
    /// Create a new program export handler.
    pub fn new(catalog: Arc<dyn CardCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl JobHandler for ProgramExportHandler {
    fn kind(&self) -> JobKind {
        JobKind::ExportProgram
    }

    async fn execute(
        &self,
        ctx: &JobContext,
        payload: &JobPayload,
    ) -> Result<JobResult, JobExecutionError> {
        let JobPayload::ExportProgram { program } = payload else {
            return Err(JobExecutionError::Fatal(format!(
                "Unexpected parameters for {}",
                self.kind()
            )));
        };

        let projects = self
            .catalog
            .program_projects(program)
            .await
            .map_err(scope_error)?;
        ctx.set_total(projects.len() as u64).await?;

        let mut archived = Vec::with_capacity(projects.len());
        for project in projects {
            ctx.set_phase(format!("Exporting {project}")).await?;
            match self.catalog.list_cards(&project).await {
                Ok(cards) => archived.push(ProjectArchive { project, cards }),
                Err(e) if e.is_input_error() => {
                    ctx.unit_error(
                        ErrorEntry::unit(
                            "project_not_exported",
                            format!("{project}: {}.", e.message),
                        )
                        .with_view_hint(format!("project:{project}")),
                    )
                    .await?;
                }
                Err(e) => return Err(JobExecutionError::Internal(e)),
            }
            ctx.advance(1).await?;
        }

        let archive = Archive {
            format_version: ARCHIVE_FORMAT_VERSION,
            program: Some(program.clone()),
            exported_at: Utc::now(),
            projects: archived,
        };
        let key = write_archive(ctx, &format!("{program}.cardwall"), &archive).await?;

        tracing::info!(
            job_id = %ctx.job_id(),
            program = %program,
            projects = archive.projects.len(),
            "Program exported"
        );
        Ok(download_result(ctx, key, format!("Export of {program} is ready")))
    }
}
