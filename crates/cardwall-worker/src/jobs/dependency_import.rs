//! Dependency import from an exported JSON list.
//!
//! A dependency whose raising card is missing or unknown is not created.
//! It is recorded as a `pending_raising_card` error carrying the dependency,
//! so the submitter can later name the raising card.

use std::sync::Arc;

use async_trait::async_trait;

use cardwall_core::error::AppError;
use cardwall_core::traits::catalog::CardCatalog;
use cardwall_core::types::DependencyDraft;
use cardwall_entity::job::{ErrorEntry, JobKind, JobPayload, JobResult, PENDING_RAISING_CARD};

use super::{pluralize, scope_error};
use crate::context::JobContext;
use crate::handler::{JobExecutionError, JobHandler};

/// Imports cross-project dependencies.
#[derive(Debug)]
pub struct DependencyImportHandler {
    catalog: Arc<dyn CardCatalog>,
}

impl DependencyImportHandler {
    /// Create a new dependency import handler.
    pub fn new(catalog: Arc<dyn CardCatalog>) -> Self {
        Self { catalog }
    }

    async fn raising_card_known(&self, draft: &DependencyDraft) -> Result<bool, AppError> {
        let Some(raising) = &draft.raising_card else {
            return Ok(false);
        };
        match self.catalog.find_card(&raising.project, raising.number).await {
            Ok(card) => Ok(card.is_some()),
            Err(e) if e.is_input_error() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl JobHandler for DependencyImportHandler {
    fn kind(&self) -> JobKind {
        JobKind::ImportDependencies
    }

    async fn execute(
        &self,
        ctx: &JobContext,
        payload: &JobPayload,
    ) -> Result<JobResult, JobExecutionError> {
        let JobPayload::ImportDependencies { project, .. } = payload else {
            return Err(JobExecutionError::Fatal(format!(
                "Unexpected parameters for {}",
                self.kind()
            )));
        };

        if !self.catalog.project_exists(project).await.map_err(scope_error)? {
            return Err(JobExecutionError::Fatal(format!(
                "Project '{project}' not found"
            )));
        }

        let input = ctx.read_input().await?;
        let drafts: Vec<DependencyDraft> = serde_json::from_slice(&input).map_err(|e| {
            JobExecutionError::Fatal(format!("The dependency export could not be read: {e}"))
        })?;
        ctx.set_total(drafts.len() as u64).await?;

        let mut imported = 0usize;
        for draft in &drafts {
            let hint = format!("dependency:{}", draft.number);
            if !self.raising_card_known(draft).await? {
                let context = serde_json::to_value(draft).map_err(AppError::from)?;
                ctx.unit_error(
                    ErrorEntry::unit(
                        PENDING_RAISING_CARD,
                        format!(
                            "Dependency #{} '{}' has no raising card in this system.",
                            draft.number, draft.name
                        ),
                    )
                    .with_view_hint(hint)
                    .with_context(context),
                )
                .await?;
            } else {
                match self.catalog.create_dependency(draft).await {
                    Ok(number) => {
                        tracing::debug!(job_id = %ctx.job_id(), dependency = number, "Created dependency");
                        imported += 1;
                    }
                    Err(e) if e.is_input_error() => {
                        ctx.unit_error(
                            ErrorEntry::unit(
                                "dependency_rejected",
                                format!("Dependency #{}: {}.", draft.number, e.message),
                            )
                            .with_view_hint(hint),
                        )
                        .await?;
                    }
                    Err(e) => return Err(JobExecutionError::Internal(e)),
                }
            }
            ctx.advance(1).await?;
        }

        let notice = (ctx.unit_error_count() == 0).then(|| {
            format!(
                "{} imported",
                pluralize(imported, "dependency", "dependencies")
            )
        });
        Ok(JobResult {
            redirect_to: Some(format!("/projects/{project}/dependencies")),
            artifact: None,
            notice,
        })
    }
}

#[cfg(test)]
mod tests {
    use cardwall_core::types::{CardDraft, CardRef};
    use cardwall_database::MemoryCardCatalog;

    use super::*;
    use crate::jobs::test_support::Harness;

    fn payload() -> JobPayload {
        JobPayload::ImportDependencies {
            project: "alpha".to_string(),
            file_name: "deps.json".to_string(),
        }
    }

    fn draft(number: u64, raising: Option<CardRef>) -> DependencyDraft {
        DependencyDraft {
            number,
            name: format!("dependency {number}"),
            raising_card: raising,
            resolving_project: "beta".to_string(),
            resolving_cards: vec![],
        }
    }

    #[tokio::test]
    async fn test_unknown_raising_cards_become_pending_errors() {
        let catalog = Arc::new(MemoryCardCatalog::new());
        catalog.add_project("alpha");
        catalog.add_project("beta");
        catalog
            .create_card(
                "alpha",
                &CardDraft {
                    name: "raiser".to_string(),
                    ..CardDraft::default()
                },
            )
            .await
            .unwrap();

        let drafts = vec![
            draft(1, Some(CardRef::new("alpha", 1))),
            draft(2, None),
            draft(3, Some(CardRef::new("alpha", 42))),
            draft(4, Some(CardRef::new("gone", 1))),
        ];
        let input = serde_json::to_string(&drafts).unwrap();

        let harness = Harness::new().await;
        let handler = DependencyImportHandler::new(catalog.clone());
        let ctx = harness.context(&payload(), Some(&input)).await;

        let result = handler.execute(&ctx, &payload()).await.unwrap();

        let job = harness.job(ctx.job_id()).await;
        assert_eq!(job.completed, 4);
        assert_eq!(job.errors.len(), 3);
        assert!(job.errors.iter().all(|e| e.is_resolvable()));
        assert!(job.errors.iter().all(|e| e.raising_card.is_none()));
        assert_eq!(job.errors[0].context.as_ref().unwrap()["number"], 2);
        assert_eq!(catalog.dependency_count(), 1);
        assert!(result.notice.is_none());
    }

    #[tokio::test]
    async fn test_malformed_export_is_fatal() {
        let catalog = Arc::new(MemoryCardCatalog::new());
        catalog.add_project("alpha");
        let harness = Harness::new().await;
        let handler = DependencyImportHandler::new(catalog);
        let ctx = harness.context(&payload(), Some("{not json")).await;

        let err = handler.execute(&ctx, &payload()).await.unwrap_err();
        assert!(err.fatal_message().starts_with("The dependency export could not be read"));
    }
}
