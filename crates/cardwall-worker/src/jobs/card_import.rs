//! Tab-separated card import.
//!
//! The first non-blank line is the header. It must name a `Name` column;
//! `Number`, `Type` and `Description` are recognised and any other column
//! becomes a card property. Each following non-blank line is one unit.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use cardwall_core::error::AppError;
use cardwall_core::traits::catalog::CardCatalog;
use cardwall_core::types::CardDraft;
use cardwall_entity::job::{ErrorEntry, JobKind, JobPayload, JobResult};

use super::{pluralize, scope_error};
use crate::context::JobContext;
use crate::handler::{JobExecutionError, JobHandler};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Number,
    Name,
    Type,
    Description,
    Property,
}

#[derive(Debug)]
struct Header {
    columns: Vec<(Column, String)>,
}

impl Header {
    fn parse(line: &str) -> Result<Self, JobExecutionError> {
        let columns: Vec<(Column, String)> = line
            .split('\t')
            .map(|raw| {
                let name = raw.trim().to_string();
                let column = match name.to_ascii_lowercase().as_str() {
                    "number" | "#" => Column::Number,
                    "name" => Column::Name,
                    "type" => Column::Type,
                    "description" => Column::Description,
                    _ => Column::Property,
                };
                (column, name)
            })
            .collect();

        if !columns.iter().any(|(c, _)| *c == Column::Name) {
            return Err(JobExecutionError::Fatal(
                "The header row must contain a Name column".to_string(),
            ));
        }
        if columns
            .iter()
            .any(|(c, name)| *c == Column::Property && name.is_empty())
        {
            return Err(JobExecutionError::Fatal(
                "The header row contains a blank column name".to_string(),
            ));
        }
        Ok(Self { columns })
    }
}

/// A row that failed validation.
#[derive(Debug, PartialEq)]
struct RowError {
    name: &'static str,
    message: String,
    context: serde_json::Value,
}

fn parse_row(header: &Header, row: usize, line: &str) -> Result<CardDraft, RowError> {
    let cells: Vec<&str> = line.split('\t').collect();
    if cells.len() != header.columns.len() {
        return Err(RowError {
            name: "wrong_column_count",
            message: format!(
                "Row {row}: expected {} columns but found {}.",
                header.columns.len(),
                cells.len()
            ),
            context: serde_json::json!({ "row": row, "columns": cells.len() }),
        });
    }

    let mut draft = CardDraft::default();
    let mut properties = BTreeMap::new();
    for ((column, column_name), cell) in header.columns.iter().zip(cells) {
        let value = cell.trim();
        match column {
            Column::Name => draft.name = value.to_string(),
            Column::Number if !value.is_empty() => match value.parse::<u64>() {
                Ok(number) if number > 0 => draft.number = Some(number),
                _ => {
                    return Err(RowError {
                        name: "invalid_card_number",
                        message: format!("Row {row}: {value} is not a valid card number."),
                        context: serde_json::json!({ "row": row, "value": value }),
                    });
                }
            },
            Column::Number => {}
            Column::Type if !value.is_empty() => draft.card_type = Some(value.to_string()),
            Column::Description if !value.is_empty() => {
                draft.description = Some(value.to_string())
            }
            Column::Property if !value.is_empty() => {
                properties.insert(column_name.clone(), value.to_string());
            }
            Column::Type | Column::Description | Column::Property => {}
        }
    }
    draft.properties = properties;

    if draft.name.is_empty() {
        return Err(RowError {
            name: "blank_name",
            message: format!("Row {row}: Name can't be blank."),
            context: serde_json::json!({ "row": row }),
        });
    }
    Ok(draft)
}

/// Imports cards from tab-separated text.
#[derive(Debug)]
pub struct CardImportHandler {
    catalog: Arc<dyn CardCatalog>,
}

impl CardImportHandler {
    /// Create a new card import handler.
    pub fn new(catalog: Arc<dyn CardCatalog>) -> Self {
        Self { catalog }
    }

    async fn save(&self, project: &str, draft: &CardDraft) -> Result<(), AppError> {
        if let Some(number) = draft.number {
            if self.catalog.find_card(project, number).await?.is_some() {
                self.catalog.update_card(project, number, draft).await?;
                return Ok(());
            }
        }
        self.catalog.create_card(project, draft).await?;
        Ok(())
    }
}

#[async_trait]
impl JobHandler for CardImportHandler {
    fn kind(&self) -> JobKind {
        JobKind::ImportCards
    }

    async fn execute(
        &self,
        ctx: &JobContext,
        payload: &JobPayload,
    ) -> Result<JobResult, JobExecutionError> {
        let JobPayload::ImportCards { project, .. } = payload else {
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
        let text = std::str::from_utf8(&input).map_err(|_| {
            JobExecutionError::Fatal("The import text is not valid UTF-8".to_string())
        })?;

        let mut lines = text
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.trim().is_empty());
        let header = Header::parse(
            lines
                .next()
                .ok_or_else(|| JobExecutionError::Fatal("The import text is empty".to_string()))?,
        )?;
        let rows: Vec<&str> = lines.collect();
        ctx.set_total(rows.len() as u64).await?;

        let mut imported = 0usize;
        for (index, line) in rows.iter().enumerate() {
            let row = index + 1;
            match parse_row(&header, row, line) {
                Ok(draft) => match self.save(project, &draft).await {
                    Ok(()) => imported += 1,
                    Err(e) if e.is_input_error() => {
                        ctx.unit_error(
                            ErrorEntry::unit("card_rejected", format!("Row {row}: {}.", e.message))
                                .with_view_hint(format!("row:{row}"))
                                .with_context(serde_json::json!({ "row": row, "name": draft.name })),
                        )
                        .await?;
                    }
                    Err(e) => return Err(JobExecutionError::Internal(e)),
                },
                Err(invalid) => {
                    ctx.unit_error(
                        ErrorEntry::unit(invalid.name, invalid.message)
                            .with_view_hint(format!("row:{row}"))
                            .with_context(invalid.context),
                    )
                    .await?;
                }
            }
            ctx.advance(1).await?;
        }

        tracing::info!(
            job_id = %ctx.job_id(),
            project = %project,
            imported,
            rejected = ctx.unit_error_count(),
            "Card import finished"
        );

        let notice = (ctx.unit_error_count() == 0)
            .then(|| format!("{} imported", pluralize(imported, "card", "cards")));
        Ok(JobResult {
            redirect_to: Some(format!("/projects/{project}/cards")),
            artifact: None,
            notice,
        })
    }
}
