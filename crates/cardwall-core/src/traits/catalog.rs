//! Card catalog trait: the slice of the project-tracking domain that jobs
//! read from and write to.

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::card::{CardDraft, CardRecord, DependencyDraft};

/// Access to projects, programs, cards, and dependencies.
///
/// Implementations report bad input (duplicate names, unknown projects) with
/// `Validation`, `Conflict`, or `NotFound` errors so that job handlers can
/// record them per unit; any other error kind is treated as an
/// infrastructure failure.
#[async_trait]
pub trait CardCatalog: Send + Sync + std::fmt::Debug + 'static {
    /// Check whether a project exists.
    async fn project_exists(&self, project: &str) -> AppResult<bool>;

    /// Create the project if it is missing. Returns `true` when created.
    async fn ensure_project(&self, project: &str) -> AppResult<bool>;

    /// List the project identifiers belonging to a program.
    async fn program_projects(&self, program: &str) -> AppResult<Vec<String>>;

    /// Attach a project to a program, creating the program if needed.
    async fn add_project_to_program(&self, program: &str, project: &str) -> AppResult<()>;

    /// Find a card by number.
    async fn find_card(&self, project: &str, number: u64) -> AppResult<Option<CardRecord>>;

    /// List all cards of a project ordered by number.
    async fn list_cards(&self, project: &str) -> AppResult<Vec<CardRecord>>;

    /// Create a card.
    async fn create_card(&self, project: &str, draft: &CardDraft) -> AppResult<CardRecord>;

    /// Overwrite the fields of an existing card.
    async fn update_card(
        &self,
        project: &str,
        number: u64,
        draft: &CardDraft,
    ) -> AppResult<CardRecord>;

    /// Create a dependency raised by `draft.raising_card`. Returns its number.
    async fn create_dependency(&self, draft: &DependencyDraft) -> AppResult<u64>;
}
