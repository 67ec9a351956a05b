//! In-memory card catalog.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use cardwall_core::error::AppError;
use cardwall_core::result::AppResult;
use cardwall_core::traits::catalog::CardCatalog;
use cardwall_core::types::card::{CardDraft, CardRecord, DependencyDraft};

#[derive(Debug, Default)]
struct ProjectCards {
    cards: BTreeMap<u64, CardRecord>,
}

impl ProjectCards {
    fn next_number(&self) -> u64 {
        self.cards.keys().next_back().map_or(1, |last| last + 1)
    }

    fn name_taken(&self, name: &str, except: Option<u64>) -> bool {
        self.cards
            .values()
            .any(|card| Some(card.number) != except && card.name.eq_ignore_ascii_case(name))
    }
}

/// Card catalog held in memory, used by tests and single-node deployments.
///
/// Card names are unique per project (case-insensitive).
#[derive(Debug, Clone, Default)]
pub struct MemoryCardCatalog {
    projects: Arc<DashMap<String, ProjectCards>>,
    programs: Arc<DashMap<String, Vec<String>>>,
    dependencies: Arc<DashMap<u64, DependencyDraft>>,
    next_dependency: Arc<AtomicU64>,
}

impl MemoryCardCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a project with no cards. Existing projects are left alone.
    pub fn add_project(&self, project: &str) {
        self.projects.entry(project.to_string()).or_default();
    }

    /// Create a program grouping the given projects.
    pub fn add_program(&self, program: &str, projects: &[&str]) {
        for project in projects {
            self.add_project(project);
        }
        self.programs.insert(
            program.to_string(),
            projects.iter().map(|p| p.to_string()).collect(),
        );
    }

    /// Number of dependencies created so far.
    pub fn dependency_count(&self) -> usize {
        self.dependencies.len()
    }
}

fn validate_name(draft: &CardDraft) -> AppResult<()> {
    if draft.name.trim().is_empty() {
        return Err(AppError::validation("Name can't be blank"));
    }
    Ok(())
}

fn record_from(number: u64, draft: &CardDraft) -> CardRecord {
    CardRecord {
        number,
        name: draft.name.trim().to_string(),
        card_type: draft.card_type.clone(),
        description: draft.description.clone(),
        properties: draft.properties.clone(),
    }
}

#[async_trait]
impl CardCatalog for MemoryCardCatalog {
    async fn project_exists(&self, project: &str) -> AppResult<bool> {
        Ok(self.projects.contains_key(project))
    }

    async fn ensure_project(&self, project: &str) -> AppResult<bool> {
        let mut created = false;
        self.projects.entry(project.to_string()).or_insert_with(|| {
            created = true;
            ProjectCards::default()
        });
        Ok(created)
    }

    async fn program_projects(&self, program: &str) -> AppResult<Vec<String>> {
        self.programs
            .get(program)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::not_found(format!("Program '{program}' not found")))
    }

    async fn add_project_to_program(&self, program: &str, project: &str) -> AppResult<()> {
        let mut members = self.programs.entry(program.to_string()).or_default();
        if !members.iter().any(|p| p == project) {
            members.push(project.to_string());
        }
        Ok(())
    }

    async fn find_card(&self, project: &str, number: u64) -> AppResult<Option<CardRecord>> {
        let cards = self
            .projects
            .get(project)
            .ok_or_else(|| AppError::not_found(format!("Project '{project}' not found")))?;
        Ok(cards.cards.get(&number).cloned())
    }

    async fn list_cards(&self, project: &str) -> AppResult<Vec<CardRecord>> {
        let cards = self
            .projects
            .get(project)
            .ok_or_else(|| AppError::not_found(format!("Project '{project}' not found")))?;
        Ok(cards.cards.values().cloned().collect())
    }

    async fn create_card(&self, project: &str, draft: &CardDraft) -> AppResult<CardRecord> {
        validate_name(draft)?;
        let mut cards = self
            .projects
            .get_mut(project)
            .ok_or_else(|| AppError::not_found(format!("Project '{project}' not found")))?;

        if cards.name_taken(draft.name.trim(), None) {
            return Err(AppError::conflict(format!(
                "Name '{}' has already been taken",
                draft.name.trim()
            )));
        }
        let number = match draft.number {
            Some(number) if cards.cards.contains_key(&number) => {
                return Err(AppError::conflict(format!(
                    "Card #{number} already exists"
                )));
            }
            Some(number) => number,
            None => cards.next_number(),
        };

        let record = record_from(number, draft);
        cards.cards.insert(number, record.clone());
        Ok(record)
    }

    async fn update_card(
        &self,
        project: &str,
        number: u64,
        draft: &CardDraft,
    ) -> AppResult<CardRecord> {
        validate_name(draft)?;
        let mut cards = self
            .projects
            .get_mut(project)
            .ok_or_else(|| AppError::not_found(format!("Project '{project}' not found")))?;

        if !cards.cards.contains_key(&number) {
            return Err(AppError::not_found(format!("Card #{number} not found")));
        }
        if cards.name_taken(draft.name.trim(), Some(number)) {
            return Err(AppError::conflict(format!(
                "Name '{}' has already been taken",
                draft.name.trim()
            )));
        }

        let record = record_from(number, draft);
        cards.cards.insert(number, record.clone());
        Ok(record)
    }

    async fn create_dependency(&self, draft: &DependencyDraft) -> AppResult<u64> {
        let raising = draft.raising_card.as_ref().ok_or_else(|| {
            AppError::validation(format!("Dependency #{} has no raising card", draft.number))
        })?;
        if self.find_card(&raising.project, raising.number).await?.is_none() {
            return Err(AppError::not_found(format!(
                "Raising card {raising} not found"
            )));
        }
        if !self.project_exists(&draft.resolving_project).await? {
            return Err(AppError::not_found(format!(
                "Resolving project '{}' not found",
                draft.resolving_project
            )));
        }

        let number = self.next_dependency.fetch_add(1, Ordering::SeqCst) + 1;
        self.dependencies.insert(number, draft.clone());
        Ok(number)
    }
}
