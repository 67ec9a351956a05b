//! Card value types exchanged with the card catalog.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Reference to a card in a project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CardRef {
    /// Project identifier.
    pub project: String,
    /// Card number within the project.
    pub number: u64,
}

impl CardRef {
    /// Creates a new card reference.
    pub fn new(project: impl Into<String>, number: u64) -> Self {
        Self {
            project: project.into(),
            number,
        }
    }
}

impl fmt::Display for CardRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/#{}", self.project, self.number)
    }
}

/// Card data to create or update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDraft {
    /// Requested number; `None` lets the catalog assign the next one.
    pub number: Option<u64>,
    /// Card name.
    pub name: String,
    /// Card type (e.g. `Story`, `Defect`).
    pub card_type: Option<String>,
    /// Free-text description.
    pub description: Option<String>,
    /// Property values keyed by property name.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

/// A card as stored in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardRecord {
    /// Card number within its project.
    pub number: u64,
    /// Card name.
    pub name: String,
    /// Card type.
    pub card_type: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Property values.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

/// A cross-project dependency to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyDraft {
    /// Dependency number in the exporting system.
    pub number: u64,
    /// Dependency name.
    pub name: String,
    /// Card raising the dependency; may be unknown until resolved.
    pub raising_card: Option<CardRef>,
    /// Project expected to resolve the dependency.
    pub resolving_project: String,
    /// Cards in the resolving project linked to the dependency.
    #[serde(default)]
    pub resolving_cards: Vec<u64>,
}
