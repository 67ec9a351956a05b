//! Structured errors recorded against a job.

use serde::{Deserialize, Serialize};

use cardwall_core::types::CardRef;

/// Category of dependency errors that wait for a raising card.
pub const PENDING_RAISING_CARD: &str = "pending_raising_card";

/// Whether an error affected one unit or the whole job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    /// One row/entity was skipped; processing continued.
    Unit,
    /// Processing stopped.
    Fatal,
}

/// One error recorded while processing a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEntry {
    /// Machine-readable category, e.g. `invalid_card_number`.
    pub name: String,
    /// Human-readable message.
    pub message: String,
    /// Unit or fatal.
    pub severity: ErrorSeverity,
    /// Where the caller should point at, e.g. `row:2`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_hint: Option<String>,
    /// Structured context such as the offending value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
    /// Raising card attached by a later resolution.
    #[serde(default)]
    pub raising_card: Option<CardRef>,
}

impl ErrorEntry {
    /// A per-unit error.
    pub fn unit(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            severity: ErrorSeverity::Unit,
            view_hint: None,
            context: None,
            raising_card: None,
        }
    }

    /// The single top-level error of a failed job.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            name: "fatal".to_string(),
            message: message.into(),
            severity: ErrorSeverity::Fatal,
            view_hint: None,
            context: None,
            raising_card: None,
        }
    }

    /// Set the view hint.
    pub fn with_view_hint(mut self, hint: impl Into<String>) -> Self {
        self.view_hint = Some(hint.into());
        self
    }

    /// Set the structured context.
    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }

    /// Whether this is a unit error.
    pub fn is_unit(&self) -> bool {
        self.severity == ErrorSeverity::Unit
    }

    /// Whether a raising card may be attached to this entry.
    pub fn is_resolvable(&self) -> bool {
        self.name == PENDING_RAISING_CARD
    }
}
