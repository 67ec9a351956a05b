//! Job submission and resolution requests.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use cardwall_core::types::CardRef;
use cardwall_entity::job::JobKind;

/// An uploaded input file.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Client-supplied file name.
    pub file_name: String,
    /// File contents.
    pub data: Bytes,
}

impl Upload {
    /// Lower-cased extension of the file name, if any.
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.file_name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

/// Request to start a job.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct SubmitJob {
    /// Operation to perform.
    pub kind: Option<JobKind>,
    /// Project or program identifier the job acts on.
    #[validate(
        length(min = 1, max = 128, message = "must be between 1 and 128 characters"),
        custom(function = "validate_identifier")
    )]
    #[serde(default)]
    pub project: String,
    /// Pasted import text, for card imports.
    #[validate(length(max = 10485760, message = "is too long"))]
    #[serde(default)]
    pub text: Option<String>,
    /// Uploaded input file.
    #[serde(skip)]
    pub upload: Option<Upload>,
}

fn validate_identifier(value: &str) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new("blank").with_message("can't be blank".into()));
    }
    if trimmed.contains(['/', '\\', '?', '#']) {
        return Err(ValidationError::new("identifier")
            .with_message("may not contain '/', '\\', '?' or '#'".into()));
    }
    Ok(())
}

/// Attach a raising card to one `pending_raising_card` error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResolution {
    /// Position of the error in the job's error list.
    pub index: usize,
    /// The card that raised the dependency.
    pub raising_card: CardRef,
}
