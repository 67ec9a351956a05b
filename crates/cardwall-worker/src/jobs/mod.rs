//! Built-in job handler implementations.

use std::sync::Arc;

use cardwall_core::error::AppError;
use cardwall_core::traits::catalog::CardCatalog;

use crate::handler::{HandlerRegistry, JobExecutionError};

pub mod archive;
pub mod card_import;
pub mod dependency_import;
pub mod export;
pub mod program_import;

pub use card_import::CardImportHandler;
pub use dependency_import::DependencyImportHandler;
pub use export::{ProgramExportHandler, ProjectExportHandler};
pub use program_import::ProgramImportHandler;

/// Registry with a handler for every job kind.
pub fn default_registry(catalog: Arc<dyn CardCatalog>) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(CardImportHandler::new(catalog.clone())));
    registry.register(Arc::new(DependencyImportHandler::new(catalog.clone())));
    registry.register(Arc::new(ProjectExportHandler::new(catalog.clone())));
    registry.register(Arc::new(ProgramExportHandler::new(catalog.clone())));
    registry.register(Arc::new(ProgramImportHandler::new(catalog)));
    registry
}

/// Turn a catalog lookup failure for the job's scope into a fatal error.
fn scope_error(err: AppError) -> JobExecutionError {
    if err.is_input_error() {
        JobExecutionError::Fatal(err.message)
    } else {
        JobExecutionError::Internal(err)
    }
}

fn pluralize(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("1 {singular}")
    } else {
        format!("{count} {plural}")
    }
}
