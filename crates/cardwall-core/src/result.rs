//! Convenience result type alias for Cardwall.

use crate::error::AppError;

/// A specialized `Result` type for Cardwall operations.
pub type AppResult<T> = Result<T, AppError>;
