//! Convenience result type alias for the data-access layer.

use crate::error::AppError;

/// A specialized `Result` type for repository and context operations.
pub type AppResult<T> = Result<T, AppError>;
