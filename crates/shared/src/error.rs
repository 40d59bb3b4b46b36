//! Workspace-wide error taxonomy.
//!
//! Module errors (`EntryError`, `TrackerError`, `ClosingError`, ...) convert into
//! `AppError` at the outer boundary so callers can classify a failure without
//! knowing which component raised it.

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad or missing field, unknown reference, illegal transition.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Balance invariant violated; nothing was changed.
    #[error("Invariant violated: {0}")]
    Invariant(String),

    /// Reference already reconciled or settled elsewhere.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Referenced row does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage boundary failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the process exit code used by command-line drivers.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Invariant(_) => 3,
            Self::Conflict(_) => 4,
            Self::NotFound(_) => 5,
            Self::Configuration(_) => 78,
            Self::Storage(_) | Self::Internal(_) => 1,
        }
    }

    /// Returns the stable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Invariant(_) => "INVARIANT_ERROR",
            Self::Conflict(_) => "CONFLICT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns true if the operation in progress must stop.
    ///
    /// Validation and conflict errors are local to one entry or row.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Storage(_) | Self::Configuration(_) | Self::Internal(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_exit_codes() {
        assert_eq!(AppError::Validation(String::new()).exit_code(), 2);
        assert_eq!(AppError::Invariant(String::new()).exit_code(), 3);
        assert_eq!(AppError::Conflict(String::new()).exit_code(), 4);
        assert_eq!(AppError::NotFound(String::new()).exit_code(), 5);
        assert_eq!(AppError::Configuration(String::new()).exit_code(), 78);
        assert_eq!(AppError::Storage(String::new()).exit_code(), 1);
        assert_eq!(AppError::Internal(String::new()).exit_code(), 1);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AppError::Validation(String::new()).error_code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(
            AppError::Invariant(String::new()).error_code(),
            "INVARIANT_ERROR"
        );
        assert_eq!(AppError::Conflict(String::new()).error_code(), "CONFLICT");
        assert_eq!(AppError::Storage(String::new()).error_code(), "STORAGE_ERROR");
    }

    #[test]
    fn test_fatal_classification() {
        assert!(!AppError::Validation("x".into()).is_fatal());
        assert!(!AppError::Invariant("x".into()).is_fatal());
        assert!(!AppError::Conflict("x".into()).is_fatal());
        assert!(AppError::Storage("x".into()).is_fatal());
        assert!(AppError::Internal("x".into()).is_fatal());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            AppError::Validation("msg".into()).to_string(),
            "Validation error: msg"
        );
        assert_eq!(
            AppError::Invariant("msg".into()).to_string(),
            "Invariant violated: msg"
        );
        assert_eq!(
            AppError::Storage("msg".into()).to_string(),
            "Storage error: msg"
        );
    }
}
