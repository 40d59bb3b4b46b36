//! Engine error type.

use thiserror::Error;
use carnet_core::interchange::ImportError;
use carnet_core::ledger::{BalanceError, EntryError};
use carnet_core::reconcile::TrackerError;
use carnet_shared::AppError;

use crate::connection::StorageError;

/// Errors raised by engine operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Entry rejected or illegal transition.
    #[error(transparent)]
    Entry(#[from] EntryError),

    /// Balance invariant violated.
    #[error(transparent)]
    Balance(#[from] BalanceError),

    /// Reconciliation or settlement refused.
    #[error(transparent)]
    Tracker(#[from] TrackerError),

    /// Storage boundary failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// CSV export failure.
    #[error(transparent)]
    Import(#[from] ImportError),
}

impl EngineError {
    /// Returns the stable error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Entry(e) => e.error_code(),
            Self::Balance(e) => e.error_code(),
            Self::Tracker(e) => e.error_code(),
            Self::Storage(e) => e.error_code(),
            Self::Import(e) => e.error_code(),
        }
    }

    /// Returns true for per-entry validation failures, which callers collect.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Entry(_) | Self::Import(ImportError::Entry { .. }))
    }

    /// Returns true if the operation in progress must stop.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Import(ImportError::Write(_)))
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Entry(e) => e.into(),
            EngineError::Balance(e) => e.into(),
            EngineError::Tracker(e) => e.into(),
            EngineError::Storage(e) => e.into(),
            EngineError::Import(e) => e.into(),
        }
    }
}
