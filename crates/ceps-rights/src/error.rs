//! Error types for the rights resolver.

use thiserror::Error;

use ceps_core::DenialError;
use ceps_store::StoreError;

/// Errors that can occur while resolving rights.
#[derive(Debug, Error)]
pub enum RightsError {
    /// Authorization verdict.
    #[error(transparent)]
    Denied(#[from] DenialError),

    /// Grant store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl RightsError {
    pub(crate) fn deny(denial: DenialError) -> Self {
        if denial.requires_audit() {
            tracing::warn!(denial = %denial, "rights denied");
        }
        RightsError::Denied(denial)
    }
}

/// Result type for rights operations.
pub type Result<T> = std::result::Result<T, RightsError>;
